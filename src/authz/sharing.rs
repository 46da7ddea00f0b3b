//! Document sharing grants: time-bounded, document-scoped access that
//! bypasses organization membership.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::gate::{AccessPolicy, DbAccessPolicy, Resource};
use super::permissions as perm;
use crate::db::row_parsers::share_from_row;
use crate::errors::{AppError, AppResult};
use crate::models::document::DbDocument;
use crate::models::sharing::{DocumentShare, ShareCreateRequest, ShareLevel};
use crate::utils::utc_now;

const SHARE_COLUMNS: &str = "id, document_id, shared_by, shared_with_user, shared_with_email, permission_level, expires_at, is_active, created_at";

/// The minimum grant level that satisfies an action, if a grant can satisfy
/// it at all. Administrative actions (delete, share, manage) are never
/// satisfiable through a share.
pub fn required_level(action: &str) -> Option<ShareLevel> {
    match action {
        perm::DOCUMENT_VIEW | perm::DOCUMENT_DOWNLOAD => Some(ShareLevel::View),
        perm::DOCUMENT_COMMENT => Some(ShareLevel::Comment),
        perm::DOCUMENT_EDIT => Some(ShareLevel::Edit),
        _ => None,
    }
}

/// A grant past its expiry is absent regardless of `is_active`.
pub fn grant_is_live(share: &DocumentShare, now: DateTime<Utc>) -> bool {
    share.is_active && share.expires_at.map_or(true, |expiry| expiry > now)
}

/// Highest live grant level for the recipient on this document, matching by
/// user id or by email so grants created before the recipient registered
/// still apply.
pub async fn live_share_level(
    pool: &SqlitePool,
    document_id: Uuid,
    user_id: Uuid,
    email: &str,
    now: DateTime<Utc>,
) -> AppResult<Option<ShareLevel>> {
    let rows = sqlx::query(&format!(
        "SELECT {SHARE_COLUMNS} FROM document_shares
         WHERE document_id = ? AND is_active = 1
           AND (shared_with_user = ? OR shared_with_email = ?)",
    ))
    .bind(document_id.to_string())
    .bind(user_id.to_string())
    .bind(email)
    .fetch_all(pool)
    .await?;

    let mut best = None;
    for row in &rows {
        let share = share_from_row(row)?;
        if grant_is_live(&share, now) && Some(share.permission_level) > best {
            best = Some(share.permission_level);
        }
    }

    Ok(best)
}

/// Create a grant. The grantor must pass the gate for `document.share` on
/// this document; enforcing that here keeps the rule with the operation.
pub async fn create_grant(
    policy: &DbAccessPolicy,
    pool: &SqlitePool,
    document: &DbDocument,
    grantor: Uuid,
    req: &ShareCreateRequest,
) -> AppResult<DocumentShare> {
    if req.user_id.is_none() && req.email.is_none() {
        return Err(AppError::bad_request(
            "share recipient required: user_id or email",
        ));
    }

    policy
        .require(grantor, &Resource::document(document), perm::DOCUMENT_SHARE)
        .await?;

    let share = DocumentShare {
        id: Uuid::new_v4(),
        document_id: document.id,
        shared_by: grantor,
        shared_with_user: req.user_id,
        shared_with_email: req.email.clone(),
        permission_level: req.permission_level,
        expires_at: req.expires_at,
        is_active: true,
        created_at: utc_now(),
    };

    sqlx::query(&format!(
        "INSERT INTO document_shares ({SHARE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)",
    ))
    .bind(share.id.to_string())
    .bind(share.document_id.to_string())
    .bind(share.shared_by.to_string())
    .bind(share.shared_with_user.map(|id| id.to_string()))
    .bind(&share.shared_with_email)
    .bind(share.permission_level.as_str())
    .bind(share.expires_at)
    .bind(share.created_at)
    .execute(pool)
    .await?;

    Ok(share)
}

/// Revoke a grant by flipping it inactive. Idempotent: revoking an already
/// revoked grant succeeds.
pub async fn revoke_grant(pool: &SqlitePool, share_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("UPDATE document_shares SET is_active = 0 WHERE id = ?")
        .bind(share_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("share not found"));
    }

    Ok(())
}

pub async fn shares_for_document(
    pool: &SqlitePool,
    document_id: Uuid,
) -> AppResult<Vec<DocumentShare>> {
    let rows = sqlx::query(&format!(
        "SELECT {SHARE_COLUMNS} FROM document_shares WHERE document_id = ? ORDER BY created_at DESC",
    ))
    .bind(document_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(share_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn share(level: ShareLevel, expires_at: Option<DateTime<Utc>>, is_active: bool) -> DocumentShare {
        DocumentShare {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            shared_by: Uuid::new_v4(),
            shared_with_user: Some(Uuid::new_v4()),
            shared_with_email: None,
            permission_level: level,
            expires_at,
            is_active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expired_grant_is_dead_even_if_active() {
        let now = Utc::now();
        let expired = share(ShareLevel::Edit, Some(now - Duration::minutes(1)), true);
        assert!(!grant_is_live(&expired, now));
    }

    #[test]
    fn unexpired_and_unbounded_grants_are_live() {
        let now = Utc::now();
        assert!(grant_is_live(&share(ShareLevel::View, None, true), now));
        assert!(grant_is_live(
            &share(ShareLevel::View, Some(now + Duration::hours(1)), true),
            now
        ));
    }

    #[test]
    fn revoked_grant_is_dead() {
        let now = Utc::now();
        assert!(!grant_is_live(&share(ShareLevel::Edit, None, false), now));
    }

    #[test]
    fn level_ordering_matches_action_requirements() {
        assert!(ShareLevel::Comment >= required_level(perm::DOCUMENT_VIEW).unwrap());
        assert!(ShareLevel::Comment < required_level(perm::DOCUMENT_EDIT).unwrap());
        assert_eq!(required_level(perm::DOCUMENT_DELETE), None);
        assert_eq!(required_level(perm::DOCUMENT_SHARE), None);
    }
}
