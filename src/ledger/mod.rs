//! Usage ledger: denormalized document and storage counters, maintained in
//! lockstep with document lifecycle events.
//!
//! The lifecycle handlers take the caller's open transaction so the
//! document write and the counter update commit or roll back together.
//! Counter changes are single relative-increment statements; two documents
//! created concurrently for the same owner serialize at the store instead
//! of losing an update. This module only tracks usage — quota enforcement
//! is the caller's read-then-refuse step before the write.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::document::DbDocument;

/// The lifecycle facts the ledger needs: who pays, which tenant, and the
/// storage contribution recorded at creation.
#[derive(Debug, Clone)]
pub struct DocumentEvent {
    pub document_id: Uuid,
    pub owner_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub charged_bytes: i64,
}

impl From<&DbDocument> for DocumentEvent {
    fn from(doc: &DbDocument) -> Self {
        DocumentEvent {
            document_id: doc.id,
            owner_id: doc.user_id,
            organization_id: doc.organization_id,
            charged_bytes: doc.charged_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub documents: i64,
    pub bytes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheck {
    Ok,
    Exceeded,
}

impl QuotaCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, QuotaCheck::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaCheck::Ok => "ok",
            QuotaCheck::Exceeded => "exceeded",
        }
    }
}

/// Apply the creation contribution: the owner's counters always, the
/// organization's counters when the document is tenant-scoped. Both updates
/// run as paired statements inside the caller's transaction.
pub async fn on_document_created(
    conn: &mut SqliteConnection,
    event: &DocumentEvent,
) -> AppResult<()> {
    apply_user_delta(conn, event, 1, event.charged_bytes).await?;

    if event.organization_id.is_some() {
        apply_org_delta(conn, event, 1, event.charged_bytes).await?;
    }

    Ok(())
}

/// Exact inverse of the creation contribution, using the bytes recorded at
/// creation rather than the document's current size.
pub async fn on_document_deleted(
    conn: &mut SqliteConnection,
    event: &DocumentEvent,
) -> AppResult<()> {
    apply_user_delta(conn, event, -1, -event.charged_bytes).await?;

    if event.organization_id.is_some() {
        apply_org_delta(conn, event, -1, -event.charged_bytes).await?;
    }

    Ok(())
}

async fn apply_user_delta(
    conn: &mut SqliteConnection,
    event: &DocumentEvent,
    documents_delta: i64,
    bytes_delta: i64,
) -> AppResult<()> {
    let row = sqlx::query(
        "UPDATE users
         SET documents_uploaded = documents_uploaded + ?,
             storage_used_bytes = storage_used_bytes + ?
         WHERE id = ?
         RETURNING documents_uploaded, storage_used_bytes",
    )
    .bind(documents_delta)
    .bind(bytes_delta)
    .bind(event.owner_id.to_string())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    check_not_negative(&row, "user", event)
}

async fn apply_org_delta(
    conn: &mut SqliteConnection,
    event: &DocumentEvent,
    documents_delta: i64,
    bytes_delta: i64,
) -> AppResult<()> {
    let org_id = event
        .organization_id
        .ok_or_else(|| AppError::internal("org delta without organization id"))?;

    let row = sqlx::query(
        "UPDATE organizations
         SET documents_count = documents_count + ?,
             storage_used_bytes = storage_used_bytes + ?
         WHERE id = ?
         RETURNING documents_count AS documents_uploaded, storage_used_bytes",
    )
    .bind(documents_delta)
    .bind(bytes_delta)
    .bind(org_id.to_string())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("organization not found"))?;

    check_not_negative(&row, "organization", event)
}

/// A counter below zero means a lifecycle event was missed or duplicated.
/// That is corruption, not a code path: log it and fail the transaction so
/// the document write rolls back with the bad update.
fn check_not_negative(row: &SqliteRow, scope: &str, event: &DocumentEvent) -> AppResult<()> {
    let documents: i64 = row.try_get("documents_uploaded")?;
    let bytes: i64 = row.try_get("storage_used_bytes")?;

    if documents < 0 || bytes < 0 {
        tracing::error!(
            scope = scope,
            document = %event.document_id,
            documents,
            bytes,
            "usage counter went negative; lifecycle event missed or duplicated"
        );
        return Err(AppError::invariant(format!(
            "{scope} usage counter would go negative"
        )));
    }

    Ok(())
}

pub async fn user_usage(pool: &SqlitePool, user_id: Uuid) -> AppResult<Usage> {
    let row = sqlx::query(
        "SELECT documents_uploaded, storage_used_bytes FROM users WHERE id = ?",
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Usage {
        documents: row.try_get("documents_uploaded")?,
        bytes: row.try_get("storage_used_bytes")?,
    })
}

pub async fn org_usage(pool: &SqlitePool, org_id: Uuid) -> AppResult<Usage> {
    let row = sqlx::query(
        "SELECT documents_count, storage_used_bytes FROM organizations WHERE id = ?",
    )
    .bind(org_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("organization not found"))?;

    Ok(Usage {
        documents: row.try_get("documents_count")?,
        bytes: row.try_get("storage_used_bytes")?,
    })
}

/// Advisory read against the organization's stored quota fields. Never
/// mutates anything; callers refuse the write themselves on `Exceeded`.
pub async fn check_org_quota(
    pool: &SqlitePool,
    org_id: Uuid,
    additional_documents: i64,
    additional_bytes: i64,
) -> AppResult<QuotaCheck> {
    let row = sqlx::query(
        "SELECT documents_count, storage_used_bytes, max_documents, max_storage_bytes
         FROM organizations WHERE id = ?",
    )
    .bind(org_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("organization not found"))?;

    let documents: i64 = row.try_get("documents_count")?;
    let bytes: i64 = row.try_get("storage_used_bytes")?;
    let max_documents: i64 = row.try_get("max_documents")?;
    let max_bytes: i64 = row.try_get("max_storage_bytes")?;

    if documents + additional_documents > max_documents || bytes + additional_bytes > max_bytes {
        return Ok(QuotaCheck::Exceeded);
    }

    Ok(QuotaCheck::Ok)
}

/// Same advisory check against the owner's personal quota fields.
pub async fn check_user_quota(
    pool: &SqlitePool,
    user_id: Uuid,
    additional_documents: i64,
    additional_bytes: i64,
) -> AppResult<QuotaCheck> {
    let row = sqlx::query(
        "SELECT documents_uploaded, storage_used_bytes, document_quota, storage_quota_bytes
         FROM users WHERE id = ?",
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    let documents: i64 = row.try_get("documents_uploaded")?;
    let bytes: i64 = row.try_get("storage_used_bytes")?;
    let document_quota: i64 = row.try_get("document_quota")?;
    let storage_quota: i64 = row.try_get("storage_quota_bytes")?;

    if documents + additional_documents > document_quota
        || bytes + additional_bytes > storage_quota
    {
        return Ok(QuotaCheck::Exceeded);
    }

    Ok(QuotaCheck::Ok)
}
