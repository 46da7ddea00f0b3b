//! Membership store and effective-permission resolution.

use std::collections::HashSet;

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::row_parsers::member_from_row;
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::models::membership::OrganizationMember;
use crate::utils::utc_now;

const MEMBER_COLUMNS: &str =
    "id, organization_id, user_id, role_id, is_active, invited_by, joined_at, invitation_accepted_at";

/// The active membership for (user, organization), if any. Inactive rows
/// are treated as absent.
pub async fn active_membership(
    pool: &SqlitePool,
    user_id: Uuid,
    org_id: Uuid,
) -> AppResult<Option<OrganizationMember>> {
    let row = sqlx::query(&format!(
        "SELECT {MEMBER_COLUMNS} FROM organization_members
         WHERE organization_id = ? AND user_id = ? AND is_active = 1",
    ))
    .bind(org_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(member_from_row).transpose()
}

pub async fn membership_by_id(
    pool: &SqlitePool,
    member_id: Uuid,
) -> AppResult<OrganizationMember> {
    let row = sqlx::query(&format!(
        "SELECT {MEMBER_COLUMNS} FROM organization_members WHERE id = ?",
    ))
    .bind(member_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("membership not found"))?;

    member_from_row(&row)
}

/// Effective permission set for (user, organization): the permission set of
/// the single active membership's role, or the empty set when there is no
/// active membership. Fails closed; there is no implicit access.
pub async fn effective_permissions(
    pool: &SqlitePool,
    user_id: Uuid,
    org_id: Uuid,
) -> AppResult<HashSet<String>> {
    let rows = sqlx::query(
        "SELECT p.name AS name FROM organization_members m
         JOIN role_permissions rp ON rp.role_id = m.role_id
         JOIN permissions p ON p.id = rp.permission_id
         WHERE m.organization_id = ? AND m.user_id = ? AND m.is_active = 1",
    )
    .bind(org_id.to_string())
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            use sqlx::Row;
            row.try_get::<String, _>("name").map_err(AppError::from)
        })
        .collect()
}

/// Insert a membership row. The UNIQUE (organization_id, user_id)
/// constraint rejects a second membership for the pair — surfaced as
/// `Conflict`, never a silent overwrite.
pub async fn create_membership(
    conn: &mut SqliteConnection,
    org_id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
    invited_by: Option<Uuid>,
) -> AppResult<OrganizationMember> {
    let member_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO organization_members
         (id, organization_id, user_id, role_id, is_active, invited_by, joined_at, invitation_accepted_at)
         VALUES (?, ?, ?, ?, 1, ?, ?, ?)",
    )
    .bind(member_id.to_string())
    .bind(org_id.to_string())
    .bind(user_id.to_string())
    .bind(role_id.to_string())
    .bind(invited_by.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|err| conflict_on_unique(err, "user is already a member of this organization"))?;

    Ok(OrganizationMember {
        id: member_id,
        organization_id: org_id,
        user_id,
        role_id,
        is_active: true,
        invited_by,
        joined_at: now,
        invitation_accepted_at: Some(now),
    })
}

/// Soft revocation: the row stays for audit, the next authorization check
/// sees no active membership.
pub async fn deactivate_membership(pool: &SqlitePool, member_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE organization_members SET is_active = 0 WHERE id = ?")
        .bind(member_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}
