//! Row-to-model conversion. Uuids are stored as canonical TEXT, timestamps
//! as rfc3339 TEXT; every parser goes through the same helpers so a
//! malformed row surfaces as an internal error instead of a panic.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::document::DbDocument;
use crate::models::membership::OrganizationMember;
use crate::models::organization::Organization;
use crate::models::rbac::{Permission, Role};
use crate::models::sharing::{DocumentShare, ShareLevel};
use crate::models::user::DbUser;

pub fn parse_uuid(row: &SqliteRow, column: &str) -> AppResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|err| AppError::internal(format!("invalid uuid in column {column}: {err}")))
}

pub fn parse_opt_uuid(row: &SqliteRow, column: &str) -> AppResult<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(value) => Uuid::parse_str(&value)
            .map(Some)
            .map_err(|err| AppError::internal(format!("invalid uuid in column {column}: {err}"))),
        None => Ok(None),
    }
}

pub fn db_user_from_row(row: &SqliteRow) -> AppResult<DbUser> {
    Ok(DbUser {
        id: parse_uuid(row, "id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        password_hash: row.try_get("password_hash")?,
        subscription_tier: row.try_get("subscription_tier")?,
        subscription_status: row.try_get("subscription_status")?,
        subscription_expires_at: row.try_get("subscription_expires_at")?,
        document_quota: row.try_get("document_quota")?,
        storage_quota_bytes: row.try_get("storage_quota_bytes")?,
        documents_uploaded: row.try_get("documents_uploaded")?,
        storage_used_bytes: row.try_get("storage_used_bytes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn organization_from_row(row: &SqliteRow) -> AppResult<Organization> {
    let settings_raw: String = row.try_get("settings")?;
    let settings = serde_json::from_str(&settings_raw)
        .map_err(|err| AppError::internal(format!("invalid settings json: {err}")))?;

    Ok(Organization {
        id: parse_uuid(row, "id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        logo_url: row.try_get("logo_url")?,
        billing_email: row.try_get("billing_email")?,
        subscription_tier: row.try_get("subscription_tier")?,
        subscription_status: row.try_get("subscription_status")?,
        subscription_expires_at: row.try_get("subscription_expires_at")?,
        max_users: row.try_get("max_users")?,
        max_documents: row.try_get("max_documents")?,
        max_storage_bytes: row.try_get("max_storage_bytes")?,
        settings,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn member_from_row(row: &SqliteRow) -> AppResult<OrganizationMember> {
    Ok(OrganizationMember {
        id: parse_uuid(row, "id")?,
        organization_id: parse_uuid(row, "organization_id")?,
        user_id: parse_uuid(row, "user_id")?,
        role_id: parse_uuid(row, "role_id")?,
        is_active: row.try_get("is_active")?,
        invited_by: parse_opt_uuid(row, "invited_by")?,
        joined_at: row.try_get("joined_at")?,
        invitation_accepted_at: row.try_get("invitation_accepted_at")?,
    })
}

pub fn role_from_row(row: &SqliteRow) -> AppResult<Role> {
    Ok(Role {
        id: parse_uuid(row, "id")?,
        name: row.try_get("name")?,
        display_name: row.try_get("display_name")?,
        description: row.try_get("description")?,
        is_system_role: row.try_get("is_system_role")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn permission_from_row(row: &SqliteRow) -> AppResult<Permission> {
    Ok(Permission {
        id: parse_uuid(row, "id")?,
        name: row.try_get("name")?,
        display_name: row.try_get("display_name")?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn db_document_from_row(row: &SqliteRow) -> AppResult<DbDocument> {
    Ok(DbDocument {
        id: parse_uuid(row, "id")?,
        user_id: parse_uuid(row, "user_id")?,
        organization_id: parse_opt_uuid(row, "organization_id")?,
        title: row.try_get("title")?,
        file_size: row.try_get("file_size")?,
        charged_bytes: row.try_get("charged_bytes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

pub fn share_from_row(row: &SqliteRow) -> AppResult<DocumentShare> {
    let level_raw: String = row.try_get("permission_level")?;

    Ok(DocumentShare {
        id: parse_uuid(row, "id")?,
        document_id: parse_uuid(row, "document_id")?,
        shared_by: parse_uuid(row, "shared_by")?,
        shared_with_user: parse_opt_uuid(row, "shared_with_user")?,
        shared_with_email: row.try_get("shared_with_email")?,
        permission_level: ShareLevel::parse(&level_raw)
            .map_err(|_| AppError::internal(format!("invalid share level: {level_raw}")))?,
        expires_at: row.try_get("expires_at")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}
