//! Permission catalog and role registry.
//!
//! The catalog is a closed set defined at compile time and written to the
//! store idempotently at startup. Roles reference catalog entries by name;
//! a role referencing an unknown permission is rejected when the role is
//! defined, not discovered at check time.

use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

use super::{permissions as perm, roles};
use crate::db::row_parsers::{permission_from_row, role_from_row};
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::models::rbac::{Permission, Role, RoleCreateRequest};
use crate::utils::utc_now;

pub struct PermissionDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
}

const fn p(name: &'static str, display_name: &'static str, category: &'static str) -> PermissionDef {
    PermissionDef { name, display_name, category }
}

pub const PERMISSIONS: &[PermissionDef] = &[
    p(perm::DOCUMENT_VIEW, "View documents", "document"),
    p(perm::DOCUMENT_CREATE, "Upload documents", "document"),
    p(perm::DOCUMENT_EDIT, "Edit documents", "document"),
    p(perm::DOCUMENT_COMMENT, "Comment on documents", "document"),
    p(perm::DOCUMENT_DELETE, "Delete documents", "document"),
    p(perm::DOCUMENT_SHARE, "Share documents", "document"),
    p(perm::DOCUMENT_DOWNLOAD, "Download documents", "document"),
    p(perm::DOCUMENT_MANAGE_ALL, "Manage all documents", "document"),
    p(perm::USER_VIEW, "View members", "user"),
    p(perm::USER_INVITE, "Invite members", "user"),
    p(perm::USER_REMOVE, "Remove members", "user"),
    p(perm::ROLE_ASSIGN, "Assign roles", "role"),
    p(perm::ORG_MANAGE, "Manage organization", "org"),
    p(perm::BILLING_MANAGE, "Manage billing", "billing"),
    p(perm::SEARCH_USE, "Use search", "search"),
];

pub struct SystemRoleDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
}

pub const SYSTEM_ROLES: &[SystemRoleDef] = &[
    SystemRoleDef {
        name: roles::ORG_OWNER,
        display_name: "Organization Owner",
        description: "Full control, including billing",
        permissions: &[
            perm::DOCUMENT_VIEW,
            perm::DOCUMENT_CREATE,
            perm::DOCUMENT_EDIT,
            perm::DOCUMENT_COMMENT,
            perm::DOCUMENT_DELETE,
            perm::DOCUMENT_SHARE,
            perm::DOCUMENT_DOWNLOAD,
            perm::DOCUMENT_MANAGE_ALL,
            perm::USER_VIEW,
            perm::USER_INVITE,
            perm::USER_REMOVE,
            perm::ROLE_ASSIGN,
            perm::ORG_MANAGE,
            perm::BILLING_MANAGE,
            perm::SEARCH_USE,
        ],
    },
    SystemRoleDef {
        name: roles::ORG_ADMIN,
        display_name: "Organization Admin",
        description: "Full control except billing",
        permissions: &[
            perm::DOCUMENT_VIEW,
            perm::DOCUMENT_CREATE,
            perm::DOCUMENT_EDIT,
            perm::DOCUMENT_COMMENT,
            perm::DOCUMENT_DELETE,
            perm::DOCUMENT_SHARE,
            perm::DOCUMENT_DOWNLOAD,
            perm::DOCUMENT_MANAGE_ALL,
            perm::USER_VIEW,
            perm::USER_INVITE,
            perm::USER_REMOVE,
            perm::ROLE_ASSIGN,
            perm::ORG_MANAGE,
            perm::SEARCH_USE,
        ],
    },
    SystemRoleDef {
        name: roles::DOCUMENT_MANAGER,
        display_name: "Document Manager",
        description: "Manages the document library",
        permissions: &[
            perm::DOCUMENT_VIEW,
            perm::DOCUMENT_CREATE,
            perm::DOCUMENT_EDIT,
            perm::DOCUMENT_COMMENT,
            perm::DOCUMENT_DELETE,
            perm::DOCUMENT_SHARE,
            perm::DOCUMENT_DOWNLOAD,
            perm::DOCUMENT_MANAGE_ALL,
            perm::USER_VIEW,
            perm::SEARCH_USE,
        ],
    },
    SystemRoleDef {
        name: roles::EDITOR,
        display_name: "Editor",
        description: "Creates and edits documents",
        permissions: &[
            perm::DOCUMENT_VIEW,
            perm::DOCUMENT_CREATE,
            perm::DOCUMENT_EDIT,
            perm::DOCUMENT_COMMENT,
            perm::DOCUMENT_SHARE,
            perm::DOCUMENT_DOWNLOAD,
            perm::SEARCH_USE,
        ],
    },
    SystemRoleDef {
        name: roles::VIEWER,
        display_name: "Viewer",
        description: "Read-only access",
        permissions: &[perm::DOCUMENT_VIEW, perm::SEARCH_USE],
    },
];

pub fn is_known_permission(name: &str) -> bool {
    PERMISSIONS.iter().any(|def| def.name == name)
}

/// Idempotent seed of the catalog and the system roles. Safe to run on
/// every startup; new permissions added to a system role definition are
/// linked on the next run.
pub async fn seed(pool: &SqlitePool) -> AppResult<()> {
    let now = utc_now();

    for def in PERMISSIONS {
        sqlx::query(
            "INSERT INTO permissions (id, name, display_name, category, created_at)
             VALUES (?, ?, ?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(def.name)
        .bind(def.display_name)
        .bind(def.category)
        .bind(now)
        .execute(pool)
        .await?;
    }

    for role_def in SYSTEM_ROLES {
        sqlx::query(
            "INSERT INTO roles (id, name, display_name, description, is_system_role, created_at)
             VALUES (?, ?, ?, ?, 1, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(role_def.name)
        .bind(role_def.display_name)
        .bind(role_def.description)
        .bind(now)
        .execute(pool)
        .await?;

        for permission in role_def.permissions {
            sqlx::query(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
                 SELECT r.id, p.id FROM roles r, permissions p
                 WHERE r.name = ? AND p.name = ?",
            )
            .bind(role_def.name)
            .bind(permission)
            .execute(pool)
            .await?;
        }
    }

    tracing::debug!("permission catalog seeded");
    Ok(())
}

pub async fn list_permissions(pool: &SqlitePool) -> AppResult<Vec<Permission>> {
    let rows = sqlx::query(
        "SELECT id, name, display_name, category, created_at FROM permissions ORDER BY category, name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(permission_from_row).collect()
}

pub async fn list_roles(pool: &SqlitePool) -> AppResult<Vec<Role>> {
    let rows = sqlx::query(
        "SELECT id, name, display_name, description, is_system_role, created_at FROM roles ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(role_from_row).collect()
}

pub async fn resolve_role(pool: &SqlitePool, role_id: Uuid) -> AppResult<Role> {
    let row = sqlx::query(
        "SELECT id, name, display_name, description, is_system_role, created_at FROM roles WHERE id = ?",
    )
    .bind(role_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("role not found"))?;

    role_from_row(&row)
}

pub async fn role_by_name(pool: &SqlitePool, name: &str) -> AppResult<Role> {
    let row = sqlx::query(
        "SELECT id, name, display_name, description, is_system_role, created_at FROM roles WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("role not found: {name}")))?;

    role_from_row(&row)
}

pub async fn role_permissions(pool: &SqlitePool, role_id: Uuid) -> AppResult<HashSet<String>> {
    let rows = sqlx::query(
        "SELECT p.name AS name FROM role_permissions rp
         JOIN permissions p ON p.id = rp.permission_id
         WHERE rp.role_id = ?",
    )
    .bind(role_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            use sqlx::Row;
            row.try_get::<String, _>("name").map_err(AppError::from)
        })
        .collect()
}

/// Exact set-membership check; permission strings are opaque tokens.
pub async fn role_has_permission(
    pool: &SqlitePool,
    role_id: Uuid,
    permission: &str,
) -> AppResult<bool> {
    Ok(role_permissions(pool, role_id).await?.contains(permission))
}

/// Create a custom (non-system) role. Every referenced permission must
/// exist in the catalog; an unknown name is an invariant violation, not a
/// row waiting to break at check time.
pub async fn create_custom_role(pool: &SqlitePool, req: &RoleCreateRequest) -> AppResult<Role> {
    for permission in &req.permissions {
        if !is_known_permission(permission) {
            return Err(AppError::invariant(format!(
                "role references unknown permission: {permission}"
            )));
        }
    }

    let role_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO roles (id, name, display_name, description, is_system_role, created_at)
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(role_id.to_string())
    .bind(&req.name)
    .bind(&req.display_name)
    .bind(&req.description)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| conflict_on_unique(err, format!("role already exists: {}", req.name)))?;

    for permission in &req.permissions {
        sqlx::query(
            "INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
             SELECT ?, p.id FROM permissions p WHERE p.name = ?",
        )
        .bind(role_id.to_string())
        .bind(permission)
        .execute(pool)
        .await?;
    }

    resolve_role(pool, role_id).await
}
