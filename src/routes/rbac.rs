//! Role and permission catalog endpoints. The catalog itself is seeded
//! from constants; these routes only read it, plus org-admin creation of
//! custom roles.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::gate::Resource;
use crate::authz::{catalog, permissions as perm};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::rbac::{Permission, Role, RoleCreateRequest, RoleWithPermissions};

#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "RBAC",
    responses((status = 200, description = "All roles with their permission sets", body = [RoleWithPermissions])),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<RoleWithPermissions>>> {
    let roles = catalog::list_roles(&state.pool).await?;

    let mut result = Vec::with_capacity(roles.len());
    for role in roles {
        let mut permissions: Vec<String> = catalog::role_permissions(&state.pool, role.id)
            .await?
            .into_iter()
            .collect();
        permissions.sort();

        result.push(RoleWithPermissions {
            id: role.id,
            name: role.name,
            display_name: role.display_name,
            description: role.description,
            is_system_role: role.is_system_role,
            permissions,
        });
    }

    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/rbac/permissions",
    tag = "RBAC",
    responses((status = 200, description = "The permission catalog", body = [Permission])),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<Permission>>> {
    Ok(Json(catalog::list_permissions(&state.pool).await?))
}

#[utoipa::path(
    post,
    path = "/organizations/{org_id}/roles",
    tag = "RBAC",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Custom role created", body = Role),
        (status = 409, description = "Role name already exists"),
        (status = 500, description = "Role references an unknown permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_custom_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    state
        .authz
        .require(auth.user_id, &Resource::organization(org_id), perm::ROLE_ASSIGN)
        .await?;

    let role = catalog::create_custom_role(&state.pool, &payload).await?;
    log_activity(&state.event_bus, "created", Some(auth.user_id), &role);

    Ok((StatusCode::CREATED, Json(role)))
}
