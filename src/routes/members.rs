use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::Row;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::gate::Resource;
use crate::authz::{catalog, permissions as perm, resolver};
use crate::db::row_parsers::parse_uuid;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::membership::{
    MemberAddRequest, MemberUpdateRequest, MemberWithDetails, OrganizationMember,
};
use crate::routes::auth::fetch_user_by_email;

#[utoipa::path(
    post,
    path = "/organizations/{org_id}/members",
    tag = "Members",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    request_body = MemberAddRequest,
    responses(
        (status = 201, description = "Member added", body = OrganizationMember),
        (status = 409, description = "Already a member"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<MemberAddRequest>,
) -> AppResult<(StatusCode, Json<OrganizationMember>)> {
    state
        .authz
        .require(auth.user_id, &Resource::organization(org_id), perm::USER_INVITE)
        .await?;

    let user = fetch_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no account for email: {}", payload.email)))?;
    let role = catalog::role_by_name(&state.pool, &payload.role).await?;

    let mut conn = state.pool.acquire().await?;
    let member =
        resolver::create_membership(&mut *conn, org_id, user.id, role.id, Some(auth.user_id))
            .await?;

    log_activity(&state.event_bus, "added", Some(auth.user_id), &member);

    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    get,
    path = "/organizations/{org_id}/members",
    tag = "Members",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses((status = 200, description = "Members with role details", body = [MemberWithDetails])),
    security(("bearerAuth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
) -> AppResult<Json<Vec<MemberWithDetails>>> {
    state
        .authz
        .require(auth.user_id, &Resource::organization(org_id), perm::USER_VIEW)
        .await?;

    let rows = sqlx::query(
        "SELECT m.id, m.organization_id, m.user_id, m.is_active, m.joined_at,
                u.email AS user_email, u.full_name AS user_full_name,
                r.id AS role_id, r.name AS role_name, r.display_name AS role_display_name
         FROM organization_members m
         JOIN users u ON u.id = m.user_id
         JOIN roles r ON r.id = m.role_id
         WHERE m.organization_id = ?
         ORDER BY m.joined_at",
    )
    .bind(org_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let mut members = Vec::with_capacity(rows.len());
    for row in &rows {
        let role_id = parse_uuid(row, "role_id")?;
        let mut permissions: Vec<String> = catalog::role_permissions(&state.pool, role_id)
            .await?
            .into_iter()
            .collect();
        permissions.sort();

        members.push(MemberWithDetails {
            id: parse_uuid(row, "id")?,
            organization_id: parse_uuid(row, "organization_id")?,
            user_id: parse_uuid(row, "user_id")?,
            user_email: row.try_get("user_email")?,
            user_full_name: row.try_get("user_full_name")?,
            role_name: row.try_get("role_name")?,
            role_display_name: row.try_get("role_display_name")?,
            is_active: row.try_get("is_active")?,
            joined_at: row.try_get("joined_at")?,
            permissions,
        });
    }

    Ok(Json(members))
}

#[utoipa::path(
    put,
    path = "/organizations/{org_id}/members/{member_id}",
    tag = "Members",
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("member_id" = Uuid, Path, description = "Membership id"),
    ),
    request_body = MemberUpdateRequest,
    responses((status = 200, description = "Membership updated", body = OrganizationMember)),
    security(("bearerAuth" = []))
)]
pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, member_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MemberUpdateRequest>,
) -> AppResult<Json<OrganizationMember>> {
    state
        .authz
        .require(auth.user_id, &Resource::organization(org_id), perm::ROLE_ASSIGN)
        .await?;

    let mut member = resolver::membership_by_id(&state.pool, member_id).await?;
    if member.organization_id != org_id {
        return Err(AppError::not_found("membership not found"));
    }

    if let Some(role_name) = payload.role.as_ref() {
        member.role_id = catalog::role_by_name(&state.pool, role_name).await?.id;
    }
    if let Some(is_active) = payload.is_active {
        member.is_active = is_active;
    }

    sqlx::query("UPDATE organization_members SET role_id = ?, is_active = ? WHERE id = ?")
        .bind(member.role_id.to_string())
        .bind(member.is_active)
        .bind(member_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "updated", Some(auth.user_id), &member);

    Ok(Json(member))
}

#[utoipa::path(
    delete,
    path = "/organizations/{org_id}/members/{member_id}",
    tag = "Members",
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("member_id" = Uuid, Path, description = "Membership id"),
    ),
    responses((status = 204, description = "Membership deactivated; row retained for audit")),
    security(("bearerAuth" = []))
)]
pub async fn deactivate_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, member_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .authz
        .require(auth.user_id, &Resource::organization(org_id), perm::USER_REMOVE)
        .await?;

    let mut member = resolver::membership_by_id(&state.pool, member_id).await?;
    if member.organization_id != org_id {
        return Err(AppError::not_found("membership not found"));
    }

    resolver::deactivate_membership(&state.pool, member_id).await?;

    member.is_active = false;
    log_activity(&state.event_bus, "deactivated", Some(auth.user_id), &member);

    Ok(StatusCode::NO_CONTENT)
}
