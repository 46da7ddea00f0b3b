use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::gate::Resource;
use crate::authz::{catalog, permissions as perm, resolver, roles};
use crate::db::row_parsers::organization_from_row;
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::ledger;
use crate::models::organization::{
    Organization, OrganizationCreateRequest, OrganizationUpdateRequest, OrgUsageResponse,
    QuotaCheckResponse,
};

const ORG_COLUMNS: &str = "id, name, slug, description, logo_url, billing_email, subscription_tier, subscription_status, subscription_expires_at, max_users, max_documents, max_storage_bytes, documents_count, storage_used_bytes, settings, created_at, updated_at";

pub async fn fetch_organization(pool: &SqlitePool, org_id: Uuid) -> AppResult<Organization> {
    let row = sqlx::query(&format!("SELECT {ORG_COLUMNS} FROM organizations WHERE id = ?"))
        .bind(org_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("organization not found"))?;

    organization_from_row(&row)
}

/// Membership is the minimum to see an organization at all; non-members get
/// the same 404 a nonexistent id gets, so existence does not leak.
async fn require_member(state: &AppState, user_id: Uuid, org_id: Uuid) -> AppResult<()> {
    if resolver::active_membership(&state.pool, user_id, org_id)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("organization not found"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/organizations",
    tag = "Organizations",
    request_body = OrganizationCreateRequest,
    responses(
        (status = 201, description = "Organization created; creator becomes owner", body = Organization),
        (status = 409, description = "Slug already taken"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_organization(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<OrganizationCreateRequest>,
) -> AppResult<(StatusCode, Json<Organization>)> {
    let owner_role = catalog::role_by_name(&state.pool, roles::ORG_OWNER).await?;

    let org_id = Uuid::new_v4();
    let now = crate::utils::utc_now();

    // Organization row and owner membership commit together.
    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO organizations (id, name, slug, description, logo_url, billing_email, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(org_id.to_string())
    .bind(&payload.name)
    .bind(&payload.slug)
    .bind(&payload.description)
    .bind(&payload.logo_url)
    .bind(&payload.billing_email)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| conflict_on_unique(err, format!("slug already taken: {}", payload.slug)))?;

    resolver::create_membership(&mut *tx, org_id, auth.user_id, owner_role.id, None).await?;

    tx.commit().await?;

    let organization = fetch_organization(&state.pool, org_id).await?;
    log_activity(&state.event_bus, "created", Some(auth.user_id), &organization);

    Ok((StatusCode::CREATED, Json(organization)))
}

#[utoipa::path(
    get,
    path = "/organizations",
    tag = "Organizations",
    responses((status = 200, description = "Organizations the caller belongs to", body = [Organization])),
    security(("bearerAuth" = []))
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Organization>>> {
    let rows = sqlx::query(&format!(
        "SELECT {ORG_COLUMNS} FROM organizations
         WHERE id IN (
             SELECT organization_id FROM organization_members
             WHERE user_id = ? AND is_active = 1
         )
         ORDER BY name",
    ))
    .bind(auth.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    rows.iter().map(organization_from_row).collect::<AppResult<Vec<_>>>().map(Json)
}

#[utoipa::path(
    get,
    path = "/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses((status = 200, description = "Organization detail", body = Organization)),
    security(("bearerAuth" = []))
)]
pub async fn get_organization(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
) -> AppResult<Json<Organization>> {
    require_member(&state, auth.user_id, org_id).await?;
    Ok(Json(fetch_organization(&state.pool, org_id).await?))
}

#[utoipa::path(
    put,
    path = "/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    request_body = OrganizationUpdateRequest,
    responses((status = 200, description = "Organization updated", body = Organization)),
    security(("bearerAuth" = []))
)]
pub async fn update_organization(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<OrganizationUpdateRequest>,
) -> AppResult<Json<Organization>> {
    state
        .authz
        .require(auth.user_id, &Resource::organization(org_id), perm::ORG_MANAGE)
        .await?;

    let mut organization = fetch_organization(&state.pool, org_id).await?;

    if let Some(name) = payload.name.as_ref() {
        organization.name = name.clone();
    }
    if payload.description.is_some() {
        organization.description = payload.description.clone();
    }
    if payload.logo_url.is_some() {
        organization.logo_url = payload.logo_url.clone();
    }
    if let Some(settings) = payload.settings.as_ref() {
        organization.settings = settings.clone();
    }

    let now = crate::utils::utc_now();

    sqlx::query(
        "UPDATE organizations SET name = ?, description = ?, logo_url = ?, settings = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&organization.name)
    .bind(&organization.description)
    .bind(&organization.logo_url)
    .bind(organization.settings.to_string())
    .bind(now)
    .bind(org_id.to_string())
    .execute(&state.pool)
    .await?;

    organization.updated_at = now;
    log_activity(&state.event_bus, "updated", Some(auth.user_id), &organization);

    Ok(Json(organization))
}

#[utoipa::path(
    get,
    path = "/organizations/{org_id}/usage",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    responses((status = 200, description = "Current usage against quota", body = OrgUsageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn organization_usage(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
) -> AppResult<Json<OrgUsageResponse>> {
    require_member(&state, auth.user_id, org_id).await?;

    let organization = fetch_organization(&state.pool, org_id).await?;
    let usage = ledger::org_usage(&state.pool, org_id).await?;

    Ok(Json(OrgUsageResponse {
        documents_count: usage.documents,
        storage_used_bytes: usage.bytes,
        max_users: organization.max_users,
        max_documents: organization.max_documents,
        max_storage_bytes: organization.max_storage_bytes,
    }))
}

#[derive(Debug, Deserialize)]
pub struct QuotaQuery {
    #[serde(default)]
    pub additional_bytes: i64,
    #[serde(default)]
    pub additional_documents: i64,
}

#[utoipa::path(
    get,
    path = "/organizations/{org_id}/quota",
    tag = "Organizations",
    params(
        ("org_id" = Uuid, Path, description = "Organization id"),
        ("additional_bytes" = i64, Query, description = "Bytes the caller intends to add"),
        ("additional_documents" = i64, Query, description = "Documents the caller intends to add"),
    ),
    responses((status = 200, description = "Advisory quota check", body = QuotaCheckResponse)),
    security(("bearerAuth" = []))
)]
pub async fn check_quota(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Query(query): Query<QuotaQuery>,
) -> AppResult<Json<QuotaCheckResponse>> {
    require_member(&state, auth.user_id, org_id).await?;

    let check = ledger::check_org_quota(
        &state.pool,
        org_id,
        query.additional_documents,
        query.additional_bytes,
    )
    .await?;

    Ok(Json(QuotaCheckResponse {
        status: check.as_str().to_string(),
    }))
}
