//! Sharing endpoints. All three operations require `document.share` on the
//! target document; recipients of a share use the regular document routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::gate::Resource;
use crate::authz::{permissions as perm, sharing};
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::sharing::{DocumentShare, ShareCreateRequest};
use crate::routes::documents::fetch_document;

#[utoipa::path(
    post,
    path = "/documents/{id}/shares",
    tag = "Sharing",
    params(("id" = Uuid, Path, description = "Document id")),
    request_body = ShareCreateRequest,
    responses(
        (status = 201, description = "Share created", body = DocumentShare),
        (status = 400, description = "No recipient given"),
        (status = 403, description = "Caller may not share this document"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShareCreateRequest>,
) -> AppResult<(StatusCode, Json<DocumentShare>)> {
    let document = fetch_document(&state.pool, id).await?;

    let share =
        sharing::create_grant(&state.authz, &state.pool, &document, auth.user_id, &payload)
            .await?;

    log_activity(&state.event_bus, "created", Some(auth.user_id), &share);

    Ok((StatusCode::CREATED, Json(share)))
}

#[utoipa::path(
    get,
    path = "/documents/{id}/shares",
    tag = "Sharing",
    params(("id" = Uuid, Path, description = "Document id")),
    responses((status = 200, description = "All shares for the document, revoked ones included", body = [DocumentShare])),
    security(("bearerAuth" = []))
)]
pub async fn list_shares(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<DocumentShare>>> {
    let document = fetch_document(&state.pool, id).await?;

    state
        .authz
        .require(auth.user_id, &Resource::document(&document), perm::DOCUMENT_SHARE)
        .await?;

    Ok(Json(sharing::shares_for_document(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/documents/{id}/shares/{share_id}",
    tag = "Sharing",
    params(
        ("id" = Uuid, Path, description = "Document id"),
        ("share_id" = Uuid, Path, description = "Share id"),
    ),
    responses((status = 204, description = "Share revoked; the row is kept for audit")),
    security(("bearerAuth" = []))
)]
pub async fn revoke_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, share_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let document = fetch_document(&state.pool, id).await?;

    state
        .authz
        .require(auth.user_id, &Resource::document(&document), perm::DOCUMENT_SHARE)
        .await?;

    let shares = sharing::shares_for_document(&state.pool, id).await?;
    let share = shares
        .into_iter()
        .find(|share| share.id == share_id)
        .ok_or_else(|| crate::errors::AppError::not_found("share not found"))?;

    sharing::revoke_grant(&state.pool, share_id).await?;

    log_activity(&state.event_bus, "revoked", Some(auth.user_id), &share);

    Ok(StatusCode::NO_CONTENT)
}
