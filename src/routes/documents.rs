//! Document records and their lifecycle. Creation and deletion are the two
//! events the usage ledger cares about; both run the document write and the
//! counter update inside one transaction, with the quota read done before
//! the write.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::gate::Resource;
use crate::authz::permissions as perm;
use crate::db::row_parsers::db_document_from_row;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::ledger::{self, DocumentEvent};
use crate::models::document::{DbDocument, Document, DocumentCreateRequest};
use crate::utils::utc_now;

const DOCUMENT_COLUMNS: &str =
    "id, user_id, organization_id, title, file_size, charged_bytes, created_at, updated_at, deleted_at";

pub async fn fetch_document(pool: &SqlitePool, document_id: Uuid) -> AppResult<DbDocument> {
    let row = sqlx::query(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ? AND deleted_at IS NULL",
    ))
    .bind(document_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("document not found"))?;

    db_document_from_row(&row)
}

#[utoipa::path(
    post,
    path = "/documents",
    tag = "Documents",
    request_body = DocumentCreateRequest,
    responses(
        (status = 201, description = "Document created, usage counters updated", body = Document),
        (status = 413, description = "Quota exceeded"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<DocumentCreateRequest>,
) -> AppResult<(StatusCode, Json<Document>)> {
    if payload.file_size < 0 {
        return Err(AppError::bad_request("file_size must not be negative"));
    }

    if let Some(org_id) = payload.organization_id {
        state
            .authz
            .require(auth.user_id, &Resource::organization(org_id), perm::DOCUMENT_CREATE)
            .await?;

        if !ledger::check_org_quota(&state.pool, org_id, 1, payload.file_size)
            .await?
            .is_ok()
        {
            return Err(AppError::quota_exceeded("organization quota exceeded"));
        }
    }

    if !ledger::check_user_quota(&state.pool, auth.user_id, 1, payload.file_size)
        .await?
        .is_ok()
    {
        return Err(AppError::quota_exceeded("account quota exceeded"));
    }

    let now = utc_now();
    let document = DbDocument {
        id: Uuid::new_v4(),
        user_id: auth.user_id,
        organization_id: payload.organization_id,
        title: payload.title,
        file_size: payload.file_size,
        charged_bytes: payload.file_size,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    let mut tx = state.pool.begin().await?;

    sqlx::query(&format!(
        "INSERT INTO documents ({DOCUMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)",
    ))
    .bind(document.id.to_string())
    .bind(document.user_id.to_string())
    .bind(document.organization_id.map(|id| id.to_string()))
    .bind(&document.title)
    .bind(document.file_size)
    .bind(document.charged_bytes)
    .bind(document.created_at)
    .bind(document.updated_at)
    .execute(&mut *tx)
    .await?;

    ledger::on_document_created(&mut *tx, &DocumentEvent::from(&document)).await?;

    tx.commit().await?;

    let document: Document = document.into();
    log_activity(&state.event_bus, "created", Some(auth.user_id), &document);

    Ok((StatusCode::CREATED, Json(document)))
}

#[derive(Debug, Deserialize)]
pub struct DocumentListQuery {
    pub organization_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/documents",
    tag = "Documents",
    params(("organization_id" = Option<Uuid>, Query, description = "List an organization's documents instead of the caller's own")),
    responses((status = 200, description = "Documents", body = [Document])),
    security(("bearerAuth" = []))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DocumentListQuery>,
) -> AppResult<Json<Vec<Document>>> {
    let rows = match query.organization_id {
        Some(org_id) => {
            state
                .authz
                .require(auth.user_id, &Resource::organization(org_id), perm::DOCUMENT_VIEW)
                .await?;

            sqlx::query(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 WHERE organization_id = ? AND deleted_at IS NULL
                 ORDER BY created_at DESC",
            ))
            .bind(org_id.to_string())
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 WHERE user_id = ? AND deleted_at IS NULL
                 ORDER BY created_at DESC",
            ))
            .bind(auth.user_id.to_string())
            .fetch_all(&state.pool)
            .await?
        }
    };

    let documents = rows
        .iter()
        .map(|row| db_document_from_row(row).map(Document::from))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(documents))
}

#[utoipa::path(
    get,
    path = "/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document detail", body = Document),
        (status = 403, description = "No view access"),
        (status = 404, description = "Document does not exist"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Document>> {
    let document = fetch_document(&state.pool, id).await?;

    state
        .authz
        .require(auth.user_id, &Resource::document(&document), perm::DOCUMENT_VIEW)
        .await?;

    Ok(Json(document.into()))
}

#[utoipa::path(
    delete,
    path = "/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document id")),
    responses((status = 204, description = "Document deleted, usage counters reversed")),
    security(("bearerAuth" = []))
)]
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let document = fetch_document(&state.pool, id).await?;

    state
        .authz
        .require(auth.user_id, &Resource::document(&document), perm::DOCUMENT_DELETE)
        .await?;

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let deleted = sqlx::query("UPDATE documents SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    // Exactly-once: a concurrent delete that lost the race must not reverse
    // the counters a second time.
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("document not found"));
    }

    ledger::on_document_deleted(&mut *tx, &DocumentEvent::from(&document)).await?;

    tx.commit().await?;

    let document: Document = document.into();
    log_activity(&state.event_bus, "deleted", Some(auth.user_id), &document);

    Ok(StatusCode::NO_CONTENT)
}
