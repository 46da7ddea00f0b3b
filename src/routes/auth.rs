use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::row_parsers::db_user_from_row;
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::ledger;
use crate::models::user::{
    AuthResponse, DbUser, LoginRequest, RegisterRequest, User, UserUsageResponse,
};
use crate::utils::{hash_password, utc_now, verify_password};

const USER_COLUMNS: &str = "id, email, full_name, password_hash, subscription_tier, subscription_status, subscription_expires_at, document_quota, storage_quota_bytes, documents_uploaded, storage_used_bytes, created_at, updated_at";

pub async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    db_user_from_row(&row)
}

pub async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(db_user_from_row).transpose()
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 409, description = "Email already registered"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let password_hash = hash_password(&payload.password)?;
    let user_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO users (id, email, full_name, password_hash, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(&payload.email)
    .bind(&payload.full_name)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|err| conflict_on_unique(err, "email already registered"))?;

    let user: User = fetch_user(&state.pool, user_id).await?.into();
    let token = state.jwt.encode(user_id, &user.email)?;

    log_activity(&state.event_bus, "registered", Some(user_id), &user);

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = fetch_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = state.jwt.encode(user.id, &user.email)?;
    let user: User = user.into();

    log_activity(&state.event_bus, "login", Some(user.id), &user);

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current account", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let user: User = fetch_user(&state.pool, auth.user_id).await?.into();
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/auth/me/usage",
    tag = "Auth",
    responses((status = 200, description = "Current usage against quota", body = UserUsageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn my_usage(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<UserUsageResponse>> {
    let user = fetch_user(&state.pool, auth.user_id).await?;
    let usage = ledger::user_usage(&state.pool, auth.user_id).await?;

    Ok(Json(UserUsageResponse {
        documents_uploaded: usage.documents,
        storage_used_bytes: usage.bytes,
        document_quota: user.document_quota,
        storage_quota_bytes: user.storage_quota_bytes,
    }))
}
