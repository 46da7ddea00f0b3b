use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::Loggable;

/// Public account view. Usage counters are served separately via the usage
/// endpoints; the password hash never leaves the row struct.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub subscription_tier: String,
    pub subscription_status: String,
    pub document_quota: i64,
    pub storage_quota_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub subscription_tier: String,
    pub subscription_status: String,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub document_quota: i64,
    pub storage_quota_bytes: i64,
    pub documents_uploaded: i64,
    pub storage_used_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        User {
            id: value.id,
            email: value.email,
            full_name: value.full_name,
            subscription_tier: value.subscription_tier,
            subscription_status: value.subscription_status,
            document_quota: value.document_quota,
            storage_quota_bytes: value.storage_quota_bytes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Usage counters next to the quota fields they are compared against.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserUsageResponse {
    pub documents_uploaded: i64,
    pub storage_used_bytes: i64,
    pub document_quota: i64,
    pub storage_quota_bytes: i64,
}
