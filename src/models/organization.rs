use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

pub const DEFAULT_MAX_USERS: i64 = 5;
pub const DEFAULT_MAX_DOCUMENTS: i64 = 1000;
/// 5 GiB
pub const DEFAULT_MAX_STORAGE_BYTES: i64 = 5_368_709_120;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_email: Option<String>,
    pub subscription_tier: String,
    pub subscription_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub max_users: i64,
    pub max_documents: i64,
    pub max_storage_bytes: i64,
    #[schema(value_type = Object)]
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Organization {
    fn entity_type() -> &'static str { "organization" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrganizationCreateRequest {
    #[schema(example = "Acme Research")]
    pub name: String,
    #[schema(example = "acme-research")]
    pub slug: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub billing_email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrganizationUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    #[schema(value_type = Object)]
    pub settings: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrgUsageResponse {
    pub documents_count: i64,
    pub storage_used_bytes: i64,
    pub max_users: i64,
    pub max_documents: i64,
    pub max_storage_bytes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuotaCheckResponse {
    /// "ok" or "exceeded"
    #[schema(example = "ok")]
    pub status: String,
}
