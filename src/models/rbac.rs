use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_system_role: bool,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Role {
    fn entity_type() -> &'static str { "role" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "external_auditor")]
    pub name: String,
    #[schema(example = "External Auditor")]
    pub display_name: String,
    pub description: Option<String>,
    /// Permission names; every one must exist in the catalog.
    #[schema(example = json!(["document.view", "search.use"]))]
    pub permissions: Vec<String>,
}

/// Role with its resolved permission set, as served by the registry
/// endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleWithPermissions {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_system_role: bool,
    pub permissions: Vec<String>,
}
