use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// One row per (organization, user). Deactivation flips `is_active`; rows
/// are never deleted so invitation history stays auditable.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationMember {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_accepted_at: Option<DateTime<Utc>>,
}

impl Loggable for OrganizationMember {
    fn entity_type() -> &'static str { "member" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberWithDetails {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_full_name: Option<String>,
    pub role_name: String,
    pub role_display_name: String,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberAddRequest {
    #[schema(example = "grace@example.com")]
    pub email: String,
    /// Role name, e.g. "viewer" or "editor"
    #[schema(example = "viewer")]
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberUpdateRequest {
    pub role: Option<String>,
    pub is_active: Option<bool>,
}
