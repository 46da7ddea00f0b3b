use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

/// Grant levels, ordered: a grant satisfies any action whose required level
/// is at or below its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShareLevel {
    View,
    Comment,
    Edit,
}

impl ShareLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareLevel::View => "view",
            ShareLevel::Comment => "comment",
            ShareLevel::Edit => "edit",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "view" => Ok(ShareLevel::View),
            "comment" => Ok(ShareLevel::Comment),
            "edit" => Ok(ShareLevel::Edit),
            other => Err(AppError::bad_request(format!(
                "unknown share level: {other}"
            ))),
        }
    }
}

/// Time-bounded, document-scoped grant. The recipient may be a known user
/// or a bare email address that has not registered yet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentShare {
    pub id: Uuid,
    pub document_id: Uuid,
    pub shared_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with_user: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with_email: Option<String>,
    pub permission_level: ShareLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Loggable for DocumentShare {
    fn entity_type() -> &'static str { "share" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShareCreateRequest {
    /// Recipient by user id; mutually optional with `email`, one required.
    pub user_id: Option<Uuid>,
    #[schema(example = "grace@example.com")]
    pub email: Option<String>,
    pub permission_level: ShareLevel,
    pub expires_at: Option<DateTime<Utc>>,
}
