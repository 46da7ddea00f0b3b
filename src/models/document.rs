use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::Loggable;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    pub title: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Document {
    fn entity_type() -> &'static str { "document" }
    fn subject_id(&self) -> Uuid { self.id }
}

/// Full row, including the creation-time storage contribution the ledger
/// reverses on deletion.
#[derive(Debug, Clone)]
pub struct DbDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub title: String,
    pub file_size: i64,
    pub charged_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<DbDocument> for Document {
    fn from(value: DbDocument) -> Self {
        Document {
            id: value.id,
            user_id: value.user_id,
            organization_id: value.organization_id,
            title: value.title,
            file_size: value.file_size,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DocumentCreateRequest {
    #[schema(example = "Q3 contract draft")]
    pub title: String,
    #[schema(example = 204800)]
    pub file_size: i64,
    pub organization_id: Option<Uuid>,
}
