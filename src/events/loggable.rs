use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity-log rows; drives retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Security-relevant events, kept long term (membership, role and
    /// share changes).
    Critical,
    #[default]
    Important,
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that can be recorded in the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Entity type name, the prefix in event names like "member.added".
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Deletions and revocations are always critical.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "revoked" | "deactivated" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
