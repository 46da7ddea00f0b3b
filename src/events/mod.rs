use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(
        name: String,
        actor_id: Option<Uuid>,
        subject_id: Option<Uuid>,
        payload: T,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    pub severity: Severity,
}

/// Publish an activity event for an entity. Fire and forget: audit logging
/// must never fail the request that produced it.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
) {
    let event_name = format!("{}.{}", T::entity_type(), action);
    let severity = entity.severity_for_action(action);
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: None,
        severity,
    };

    let event = DomainEvent::new(
        event_name,
        actor_id,
        Some(entity.subject_id()),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

fn describe(name: &str) -> &'static str {
    match name {
        "organization.created" => "Organization created",
        "organization.updated" => "Organization updated",
        "member.added" => "Member added to organization",
        "member.updated" => "Membership updated",
        "member.deactivated" => "Membership deactivated",
        "role.created" => "Custom role created",
        "share.created" => "Document share created",
        "share.revoked" => "Document share revoked",
        "document.created" => "Document created",
        "document.deleted" => "Document deleted",
        "user.registered" => "New user registered",
        "user.login" => "User logged in",
        _ => "System event",
    }
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    while let Ok(event) = rx.recv().await {
        let name = event
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let actor_id = event
            .get("actor_id")
            .and_then(|v| v.as_str())
            .map(String::from);
        let subject_id = event
            .get("subject_id")
            .and_then(|v| v.as_str())
            .map(String::from);
        let occurred_at = event
            .get("occurred_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let severity = event
            .get("payload")
            .and_then(|p| p.get("severity"))
            .and_then(|s| s.as_str())
            .unwrap_or("important")
            .to_string();

        let result = sqlx::query(
            "INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&name)
        .bind(describe(&name))
        .bind(&actor_id)
        .bind(&subject_id)
        .bind(occurred_at)
        .bind(event.to_string())
        .bind(&severity)
        .execute(&pool)
        .await;

        if let Err(err) = result {
            tracing::error!("failed to save activity log entry: {err}");
        }
    }
}
