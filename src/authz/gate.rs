//! The authorization gate: the single entry point for access decisions.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{resolver, sharing};
use crate::errors::{AppError, AppResult};
use crate::models::document::DbDocument;
use crate::utils::utc_now;

/// The target of an access decision. Organizations have no owner identity;
/// documents carry their owner and, when organization-scoped, the tenant.
#[derive(Debug, Clone)]
pub struct Resource {
    pub owner_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub document_id: Option<Uuid>,
}

impl Resource {
    pub fn document(doc: &DbDocument) -> Self {
        Resource {
            owner_id: Some(doc.user_id),
            organization_id: doc.organization_id,
            document_id: Some(doc.id),
        }
    }

    pub fn organization(org_id: Uuid) -> Self {
        Resource {
            owner_id: None,
            organization_id: Some(org_id),
            document_id: None,
        }
    }
}

/// Which rule produced an allow; used for decision logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessBasis {
    Owner,
    OrganizationRole,
    Share(crate::models::sharing::ShareLevel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(AccessBasis),
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Pluggable decision seam. Implementations must evaluate fresh on every
/// call: role, membership and grant state all change between requests, and
/// a decision is only valid for the single operation it guards.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn is_authorized(
        &self,
        actor: Uuid,
        resource: &Resource,
        action: &str,
    ) -> AppResult<Decision>;
}

/// Store-backed policy with the fixed precedence: ownership shortcut,
/// organization role permission, live sharing grant, deny.
#[derive(Debug, Clone)]
pub struct DbAccessPolicy {
    pool: SqlitePool,
}

impl DbAccessPolicy {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn effective_permissions(
        &self,
        actor: Uuid,
        org_id: Uuid,
    ) -> AppResult<HashSet<String>> {
        resolver::effective_permissions(&self.pool, actor, org_id).await
    }

    /// Gate an operation, mapping a deny to `Forbidden`.
    pub async fn require(&self, actor: Uuid, resource: &Resource, action: &str) -> AppResult<()> {
        match self.is_authorized(actor, resource, action).await? {
            Decision::Allow(_) => Ok(()),
            Decision::Deny => Err(AppError::forbidden(format!(
                "missing required permission: {action}"
            ))),
        }
    }

    async fn actor_email(&self, actor: Uuid) -> AppResult<String> {
        sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = ?")
            .bind(actor.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }
}

#[async_trait]
impl AccessPolicy for DbAccessPolicy {
    async fn is_authorized(
        &self,
        actor: Uuid,
        resource: &Resource,
        action: &str,
    ) -> AppResult<Decision> {
        // 1. Ownership shortcut. Absolute for document-scoped resources and
        //    not revocable by role changes.
        if resource.document_id.is_some() && resource.owner_id == Some(actor) {
            tracing::debug!(actor = %actor, action = %action, "allow: owner");
            return Ok(Decision::Allow(AccessBasis::Owner));
        }

        // 2. Organization role permission.
        if let Some(org_id) = resource.organization_id {
            let permissions = resolver::effective_permissions(&self.pool, actor, org_id).await?;
            if permissions.contains(action) {
                tracing::debug!(actor = %actor, org = %org_id, action = %action, "allow: organization role");
                return Ok(Decision::Allow(AccessBasis::OrganizationRole));
            }
        }

        // 3. Live sharing grant of sufficient level, matched by user id or
        //    verified email.
        if let Some(document_id) = resource.document_id {
            if let Some(required) = sharing::required_level(action) {
                let email = self.actor_email(actor).await?;
                let level =
                    sharing::live_share_level(&self.pool, document_id, actor, &email, utc_now())
                        .await?;
                if let Some(level) = level {
                    if level >= required {
                        tracing::debug!(
                            actor = %actor,
                            document = %document_id,
                            action = %action,
                            level = level.as_str(),
                            "allow: sharing grant"
                        );
                        return Ok(Decision::Allow(AccessBasis::Share(level)));
                    }
                }
            }
        }

        tracing::debug!(actor = %actor, action = %action, "deny");
        Ok(Decision::Deny)
    }
}
