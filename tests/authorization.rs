use std::path::Path;

use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use paperbase::authz::gate::{AccessBasis, AccessPolicy, DbAccessPolicy, Decision, Resource};
use paperbase::authz::{catalog, permissions as perm, resolver, roles, sharing};
use paperbase::models::document::DbDocument;
use paperbase::models::sharing::{ShareCreateRequest, ShareLevel};

async fn setup_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let migrator =
        sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
            .await?;
    migrator.run(&pool).await?;
    catalog::seed(&pool).await?;
    Ok(pool)
}

async fn insert_user(pool: &SqlitePool, email: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(email)
    .bind("not-a-real-hash")
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn insert_org(pool: &SqlitePool, slug: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO organizations (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(slug)
    .bind(slug)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn insert_document(
    pool: &SqlitePool,
    owner: Uuid,
    org: Option<Uuid>,
    file_size: i64,
) -> Result<DbDocument> {
    let now = Utc::now();
    let doc = DbDocument {
        id: Uuid::new_v4(),
        user_id: owner,
        organization_id: org,
        title: "fixture".to_string(),
        file_size,
        charged_bytes: file_size,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    sqlx::query(
        "INSERT INTO documents (id, user_id, organization_id, title, file_size, charged_bytes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(doc.id.to_string())
    .bind(doc.user_id.to_string())
    .bind(doc.organization_id.map(|id| id.to_string()))
    .bind(&doc.title)
    .bind(doc.file_size)
    .bind(doc.charged_bytes)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(pool)
    .await?;
    Ok(doc)
}

async fn add_member(pool: &SqlitePool, org: Uuid, user: Uuid, role: &str) -> Result<Uuid> {
    let role = catalog::role_by_name(pool, role).await?;
    let mut conn = pool.acquire().await?;
    let member = resolver::create_membership(&mut conn, org, user, role.id, None).await?;
    Ok(member.id)
}

#[tokio::test]
async fn owner_passes_every_document_action() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let doc = insert_document(&pool, owner, None, 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    for action in [perm::DOCUMENT_VIEW, perm::DOCUMENT_EDIT, perm::DOCUMENT_DELETE, perm::DOCUMENT_SHARE] {
        let decision = policy
            .is_authorized(owner, &Resource::document(&doc), action)
            .await?;
        assert_eq!(decision, Decision::Allow(AccessBasis::Owner), "{action}");
    }

    Ok(())
}

#[tokio::test]
async fn ownership_does_not_shortcut_organization_resources() -> Result<()> {
    let pool = setup_pool().await?;
    let user = insert_user(&pool, "someone@example.com").await?;
    let org = insert_org(&pool, "acme").await?;
    let policy = DbAccessPolicy::new(pool.clone());

    let decision = policy
        .is_authorized(user, &Resource::organization(org), perm::ORG_MANAGE)
        .await?;
    assert_eq!(decision, Decision::Deny);

    Ok(())
}

#[tokio::test]
async fn viewer_reads_but_cannot_edit_or_delete() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let viewer = insert_user(&pool, "viewer@example.com").await?;
    let org = insert_org(&pool, "acme").await?;
    add_member(&pool, org, owner, roles::ORG_OWNER).await?;
    add_member(&pool, org, viewer, roles::VIEWER).await?;
    let doc = insert_document(&pool, owner, Some(org), 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    let resource = Resource::document(&doc);
    assert_eq!(
        policy.is_authorized(viewer, &resource, perm::DOCUMENT_VIEW).await?,
        Decision::Allow(AccessBasis::OrganizationRole)
    );
    assert_eq!(
        policy.is_authorized(viewer, &resource, perm::DOCUMENT_EDIT).await?,
        Decision::Deny
    );
    assert_eq!(
        policy.is_authorized(viewer, &resource, perm::DOCUMENT_DELETE).await?,
        Decision::Deny
    );

    Ok(())
}

#[tokio::test]
async fn viewer_with_comment_share_gains_comment_but_not_edit() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let viewer = insert_user(&pool, "viewer@example.com").await?;
    let org = insert_org(&pool, "acme").await?;
    add_member(&pool, org, owner, roles::ORG_OWNER).await?;
    add_member(&pool, org, viewer, roles::VIEWER).await?;
    let doc = insert_document(&pool, owner, Some(org), 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    sharing::create_grant(
        &policy,
        &pool,
        &doc,
        owner,
        &ShareCreateRequest {
            user_id: Some(viewer),
            email: None,
            permission_level: ShareLevel::Comment,
            expires_at: None,
        },
    )
    .await?;

    let resource = Resource::document(&doc);

    // The org role answers view before the grant is consulted.
    assert_eq!(
        policy.is_authorized(viewer, &resource, perm::DOCUMENT_VIEW).await?,
        Decision::Allow(AccessBasis::OrganizationRole)
    );
    // The role lacks comment; evaluation falls through to the grant.
    assert_eq!(
        policy.is_authorized(viewer, &resource, perm::DOCUMENT_COMMENT).await?,
        Decision::Allow(AccessBasis::Share(ShareLevel::Comment))
    );
    // Neither the role nor a comment-level grant satisfies edit.
    assert_eq!(
        policy.is_authorized(viewer, &resource, perm::DOCUMENT_EDIT).await?,
        Decision::Deny
    );

    Ok(())
}

#[tokio::test]
async fn no_membership_means_empty_permissions_and_deny() -> Result<()> {
    let pool = setup_pool().await?;
    let outsider = insert_user(&pool, "outsider@example.com").await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let org = insert_org(&pool, "acme").await?;
    let doc = insert_document(&pool, owner, Some(org), 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    let permissions = resolver::effective_permissions(&pool, outsider, org).await?;
    assert!(permissions.is_empty());

    assert_eq!(
        policy
            .is_authorized(outsider, &Resource::document(&doc), perm::DOCUMENT_VIEW)
            .await?,
        Decision::Deny
    );

    Ok(())
}

#[tokio::test]
async fn deactivated_membership_stops_granting_access() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let member = insert_user(&pool, "member@example.com").await?;
    let org = insert_org(&pool, "acme").await?;
    let member_id = add_member(&pool, org, member, roles::EDITOR).await?;
    let doc = insert_document(&pool, owner, Some(org), 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    let resource = Resource::document(&doc);
    assert!(policy
        .is_authorized(member, &resource, perm::DOCUMENT_VIEW)
        .await?
        .is_allowed());

    resolver::deactivate_membership(&pool, member_id).await?;

    // The next evaluation sees the revocation; no decision is cached.
    assert_eq!(
        policy.is_authorized(member, &resource, perm::DOCUMENT_VIEW).await?,
        Decision::Deny
    );
    assert!(resolver::active_membership(&pool, member, org).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn comment_share_allows_view_and_comment_but_not_edit() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let grace = insert_user(&pool, "grace@example.com").await?;
    let doc = insert_document(&pool, owner, None, 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    sharing::create_grant(
        &policy,
        &pool,
        &doc,
        owner,
        &ShareCreateRequest {
            user_id: Some(grace),
            email: None,
            permission_level: ShareLevel::Comment,
            expires_at: None,
        },
    )
    .await?;

    let resource = Resource::document(&doc);
    assert_eq!(
        policy.is_authorized(grace, &resource, perm::DOCUMENT_VIEW).await?,
        Decision::Allow(AccessBasis::Share(ShareLevel::Comment))
    );
    assert_eq!(
        policy.is_authorized(grace, &resource, perm::DOCUMENT_COMMENT).await?,
        Decision::Allow(AccessBasis::Share(ShareLevel::Comment))
    );
    assert_eq!(
        policy.is_authorized(grace, &resource, perm::DOCUMENT_EDIT).await?,
        Decision::Deny
    );

    Ok(())
}

#[tokio::test]
async fn share_never_grants_administrative_actions() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let grace = insert_user(&pool, "grace@example.com").await?;
    let doc = insert_document(&pool, owner, None, 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    sharing::create_grant(
        &policy,
        &pool,
        &doc,
        owner,
        &ShareCreateRequest {
            user_id: Some(grace),
            email: None,
            permission_level: ShareLevel::Edit,
            expires_at: None,
        },
    )
    .await?;

    let resource = Resource::document(&doc);
    assert!(policy
        .is_authorized(grace, &resource, perm::DOCUMENT_EDIT)
        .await?
        .is_allowed());
    assert_eq!(
        policy.is_authorized(grace, &resource, perm::DOCUMENT_DELETE).await?,
        Decision::Deny
    );
    assert_eq!(
        policy.is_authorized(grace, &resource, perm::DOCUMENT_SHARE).await?,
        Decision::Deny
    );

    Ok(())
}

#[tokio::test]
async fn expired_share_is_denied_even_while_flagged_active() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let grace = insert_user(&pool, "grace@example.com").await?;
    let doc = insert_document(&pool, owner, None, 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    sharing::create_grant(
        &policy,
        &pool,
        &doc,
        owner,
        &ShareCreateRequest {
            user_id: Some(grace),
            email: None,
            permission_level: ShareLevel::Edit,
            expires_at: Some(Utc::now() - Duration::minutes(1)),
        },
    )
    .await?;

    assert_eq!(
        policy
            .is_authorized(grace, &Resource::document(&doc), perm::DOCUMENT_VIEW)
            .await?,
        Decision::Deny
    );

    Ok(())
}

#[tokio::test]
async fn revoked_share_is_denied_on_the_next_check() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let grace = insert_user(&pool, "grace@example.com").await?;
    let doc = insert_document(&pool, owner, None, 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    let share = sharing::create_grant(
        &policy,
        &pool,
        &doc,
        owner,
        &ShareCreateRequest {
            user_id: Some(grace),
            email: None,
            permission_level: ShareLevel::View,
            expires_at: None,
        },
    )
    .await?;

    let resource = Resource::document(&doc);
    assert!(policy
        .is_authorized(grace, &resource, perm::DOCUMENT_VIEW)
        .await?
        .is_allowed());

    sharing::revoke_grant(&pool, share.id).await?;

    assert_eq!(
        policy.is_authorized(grace, &resource, perm::DOCUMENT_VIEW).await?,
        Decision::Deny
    );

    Ok(())
}

#[tokio::test]
async fn email_share_matches_recipient_by_address() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let grace = insert_user(&pool, "grace@example.com").await?;
    let doc = insert_document(&pool, owner, None, 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    sharing::create_grant(
        &policy,
        &pool,
        &doc,
        owner,
        &ShareCreateRequest {
            user_id: None,
            email: Some("grace@example.com".to_string()),
            permission_level: ShareLevel::View,
            expires_at: None,
        },
    )
    .await?;

    assert_eq!(
        policy
            .is_authorized(grace, &Resource::document(&doc), perm::DOCUMENT_VIEW)
            .await?,
        Decision::Allow(AccessBasis::Share(ShareLevel::View))
    );

    Ok(())
}

#[tokio::test]
async fn grantor_without_share_permission_cannot_create_grants() -> Result<()> {
    let pool = setup_pool().await?;
    let owner = insert_user(&pool, "owner@example.com").await?;
    let viewer = insert_user(&pool, "viewer@example.com").await?;
    let org = insert_org(&pool, "acme").await?;
    add_member(&pool, org, viewer, roles::VIEWER).await?;
    let doc = insert_document(&pool, owner, Some(org), 100).await?;
    let policy = DbAccessPolicy::new(pool.clone());

    let result = sharing::create_grant(
        &policy,
        &pool,
        &doc,
        viewer,
        &ShareCreateRequest {
            user_id: Some(owner),
            email: None,
            permission_level: ShareLevel::View,
            expires_at: None,
        },
    )
    .await;

    assert!(matches!(result, Err(paperbase::errors::AppError::Forbidden(_))));

    Ok(())
}
