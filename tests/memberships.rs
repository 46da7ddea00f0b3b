use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use paperbase::authz::{catalog, permissions as perm, resolver, roles};
use paperbase::errors::AppError;
use paperbase::models::rbac::RoleCreateRequest;

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

#[tokio::test]
async fn seeding_twice_changes_nothing() -> Result<()> {
    let pool = setup_pool().await?;
    catalog::seed(&pool).await?;

    let role_names: Vec<String> = catalog::list_roles(&pool)
        .await?
        .into_iter()
        .map(|role| role.name)
        .collect();
    assert_eq!(
        role_names,
        vec![
            roles::DOCUMENT_MANAGER,
            roles::EDITOR,
            roles::ORG_ADMIN,
            roles::ORG_OWNER,
            roles::VIEWER,
        ]
    );

    assert_eq!(catalog::list_permissions(&pool).await?.len(), catalog::PERMISSIONS.len());

    Ok(())
}

#[tokio::test]
async fn viewer_permission_set_is_exactly_read_only() -> Result<()> {
    let pool = setup_pool().await?;
    let viewer = catalog::role_by_name(&pool, roles::VIEWER).await?;

    let mut permissions: Vec<String> =
        catalog::role_permissions(&pool, viewer.id).await?.into_iter().collect();
    permissions.sort();

    assert_eq!(permissions, vec![perm::DOCUMENT_VIEW, perm::SEARCH_USE]);
    assert!(catalog::role_has_permission(&pool, viewer.id, perm::DOCUMENT_VIEW).await?);
    assert!(!catalog::role_has_permission(&pool, viewer.id, perm::DOCUMENT_EDIT).await?);

    Ok(())
}

#[tokio::test]
async fn second_membership_for_the_same_pair_is_a_conflict() -> Result<()> {
    let pool = setup_pool().await?;
    let org = insert_org(&pool, "acme").await?;
    let user = insert_user(&pool, "ada@example.com").await?;
    let editor = catalog::role_by_name(&pool, roles::EDITOR).await?;
    let viewer = catalog::role_by_name(&pool, roles::VIEWER).await?;

    let mut conn = pool.acquire().await?;
    resolver::create_membership(&mut conn, org, user, editor.id, None).await?;

    // A different role does not help; the pair is already taken.
    let result = resolver::create_membership(&mut conn, org, user, viewer.id, None).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn unknown_role_name_is_not_found() -> Result<()> {
    let pool = setup_pool().await?;

    let result = catalog::role_by_name(&pool, "superuser").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn custom_role_with_unknown_permission_is_rejected() -> Result<()> {
    let pool = setup_pool().await?;

    let result = catalog::create_custom_role(
        &pool,
        &RoleCreateRequest {
            name: "auditor".to_string(),
            display_name: "Auditor".to_string(),
            description: None,
            permissions: vec![perm::DOCUMENT_VIEW.to_string(), "document.teleport".to_string()],
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::InvariantViolation(_))));
    assert!(matches!(
        catalog::role_by_name(&pool, "auditor").await,
        Err(AppError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn custom_role_is_created_with_its_permissions() -> Result<()> {
    let pool = setup_pool().await?;

    let role = catalog::create_custom_role(
        &pool,
        &RoleCreateRequest {
            name: "auditor".to_string(),
            display_name: "Auditor".to_string(),
            description: Some("Read and search only".to_string()),
            permissions: vec![perm::DOCUMENT_VIEW.to_string(), perm::SEARCH_USE.to_string()],
        },
    )
    .await?;

    assert!(!role.is_system_role);

    let mut permissions: Vec<String> =
        catalog::role_permissions(&pool, role.id).await?.into_iter().collect();
    permissions.sort();
    assert_eq!(permissions, vec![perm::DOCUMENT_VIEW, perm::SEARCH_USE]);

    Ok(())
}

#[tokio::test]
async fn duplicate_role_name_is_a_conflict() -> Result<()> {
    let pool = setup_pool().await?;

    let request = RoleCreateRequest {
        name: roles::VIEWER.to_string(),
        display_name: "Viewer again".to_string(),
        description: None,
        permissions: vec![perm::DOCUMENT_VIEW.to_string()],
    };

    let result = catalog::create_custom_role(&pool, &request).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn org_owner_resolves_to_the_full_permission_set() -> Result<()> {
    let pool = setup_pool().await?;
    let org = insert_org(&pool, "acme").await?;
    let user = insert_user(&pool, "ada@example.com").await?;
    let owner = catalog::role_by_name(&pool, roles::ORG_OWNER).await?;

    let mut conn = pool.acquire().await?;
    resolver::create_membership(&mut conn, org, user, owner.id, None).await?;
    drop(conn);

    let permissions = resolver::effective_permissions(&pool, user, org).await?;
    assert_eq!(permissions.len(), catalog::PERMISSIONS.len());
    assert!(permissions.contains(perm::BILLING_MANAGE));

    Ok(())
}
