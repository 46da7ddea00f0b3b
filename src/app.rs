use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::gate::DbAccessPolicy;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, documents, health, members, organizations, rbac, shares};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub authz: Arc<DbAccessPolicy>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        let authz = Arc::new(DbAccessPolicy::new(pool.clone()));
        Self {
            pool,
            jwt: Arc::new(jwt),
            authz,
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/me/usage", get(auth::my_usage));

    let org_routes = Router::new()
        .route("/", get(organizations::list_organizations))
        .route("/", post(organizations::create_organization))
        .route("/:org_id", get(organizations::get_organization))
        .route("/:org_id", put(organizations::update_organization))
        .route("/:org_id/usage", get(organizations::organization_usage))
        .route("/:org_id/quota", get(organizations::check_quota))
        .route("/:org_id/roles", post(rbac::create_custom_role));

    let member_routes = Router::new()
        .route("/", get(members::list_members))
        .route("/", post(members::add_member))
        .route("/:member_id", put(members::update_member))
        .route("/:member_id", delete(members::deactivate_member));

    let rbac_routes = Router::new()
        .route("/roles", get(rbac::list_roles))
        .route("/permissions", get(rbac::list_permissions));

    let document_routes = Router::new()
        .route("/", get(documents::list_documents))
        .route("/", post(documents::create_document))
        .route("/:id", get(documents::get_document))
        .route("/:id", delete(documents::delete_document));

    let share_routes = Router::new()
        .route("/", get(shares::list_shares))
        .route("/", post(shares::create_share))
        .route("/:share_id", delete(shares::revoke_share));

    let router = Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/organizations", org_routes)
        .nest("/organizations/:org_id/members", member_routes)
        .nest("/rbac", rbac_routes)
        .nest("/documents", document_routes)
        .nest("/documents/:id/shares", share_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
