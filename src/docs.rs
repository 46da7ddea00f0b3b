use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes::{auth, documents, health, members, organizations, rbac, shares};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::me,
        auth::my_usage,
        organizations::create_organization,
        organizations::list_organizations,
        organizations::get_organization,
        organizations::update_organization,
        organizations::organization_usage,
        organizations::check_quota,
        members::add_member,
        members::list_members,
        members::update_member,
        members::deactivate_member,
        rbac::list_roles,
        rbac::list_permissions,
        rbac::create_custom_role,
        documents::create_document,
        documents::list_documents,
        documents::get_document,
        documents::delete_document,
        shares::create_share,
        shares::list_shares,
        shares::revoke_share,
    ),
    components(
        schemas(
            models::user::User,
            models::user::RegisterRequest,
            models::user::LoginRequest,
            models::user::AuthResponse,
            models::user::UserUsageResponse,
            models::organization::Organization,
            models::organization::OrganizationCreateRequest,
            models::organization::OrganizationUpdateRequest,
            models::organization::OrgUsageResponse,
            models::organization::QuotaCheckResponse,
            models::membership::OrganizationMember,
            models::membership::MemberWithDetails,
            models::membership::MemberAddRequest,
            models::membership::MemberUpdateRequest,
            models::rbac::Role,
            models::rbac::Permission,
            models::rbac::RoleCreateRequest,
            models::rbac::RoleWithPermissions,
            models::document::Document,
            models::document::DocumentCreateRequest,
            models::sharing::DocumentShare,
            models::sharing::ShareCreateRequest,
            models::sharing::ShareLevel,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Authentication and account usage"),
        (name = "Organizations", description = "Tenant management, usage and quota"),
        (name = "Members", description = "Organization membership"),
        (name = "RBAC", description = "Role and permission catalog"),
        (name = "Documents", description = "Document records and lifecycle"),
        (name = "Sharing", description = "Document sharing grants"),
        (name = "Health", description = "Liveness probe")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
