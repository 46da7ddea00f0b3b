//! Authorization core: permission catalog, role registry, membership
//! resolution, sharing grants and the single decision gate.
//!
//! Every access decision goes through [`gate::AccessPolicy::is_authorized`]
//! with a fixed precedence: ownership shortcut, then organization role
//! permission, then a live sharing grant. Decisions are computed fresh on
//! every call; nothing here caches an allow across requests.

pub mod catalog;
pub mod gate;
pub mod resolver;
pub mod sharing;

/// Well-known role names (seeded system roles).
pub mod roles {
    pub const ORG_OWNER: &str = "org_owner";
    pub const ORG_ADMIN: &str = "org_admin";
    pub const DOCUMENT_MANAGER: &str = "document_manager";
    pub const EDITOR: &str = "editor";
    pub const VIEWER: &str = "viewer";
}

/// Well-known permission names. Opaque tokens compared for exact equality;
/// no wildcards, no category-derived behavior.
pub mod permissions {
    // Document
    pub const DOCUMENT_VIEW: &str = "document.view";
    pub const DOCUMENT_CREATE: &str = "document.create";
    pub const DOCUMENT_EDIT: &str = "document.edit";
    pub const DOCUMENT_COMMENT: &str = "document.comment";
    pub const DOCUMENT_DELETE: &str = "document.delete";
    pub const DOCUMENT_SHARE: &str = "document.share";
    pub const DOCUMENT_DOWNLOAD: &str = "document.download";
    pub const DOCUMENT_MANAGE_ALL: &str = "document.manage_all";

    // User management
    pub const USER_VIEW: &str = "user.view";
    pub const USER_INVITE: &str = "user.invite";
    pub const USER_REMOVE: &str = "user.remove";

    // Roles
    pub const ROLE_ASSIGN: &str = "role.assign";

    // Organization
    pub const ORG_MANAGE: &str = "org.manage";

    // Billing
    pub const BILLING_MANAGE: &str = "billing.manage";

    // Search
    pub const SEARCH_USE: &str = "search.use";
}
