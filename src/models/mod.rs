pub mod document;
pub mod membership;
pub mod organization;
pub mod rbac;
pub mod sharing;
pub mod user;
