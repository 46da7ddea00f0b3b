pub mod auth;
pub mod documents;
pub mod health;
pub mod members;
pub mod organizations;
pub mod rbac;
pub mod shares;
