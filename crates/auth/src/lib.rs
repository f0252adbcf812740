//! `stockforge-auth`: pure authorization policy.
//!
//! Role-based: principals carry roles (each mapping to default permissions)
//! plus direct grants. Decoupled from transport, sessions and storage.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthorizationExplanation, AuthzError, authorize, explain_authorization};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
