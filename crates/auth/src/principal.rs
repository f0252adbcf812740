use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use stockforge_core::UserId;

use crate::{Permission, Role};

/// An authenticated actor as seen by the engine.
///
/// How the principal was authenticated is not this crate's concern; callers
/// build it from whatever session or token layer they use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: UserId,
    pub roles: Vec<Role>,
    /// Permissions granted directly, on top of role defaults.
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(principal_id: UserId, roles: Vec<Role>) -> Self {
        Self {
            principal_id,
            roles,
            permissions: Vec::new(),
        }
    }

    /// Internal actor used by scheduled jobs (the auto-release reconciler).
    pub fn system() -> Self {
        Self::new(UserId::system(), vec![Role::ADMIN])
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Role defaults plus direct grants, deduplicated and sorted.
    pub fn effective_permissions(&self) -> BTreeSet<String> {
        self.roles
            .iter()
            .flat_map(|r| r.default_permissions())
            .chain(self.permissions.iter().cloned())
            .map(|p| p.as_str().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_permissions_merge_roles_and_grants() {
        let principal = Principal::new(UserId::new(), vec![Role::OPERATOR])
            .with_permission(Permission::INVENTORY_DELETE);
        let perms = principal.effective_permissions();
        assert!(perms.contains("inventory.delete"));
        assert!(perms.contains("orders.create"));
    }

    #[test]
    fn system_principal_is_admin() {
        let system = Principal::system();
        assert!(system.principal_id.is_system());
        assert!(system.has_role(&Role::ADMIN));
        assert!(system.effective_permissions().contains("*"));
    }
}
