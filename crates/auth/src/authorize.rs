use serde::Serialize;
use thiserror::Error;

use stockforge_core::UserId;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{permission}'")]
    Forbidden { principal: UserId, permission: String },
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms = principal.effective_permissions();
    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            principal: principal.principal_id,
            permission: required.as_str().to_string(),
        })
    }
}

/// Detailed explanation of an authorization decision, for audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub principal_id: UserId,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    /// Roles that would have granted the permission, when denied.
    pub granting_roles: Vec<String>,
}

/// Explain why an authorization decision was made (or would be made).
pub fn explain_authorization(
    principal: &Principal,
    required: &Permission,
) -> AuthorizationExplanation {
    let required_str = required.as_str();
    let effective: Vec<String> = principal.effective_permissions().into_iter().collect();
    let has_wildcard = effective.iter().any(|p| p == "*");
    let has_required = effective.iter().any(|p| p == required_str);

    let (granted, reason, granting_roles) = if has_wildcard {
        (true, "principal holds wildcard permission '*'".to_string(), Vec::new())
    } else if has_required {
        (true, format!("principal holds permission '{required_str}'"), Vec::new())
    } else {
        let granting = [crate::Role::ADMIN, crate::Role::MANAGER, crate::Role::OPERATOR]
            .iter()
            .filter(|role| {
                role.default_permissions()
                    .iter()
                    .any(|p| p.is_wildcard() || p == required)
            })
            .map(|role| role.as_str().to_string())
            .collect();
        (false, format!("missing required permission '{required_str}'"), granting)
    };

    AuthorizationExplanation {
        required_permission: required_str.to_string(),
        granted,
        reason,
        principal_id: principal.principal_id,
        roles: principal.roles.iter().map(|r| r.as_str().to_string()).collect(),
        effective_permissions: effective,
        granting_roles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn operator_cannot_delete_inventory() {
        let operator = Principal::new(UserId::new(), vec![Role::OPERATOR]);
        let err = authorize(&operator, &Permission::INVENTORY_DELETE).unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden { ref permission, .. } if permission == "inventory.delete"));
        assert!(authorize(&operator, &Permission::ORDERS_CREATE).is_ok());
    }

    #[test]
    fn wildcard_grants_everything() {
        let admin = Principal::new(UserId::new(), vec![Role::ADMIN]);
        assert!(authorize(&admin, &Permission::new("anything.at.all")).is_ok());
    }

    #[test]
    fn principal_without_roles_is_denied() {
        let nobody = Principal::new(UserId::new(), vec![]);
        assert!(authorize(&nobody, &Permission::ASN_PROCESS).is_err());
    }

    #[test]
    fn explanation_names_roles_that_would_grant() {
        let operator = Principal::new(UserId::new(), vec![Role::OPERATOR]);
        let explanation = explain_authorization(&operator, &Permission::INVENTORY_DELETE);
        assert!(!explanation.granted);
        assert_eq!(explanation.granting_roles, vec!["admin", "manager"]);

        let manager = Principal::new(UserId::new(), vec![Role::MANAGER]);
        assert!(explain_authorization(&manager, &Permission::INVENTORY_DELETE).granted);
    }
}
