use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "orders.create"). The wildcard `"*"`
/// grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub const ORDERS_CREATE: Permission = Permission::from_static("orders.create");
    pub const ORDERS_TRANSITION: Permission = Permission::from_static("orders.transition");
    pub const ORDERS_EDIT: Permission = Permission::from_static("orders.edit");
    pub const INVENTORY_RECEIVE: Permission = Permission::from_static("inventory.receive");
    pub const INVENTORY_DELETE: Permission = Permission::from_static("inventory.delete");
    pub const ASN_MANAGE: Permission = Permission::from_static("asn.manage");
    pub const ASN_PROCESS: Permission = Permission::from_static("asn.process");
    pub const ALLOCATION_RUN: Permission = Permission::from_static("allocation.run");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Every non-wildcard permission the engine checks.
    pub fn all() -> Vec<Permission> {
        vec![
            Self::ORDERS_CREATE,
            Self::ORDERS_TRANSITION,
            Self::ORDERS_EDIT,
            Self::INVENTORY_RECEIVE,
            Self::INVENTORY_DELETE,
            Self::ASN_MANAGE,
            Self::ASN_PROCESS,
            Self::ALLOCATION_RUN,
        ]
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
