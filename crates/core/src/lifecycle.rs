//! Explicit soft-delete life cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;
use crate::value_object::ValueObject;

/// Who deleted something, when and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletion {
    pub at: DateTime<Utc>,
    pub by: UserId,
    pub reason: String,
}

impl ValueObject for Deletion {}

/// Life cycle of a soft-deletable entity.
///
/// Deleted entities stay in storage for audit continuity; they are simply no
/// longer eligible for any business operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted(Deletion),
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    pub fn deletion(&self) -> Option<&Deletion> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted(d) => Some(d),
        }
    }
}
