//! `stockforge-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod codes;
pub mod entity;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use codes::{BatchNumber, ConditionCode, LocationCode, Sku};
pub use entity::{Entity, find_entity};
pub use error::{DomainError, DomainResult, ShortfallKind};
pub use id::{AggregateId, ClientId, UserId};
pub use lifecycle::{Deletion, Lifecycle};
pub use value_object::ValueObject;
