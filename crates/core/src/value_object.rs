//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two `Sku`s with
/// the same code are the same SKU, two `Deletion`s with the same fields
/// describe the same deletion. To "modify" one, build a new one.
///
/// ```ignore
/// let a = Sku::parse("A-100")?;
/// let b = Sku::parse(" A-100 ")?;
/// assert_eq!(a, b); // normalised, equal by value
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
