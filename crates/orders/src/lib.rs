//! Outbound order fulfillment domain module.
//!
//! The order life cycle (HOLD → RELEASED → ALLOCATED → PICKED → SHIPPED, plus
//! PARTIAL and CANCELLED) as a pure aggregate. Ledger effects are decided by
//! the caller and passed in as reservations; this crate only enforces that
//! status and reservation always agree.

pub mod order;

pub use order::{
    AllocateOrder, CancelOrder, CreateOrder, DeliveryDetails, EditOrder, OrderAllocated,
    OrderCancelled, OrderCommand, OrderCreated, OrderEdited, OrderEvent, OrderId, OrderLine,
    OrderPicked, OrderReleased, OrderShipped, OrderStatus, OutboundOrder, OverrideStatus,
    PickOrder, ReleaseOrder, Reservation, ShipOrder, StatusOverridden,
};
