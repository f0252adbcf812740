//! Warehouse consistency engine: storage, ledger, fulfillment, receiving and
//! the auto-release reconciler, composed behind [`WarehouseEngine`].

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod fulfillment;
pub mod journal;
pub mod ledger;
pub mod receiving;
pub mod reconciler;
pub mod scheduler;
pub mod store;


pub use collaborators::{
    AuditEvent, AuditLogger, AuditOutcome, Collaborators, FixedWindowRateLimiter,
    InMemoryAuditLog, PermissionChecker, RateLimitPolicy, RateLimiter, RbacPermissionChecker,
    TracingAuditLogger,
};
pub use config::EngineConfig;
pub use engine::{ManualReceipt, MovementEnvelope, WarehouseEngine};
pub use error::EngineError;
pub use fulfillment::{NewOrder, OrderEdit, OrderPlacement};
pub use journal::JournalReconciliation;
pub use ledger::{ReceiveOutcome, ReservationOutcome};
pub use receiving::{AsnDeletionReport, AsnLineError, AsnProcessingReport, NewAsn};
pub use reconciler::{AutoReleaseError, AutoReleaseReport};
pub use scheduler::{AutoReleaseHandle, SchedulerStats};
pub use store::{Committed, InMemoryWarehouseStore, StoreError, StoreTx, WarehouseStore};
