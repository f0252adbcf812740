//! Transactional warehouse storage.
//!
//! All ledger-mutating sequences run inside [`WarehouseStore::transaction`].
//! The closure sees a [`StoreTx`]: every read inside it observes the writes
//! made earlier in the same transaction, and nothing becomes visible to other
//! callers until the closure returns `Ok`. Returning `Err` discards every
//! write (quantities, orders, ASNs and journal entries alike).
//!
//! Batch operations open a savepoint per item so that a failed item can be
//! undone without losing the items committed before it.

use std::sync::Arc;

use thiserror::Error;

use stockforge_core::{ClientId, Sku};
use stockforge_inventory::{InventoryId, InventoryRecord, MovementEntry, ReceiptRef, StockKey};
use stockforge_orders::{OrderId, OrderStatus, OutboundOrder};
use stockforge_receiving::{Asn, AsnId};

mod in_memory;

pub use in_memory::InMemoryWarehouseStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A previous holder of the store lock panicked.
    #[error("store lock poisoned")]
    Poisoned,

    /// Savepoint used out of order or after release.
    #[error("invalid savepoint: {0}")]
    Savepoint(String),

    /// The backing store rejected the operation.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Result of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    /// Journal entries appended by the transaction, in journal order.
    pub movements: Vec<MovementEntry>,
}

/// Handle to a savepoint inside a transaction.
///
/// Savepoints nest: rolling back to or releasing one also discards every
/// savepoint opened after it.
#[derive(Debug, PartialEq, Eq)]
pub struct Savepoint(pub(crate) usize);

/// Operations available inside a transaction.
///
/// Shared references are reads; `&mut` methods are writes. A read-only view
/// (see [`WarehouseStore::read`]) hands out `&dyn StoreTx`, so it cannot write.
pub trait StoreTx {
    fn inventory(&self, id: InventoryId) -> Result<Option<InventoryRecord>, StoreError>;

    /// The active record at exactly this stock position, if any.
    fn inventory_by_key(&self, key: &StockKey) -> Result<Option<InventoryRecord>, StoreError>;

    /// Every record of the SKU, deleted ones included, oldest first.
    fn inventory_for_sku(&self, sku: &Sku) -> Result<Vec<InventoryRecord>, StoreError>;

    fn inventory_by_receipt(&self, receipt: &ReceiptRef)
    -> Result<Vec<InventoryRecord>, StoreError>;

    fn put_inventory(&mut self, record: InventoryRecord) -> Result<(), StoreError>;

    fn order(&self, id: OrderId) -> Result<Option<OutboundOrder>, StoreError>;

    fn order_by_number(
        &self,
        client_id: ClientId,
        order_number: &str,
    ) -> Result<Option<OutboundOrder>, StoreError>;

    fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<OutboundOrder>, StoreError>;

    fn orders_for_sku(&self, sku: &Sku) -> Result<Vec<OutboundOrder>, StoreError>;

    /// Next order intake sequence (monotonic, never reused after commit).
    fn next_order_sequence(&mut self) -> Result<u64, StoreError>;

    fn put_order(&mut self, order: OutboundOrder) -> Result<(), StoreError>;

    fn asn(&self, id: AsnId) -> Result<Option<Asn>, StoreError>;

    fn asn_by_number(&self, asn_number: &str) -> Result<Option<Asn>, StoreError>;

    fn put_asn(&mut self, asn: Asn) -> Result<(), StoreError>;

    /// Append a journal entry, assigning its sequence. Returns the stored entry.
    fn append_movement(&mut self, entry: MovementEntry) -> Result<MovementEntry, StoreError>;

    fn movements_for_sku(&self, sku: &Sku) -> Result<Vec<MovementEntry>, StoreError>;

    fn savepoint(&mut self) -> Result<Savepoint, StoreError>;

    /// Undo everything written since `savepoint` was opened.
    fn rollback_to(&mut self, savepoint: Savepoint) -> Result<(), StoreError>;

    /// Keep everything written since `savepoint` was opened.
    fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<(), StoreError>;
}

/// Storage backend for the warehouse engine.
pub trait WarehouseStore: Send + Sync {
    /// Run `f` atomically. `Ok` commits, `Err` rolls everything back.
    fn transaction<T, E, F>(&self, f: F) -> Result<Committed<T>, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>;

    /// Run `f` against a consistent read-only snapshot.
    fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn StoreTx) -> T;
}

impl<S> WarehouseStore for Arc<S>
where
    S: WarehouseStore,
{
    fn transaction<T, E, F>(&self, f: F) -> Result<Committed<T>, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transaction(f)
    }

    fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn StoreTx) -> T,
    {
        (**self).read(f)
    }
}
