//! Inventory ledger domain module.
//!
//! Business rules for stock records and the movement journal, implemented
//! purely as deterministic domain logic (no IO, no storage, no locking).

pub mod movement;
pub mod record;

pub use movement::{
    JournalTotals, MovementContext, MovementEntry, MovementType, movement_for, replay,
};
pub use record::{
    ConsumeStock, DeleteRecord, InventoryCommand, InventoryEvent, InventoryId, InventoryRecord,
    OrphanReceipt, ReceiptOrphaned, ReceiptRef, ReceiveStock, RecordDeleted, RecordOpened,
    ReleaseStock, ReservationReleased, ReserveStock, StockConsumed, StockKey, StockReceived,
    StockReserved,
};
