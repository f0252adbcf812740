//! Movement journal entries.
//!
//! Every quantity change on an [`InventoryRecord`] produces exactly one
//! [`MovementEntry`]. Entries are append-only facts: replaying them for a SKU
//! reconstructs its current on-hand and allocated totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockforge_core::{LocationCode, Sku, UserId};
use stockforge_events::Event;

use crate::record::{InventoryEvent, InventoryId, InventoryRecord};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Stock received (ASN putaway or manual receipt). Positive on-hand delta.
    Inbound,
    /// Stock reserved for an order. Positive allocated delta.
    Allocation,
    /// Reservation returned (cancel / override). Negative allocated delta.
    Release,
    /// Reserved stock shipped. Negative delta on both on-hand and allocated.
    Shipment,
    /// Record soft-deleted. Negative on-hand delta equal to what was written off.
    Deletion,
    /// Source ASN deleted; the record was relabelled. Zero delta.
    AsnDeletion,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Inbound => "INBOUND",
            MovementType::Allocation => "ALLOCATION",
            MovementType::Release => "RELEASE",
            MovementType::Shipment => "SHIPMENT",
            MovementType::Deletion => "DELETION",
            MovementType::AsnDeletion => "ASN_DELETION",
        }
    }

    pub fn affects_on_hand(&self) -> bool {
        matches!(
            self,
            MovementType::Inbound | MovementType::Shipment | MovementType::Deletion
        )
    }

    pub fn affects_allocated(&self) -> bool {
        matches!(
            self,
            MovementType::Allocation | MovementType::Release | MovementType::Shipment
        )
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub movement_id: Uuid,
    /// Journal position, assigned by storage on append (0 until then).
    pub sequence: u64,
    pub inventory_id: InventoryId,
    pub sku: Sku,
    pub movement_type: MovementType,
    /// Signed quantity delta for the quantity (or quantities) the type governs.
    pub quantity: i64,
    pub from_location: Option<LocationCode>,
    pub to_location: Option<LocationCode>,
    /// Order number, ASN number or free-form reference that caused the movement.
    pub reference: String,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl MovementEntry {
    pub fn on_hand_delta(&self) -> i64 {
        if self.movement_type.affects_on_hand() {
            self.quantity
        } else {
            0
        }
    }

    pub fn allocated_delta(&self) -> i64 {
        if self.movement_type.affects_allocated() {
            self.quantity
        } else {
            0
        }
    }
}

impl Event for MovementEntry {
    fn event_type(&self) -> &'static str {
        match self.movement_type {
            MovementType::Inbound => "inventory.movement.inbound",
            MovementType::Allocation => "inventory.movement.allocation",
            MovementType::Release => "inventory.movement.release",
            MovementType::Shipment => "inventory.movement.shipment",
            MovementType::Deletion => "inventory.movement.deletion",
            MovementType::AsnDeletion => "inventory.movement.asn_deletion",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Who and what caused a batch of movements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementContext {
    pub reference: String,
    pub actor: UserId,
}

impl MovementContext {
    pub fn new(reference: impl Into<String>, actor: UserId) -> Self {
        Self {
            reference: reference.into(),
            actor,
        }
    }
}

/// Map an applied inventory event to its journal entry.
///
/// `record` is the state *after* the event was applied. Events that do not
/// change quantities or provenance (record opening) have no entry.
pub fn movement_for(
    record: &InventoryRecord,
    event: &InventoryEvent,
    ctx: &MovementContext,
) -> Option<MovementEntry> {
    let here = Some(record.location().clone());
    let (movement_type, quantity, from_location, to_location, occurred_at) = match event {
        InventoryEvent::RecordOpened(_) => return None,
        InventoryEvent::StockReceived(e) => {
            (MovementType::Inbound, e.qty, None, here, e.occurred_at)
        }
        InventoryEvent::StockReserved(e) => (
            MovementType::Allocation,
            e.qty,
            here.clone(),
            here,
            e.occurred_at,
        ),
        InventoryEvent::ReservationReleased(e) => (
            MovementType::Release,
            -e.qty,
            here.clone(),
            here,
            e.occurred_at,
        ),
        InventoryEvent::StockConsumed(e) => {
            (MovementType::Shipment, -e.qty, here, None, e.occurred_at)
        }
        InventoryEvent::RecordDeleted(e) => (
            MovementType::Deletion,
            -e.on_hand_removed,
            here,
            None,
            e.deletion.at,
        ),
        InventoryEvent::ReceiptOrphaned(e) => (
            MovementType::AsnDeletion,
            0,
            here.clone(),
            here,
            e.occurred_at,
        ),
    };

    Some(MovementEntry {
        movement_id: Uuid::now_v7(),
        sequence: 0,
        inventory_id: record.id_typed(),
        sku: record.sku().clone(),
        movement_type,
        quantity,
        from_location,
        to_location,
        reference: ctx.reference.clone(),
        actor: ctx.actor,
        occurred_at,
    })
}

/// Quantities reconstructed from journal entries.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTotals {
    pub on_hand: i64,
    pub allocated: i64,
    pub entries: usize,
}

/// Fold journal entries into totals (order-independent: deltas commute).
pub fn replay<'a>(entries: impl IntoIterator<Item = &'a MovementEntry>) -> JournalTotals {
    entries
        .into_iter()
        .fold(JournalTotals::default(), |mut totals, entry| {
            totals.on_hand += entry.on_hand_delta();
            totals.allocated += entry.allocated_delta();
            totals.entries += 1;
            totals
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        ConsumeStock, DeleteRecord, InventoryCommand, ReceiptRef, ReceiveStock, ReleaseStock,
        ReserveStock, StockKey,
    };
    use stockforge_core::{Aggregate, ConditionCode, Deletion};

    fn run(record: &mut InventoryRecord, cmd: InventoryCommand, journal: &mut Vec<MovementEntry>) {
        let ctx = MovementContext::new("TEST", UserId::new());
        for event in record.execute(&cmd).unwrap() {
            if let Some(entry) = movement_for(record, &event, &ctx) {
                journal.push(entry);
            }
        }
    }

    fn new_record() -> InventoryRecord {
        InventoryRecord::empty(
            InventoryId::generate(),
            StockKey {
                sku: Sku::parse("SKU-J").unwrap(),
                batch: None,
                location: LocationCode::parse("B-02").unwrap(),
                expiry: None,
            },
            ConditionCode::good(),
        )
    }

    #[test]
    fn replay_reconstructs_record_quantities() {
        let mut record = new_record();
        let mut journal = Vec::new();
        let now = Utc::now();

        run(
            &mut record,
            InventoryCommand::Receive(ReceiveStock {
                qty: 100,
                receipt: ReceiptRef::Manual("R1".to_string()),
                occurred_at: now,
            }),
            &mut journal,
        );
        run(&mut record, InventoryCommand::Reserve(ReserveStock { qty: 60, occurred_at: now }), &mut journal);
        run(&mut record, InventoryCommand::Consume(ConsumeStock { qty: 30, occurred_at: now }), &mut journal);
        run(&mut record, InventoryCommand::Release(ReleaseStock { qty: 30, occurred_at: now }), &mut journal);

        let totals = replay(&journal);
        assert_eq!(totals.on_hand, record.qty_on_hand());
        assert_eq!(totals.allocated, record.qty_allocated());
        assert_eq!(totals.entries, 4);
    }

    #[test]
    fn deletion_entry_writes_off_remaining_stock() {
        let mut record = new_record();
        let mut journal = Vec::new();
        let now = Utc::now();

        run(
            &mut record,
            InventoryCommand::Receive(ReceiveStock {
                qty: 12,
                receipt: ReceiptRef::Manual("R2".to_string()),
                occurred_at: now,
            }),
            &mut journal,
        );
        run(
            &mut record,
            InventoryCommand::Delete(DeleteRecord {
                deletion: Deletion {
                    at: now,
                    by: UserId::new(),
                    reason: "expired".to_string(),
                },
            }),
            &mut journal,
        );

        let last = journal.last().unwrap();
        assert_eq!(last.movement_type, MovementType::Deletion);
        assert_eq!(last.quantity, -12);
        assert_eq!(replay(&journal).on_hand, 0);
    }

    #[test]
    fn shipment_moves_stock_out_of_the_location() {
        let mut record = new_record();
        let mut journal = Vec::new();
        let now = Utc::now();
        run(
            &mut record,
            InventoryCommand::Receive(ReceiveStock {
                qty: 5,
                receipt: ReceiptRef::Manual("R3".to_string()),
                occurred_at: now,
            }),
            &mut journal,
        );
        run(&mut record, InventoryCommand::Reserve(ReserveStock { qty: 5, occurred_at: now }), &mut journal);
        run(&mut record, InventoryCommand::Consume(ConsumeStock { qty: 5, occurred_at: now }), &mut journal);

        let shipment = journal.last().unwrap();
        assert_eq!(shipment.from_location.as_ref().map(|l| l.as_str()), Some("B-02"));
        assert!(shipment.to_location.is_none());
        assert_eq!(shipment.on_hand_delta(), -5);
        assert_eq!(shipment.allocated_delta(), -5);
        assert_eq!(shipment.event_type(), "inventory.movement.shipment");
    }
}
