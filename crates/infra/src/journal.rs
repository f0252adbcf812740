//! Movement journal publication and reconciliation.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stockforge_core::Sku;
use stockforge_events::{Event, EventBus, EventEnvelope};
use stockforge_inventory::{JournalTotals, MovementEntry, replay};

use crate::error::EngineError;
use crate::store::StoreTx;

/// Aggregate type stamped on published movement envelopes.
pub const MOVEMENT_AGGREGATE_TYPE: &str = "inventory.record";

pub fn envelope(entry: MovementEntry) -> EventEnvelope<MovementEntry> {
    EventEnvelope::new(
        entry.movement_id,
        entry.inventory_id.0,
        MOVEMENT_AGGREGATE_TYPE,
        entry.event_type(),
        entry.sequence,
        entry,
    )
}

/// Publish committed journal entries.
///
/// Entries are durable before this runs, so a failed publish is logged and
/// skipped rather than surfaced to the caller. Returns how many were delivered.
pub fn publish_movements<B>(bus: &B, movements: Vec<MovementEntry>) -> usize
where
    B: EventBus<EventEnvelope<MovementEntry>> + ?Sized,
{
    let mut published = 0;
    for entry in movements {
        let sequence = entry.sequence;
        match bus.publish(envelope(entry)) {
            Ok(()) => published += 1,
            Err(e) => warn!(sequence, error = ?e, "failed to publish movement"),
        }
    }
    if published > 0 {
        debug!(published, "movements published");
    }
    published
}

/// Journal totals for a SKU compared with the stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalReconciliation {
    pub replayed: JournalTotals,
    pub on_hand: i64,
    pub allocated: i64,
}

impl JournalReconciliation {
    pub fn is_consistent(&self) -> bool {
        self.replayed.on_hand == self.on_hand && self.replayed.allocated == self.allocated
    }
}

/// Replay the journal of `sku` and compare it with the sum over its records.
///
/// Deleted records count with their remaining quantities (zero on hand after
/// the write-off), so the two sides must agree exactly.
pub fn reconcile(tx: &dyn StoreTx, sku: &Sku) -> Result<JournalReconciliation, EngineError> {
    let entries = tx.movements_for_sku(sku)?;
    let records = tx.inventory_for_sku(sku)?;
    Ok(JournalReconciliation {
        replayed: replay(&entries),
        on_hand: records.iter().map(|r| r.qty_on_hand()).sum(),
        allocated: records.iter().map(|r| r.qty_allocated()).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockforge_core::{LocationCode, UserId};
    use stockforge_events::InMemoryEventBus;
    use stockforge_inventory::{InventoryId, MovementType};
    use uuid::Uuid;

    fn entry(sequence: u64, movement_type: MovementType, quantity: i64) -> MovementEntry {
        MovementEntry {
            movement_id: Uuid::now_v7(),
            sequence,
            inventory_id: InventoryId::generate(),
            sku: Sku::parse("SKU-1").unwrap(),
            movement_type,
            quantity,
            from_location: None,
            to_location: Some(LocationCode::parse("A-01").unwrap()),
            reference: "ASN-1".to_string(),
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn envelopes_carry_journal_position_and_type() {
        let env = envelope(entry(7, MovementType::Inbound, 5));
        assert_eq!(env.sequence_number(), 7);
        assert_eq!(env.event_type(), "inventory.movement.inbound");
        assert_eq!(env.aggregate_type(), MOVEMENT_AGGREGATE_TYPE);
        assert_eq!(env.aggregate_id(), env.payload().inventory_id.0);
    }

    #[test]
    fn publishes_in_order_to_subscribers() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe();

        let sent = publish_movements(
            &bus,
            vec![
                entry(1, MovementType::Inbound, 10),
                entry(2, MovementType::Allocation, 4),
            ],
        );
        assert_eq!(sent, 2);

        let got: Vec<u64> = sub.drain().iter().map(|e| e.sequence_number()).collect();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn reconciliation_flags_drift() {
        let ok = JournalReconciliation {
            replayed: JournalTotals { on_hand: 10, allocated: 4, entries: 2 },
            on_hand: 10,
            allocated: 4,
        };
        assert!(ok.is_consistent());

        let drifted = JournalReconciliation { on_hand: 9, ..ok };
        assert!(!drifted.is_consistent());
    }
}
