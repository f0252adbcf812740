use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockforge_core::{
    Aggregate, AggregateId, AggregateRoot, BatchNumber, ConditionCode, Deletion, DomainError,
    Lifecycle, LocationCode, ShortfallKind, Sku,
};
use stockforge_events::Event;

/// Stock record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryId(pub AggregateId);

impl InventoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for InventoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Physical stock position: a record is found-or-created by this key on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub sku: Sku,
    pub batch: Option<BatchNumber>,
    pub location: LocationCode,
    pub expiry: Option<NaiveDate>,
}

/// Where the stock on a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reference", rename_all = "snake_case")]
pub enum ReceiptRef {
    /// Put away from an ASN (by ASN number).
    Asn(String),
    /// Received manually against a free-form reference.
    Manual(String),
    /// The source ASN was deleted after the stock was received.
    Orphaned(String),
}

impl ReceiptRef {
    pub fn reference(&self) -> &str {
        match self {
            ReceiptRef::Asn(r) | ReceiptRef::Manual(r) | ReceiptRef::Orphaned(r) => r,
        }
    }
}

/// Aggregate root: one stock position with its on-hand and allocated quantities.
///
/// Invariant: `0 <= qty_allocated <= qty_on_hand` after every applied event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    id: InventoryId,
    key: StockKey,
    condition: ConditionCode,
    qty_on_hand: i64,
    qty_allocated: i64,
    receipt: Option<ReceiptRef>,
    lifecycle: Lifecycle,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    opened: bool,
}

impl InventoryRecord {
    /// A not-yet-opened record for `key`; the first receipt opens it.
    pub fn empty(id: InventoryId, key: StockKey, condition: ConditionCode) -> Self {
        Self {
            id,
            key,
            condition,
            qty_on_hand: 0,
            qty_allocated: 0,
            receipt: None,
            lifecycle: Lifecycle::Active,
            created_at: None,
            updated_at: None,
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> InventoryId {
        self.id
    }

    pub fn key(&self) -> &StockKey {
        &self.key
    }

    pub fn sku(&self) -> &Sku {
        &self.key.sku
    }

    pub fn location(&self) -> &LocationCode {
        &self.key.location
    }

    pub fn condition(&self) -> &ConditionCode {
        &self.condition
    }

    pub fn qty_on_hand(&self) -> i64 {
        self.qty_on_hand
    }

    pub fn qty_allocated(&self) -> i64 {
        self.qty_allocated
    }

    /// `qty_on_hand - qty_allocated`; never negative while the invariant holds.
    pub fn qty_available(&self) -> i64 {
        self.qty_on_hand - self.qty_allocated
    }

    pub fn receipt(&self) -> Option<&ReceiptRef> {
        self.receipt.as_ref()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.opened && self.lifecycle.is_active()
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn invariant_holds(&self) -> bool {
        0 <= self.qty_allocated && self.qty_allocated <= self.qty_on_hand
    }
}

impl AggregateRoot for InventoryRecord {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReceiveStock (opens the record on first receipt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub qty: i64,
    pub receipt: ReceiptRef,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock (give back a reservation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsumeStock (shipment of reserved stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeStock {
    pub qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteRecord (soft delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecord {
    pub deletion: Deletion,
}

/// Command: OrphanReceipt (source ASN deleted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanReceipt {
    pub asn_number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    Receive(ReceiveStock),
    Reserve(ReserveStock),
    Release(ReleaseStock),
    Consume(ConsumeStock),
    Delete(DeleteRecord),
    Orphan(OrphanReceipt),
}

/// Event: RecordOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOpened {
    pub inventory_id: InventoryId,
    pub key: StockKey,
    pub condition: ConditionCode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub inventory_id: InventoryId,
    pub qty: i64,
    pub receipt: ReceiptRef,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub inventory_id: InventoryId,
    pub qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub inventory_id: InventoryId,
    pub qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockConsumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConsumed {
    pub inventory_id: InventoryId,
    pub qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecordDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDeleted {
    pub inventory_id: InventoryId,
    /// On-hand quantity written off by the deletion.
    pub on_hand_removed: i64,
    pub deletion: Deletion,
}

/// Event: ReceiptOrphaned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptOrphaned {
    pub inventory_id: InventoryId,
    pub asn_number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    RecordOpened(RecordOpened),
    StockReceived(StockReceived),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    StockConsumed(StockConsumed),
    RecordDeleted(RecordDeleted),
    ReceiptOrphaned(ReceiptOrphaned),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::RecordOpened(_) => "inventory.record.opened",
            InventoryEvent::StockReceived(_) => "inventory.record.received",
            InventoryEvent::StockReserved(_) => "inventory.record.reserved",
            InventoryEvent::ReservationReleased(_) => "inventory.record.released",
            InventoryEvent::StockConsumed(_) => "inventory.record.consumed",
            InventoryEvent::RecordDeleted(_) => "inventory.record.deleted",
            InventoryEvent::ReceiptOrphaned(_) => "inventory.record.orphaned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::RecordOpened(e) => e.occurred_at,
            InventoryEvent::StockReceived(e) => e.occurred_at,
            InventoryEvent::StockReserved(e) => e.occurred_at,
            InventoryEvent::ReservationReleased(e) => e.occurred_at,
            InventoryEvent::StockConsumed(e) => e.occurred_at,
            InventoryEvent::RecordDeleted(e) => e.deletion.at,
            InventoryEvent::ReceiptOrphaned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryRecord {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::RecordOpened(e) => {
                self.key = e.key.clone();
                self.condition = e.condition.clone();
                self.qty_on_hand = 0;
                self.qty_allocated = 0;
                self.lifecycle = Lifecycle::Active;
                self.created_at = Some(e.occurred_at);
                self.opened = true;
            }
            InventoryEvent::StockReceived(e) => {
                self.qty_on_hand += e.qty;
                self.receipt = Some(e.receipt.clone());
            }
            InventoryEvent::StockReserved(e) => {
                self.qty_allocated += e.qty;
            }
            InventoryEvent::ReservationReleased(e) => {
                self.qty_allocated -= e.qty;
            }
            InventoryEvent::StockConsumed(e) => {
                self.qty_on_hand -= e.qty;
                self.qty_allocated -= e.qty;
            }
            InventoryEvent::RecordDeleted(e) => {
                self.qty_on_hand -= e.on_hand_removed;
                self.lifecycle = Lifecycle::Deleted(e.deletion.clone());
            }
            InventoryEvent::ReceiptOrphaned(e) => {
                self.receipt = Some(ReceiptRef::Orphaned(e.asn_number.clone()));
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::Receive(cmd) => self.handle_receive(cmd),
            InventoryCommand::Reserve(cmd) => self.handle_reserve(cmd),
            InventoryCommand::Release(cmd) => self.handle_release(cmd),
            InventoryCommand::Consume(cmd) => self.handle_consume(cmd),
            InventoryCommand::Delete(cmd) => self.handle_delete(cmd),
            InventoryCommand::Orphan(cmd) => self.handle_orphan(cmd),
        }
    }
}

impl InventoryRecord {
    fn ensure_open(&self) -> Result<(), DomainError> {
        if !self.opened {
            return Err(DomainError::not_found(format!("inventory record {}", self.id)));
        }
        if !self.lifecycle.is_active() {
            return Err(DomainError::already_terminal(format!(
                "inventory record {} is deleted",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_positive(qty: i64) -> Result<(), DomainError> {
        if qty <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(())
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        Self::ensure_positive(cmd.qty)?;
        if !self.lifecycle.is_active() {
            return Err(DomainError::already_terminal(format!(
                "inventory record {} is deleted",
                self.id
            )));
        }
        if self.qty_on_hand.checked_add(cmd.qty).is_none() {
            return Err(DomainError::validation("receipt would overflow on-hand quantity"));
        }

        let mut events = Vec::with_capacity(2);
        if !self.opened {
            events.push(InventoryEvent::RecordOpened(RecordOpened {
                inventory_id: self.id,
                key: self.key.clone(),
                condition: self.condition.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }
        events.push(InventoryEvent::StockReceived(StockReceived {
            inventory_id: self.id,
            qty: cmd.qty,
            receipt: cmd.receipt.clone(),
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_open()?;
        Self::ensure_positive(cmd.qty)?;

        let available = self.qty_available();
        if available < cmd.qty {
            return Err(DomainError::insufficient(
                ShortfallKind::Available,
                cmd.qty,
                available,
            ));
        }

        Ok(vec![InventoryEvent::StockReserved(StockReserved {
            inventory_id: self.id,
            qty: cmd.qty,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_open()?;
        Self::ensure_positive(cmd.qty)?;

        if self.qty_allocated - cmd.qty < 0 {
            return Err(DomainError::invariant(format!(
                "release of {} exceeds allocated quantity {}",
                cmd.qty, self.qty_allocated
            )));
        }

        Ok(vec![InventoryEvent::ReservationReleased(ReservationReleased {
            inventory_id: self.id,
            qty: cmd.qty,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_consume(&self, cmd: &ConsumeStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_open()?;
        Self::ensure_positive(cmd.qty)?;

        // Physical stock is the tighter constraint, so it is reported first.
        if self.qty_on_hand < cmd.qty {
            return Err(DomainError::insufficient(
                ShortfallKind::OnHand,
                cmd.qty,
                self.qty_on_hand,
            ));
        }
        if self.qty_allocated < cmd.qty {
            return Err(DomainError::insufficient(
                ShortfallKind::Allocated,
                cmd.qty,
                self.qty_allocated,
            ));
        }

        Ok(vec![InventoryEvent::StockConsumed(StockConsumed {
            inventory_id: self.id,
            qty: cmd.qty,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteRecord) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_open()?;

        if self.qty_allocated != 0 {
            return Err(DomainError::invariant(format!(
                "cannot delete inventory record {} while {} units are allocated",
                self.id, self.qty_allocated
            )));
        }
        if cmd.deletion.reason.trim().is_empty() {
            return Err(DomainError::validation("deletion reason cannot be empty"));
        }

        Ok(vec![InventoryEvent::RecordDeleted(RecordDeleted {
            inventory_id: self.id,
            on_hand_removed: self.qty_on_hand,
            deletion: cmd.deletion.clone(),
        })])
    }

    fn handle_orphan(&self, cmd: &OrphanReceipt) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found(format!("inventory record {}", self.id)));
        }

        match &self.receipt {
            Some(ReceiptRef::Asn(number)) if *number == cmd.asn_number => {
                Ok(vec![InventoryEvent::ReceiptOrphaned(ReceiptOrphaned {
                    inventory_id: self.id,
                    asn_number: cmd.asn_number.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            // Not sourced from this ASN (or already orphaned): nothing to relabel.
            _ => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockforge_core::UserId;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_key(sku: &str) -> StockKey {
        StockKey {
            sku: Sku::parse(sku).unwrap(),
            batch: None,
            location: LocationCode::parse("A-01").unwrap(),
            expiry: None,
        }
    }

    fn record_with(on_hand: i64, allocated: i64) -> InventoryRecord {
        let mut record =
            InventoryRecord::empty(InventoryId::generate(), test_key("SKU-A"), ConditionCode::good());
        if on_hand > 0 {
            record
                .execute(&InventoryCommand::Receive(ReceiveStock {
                    qty: on_hand,
                    receipt: ReceiptRef::Manual("seed".to_string()),
                    occurred_at: test_time(),
                }))
                .unwrap();
        }
        if allocated > 0 {
            record
                .execute(&InventoryCommand::Reserve(ReserveStock {
                    qty: allocated,
                    occurred_at: test_time(),
                }))
                .unwrap();
        }
        record
    }

    fn reserve(qty: i64) -> InventoryCommand {
        InventoryCommand::Reserve(ReserveStock {
            qty,
            occurred_at: test_time(),
        })
    }

    fn consume(qty: i64) -> InventoryCommand {
        InventoryCommand::Consume(ConsumeStock {
            qty,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn first_receipt_opens_the_record() {
        let record =
            InventoryRecord::empty(InventoryId::generate(), test_key("SKU-A"), ConditionCode::good());
        let events = record
            .handle(&InventoryCommand::Receive(ReceiveStock {
                qty: 10,
                receipt: ReceiptRef::Asn("ASN-1".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], InventoryEvent::RecordOpened(_)));
        match &events[1] {
            InventoryEvent::StockReceived(e) => assert_eq!(e.qty, 10),
            other => panic!("expected StockReceived, got {other:?}"),
        }
    }

    #[test]
    fn reserve_within_available_increments_allocated() {
        let mut record = record_with(100, 0);
        record.execute(&reserve(60)).unwrap();

        assert_eq!(record.qty_on_hand(), 100);
        assert_eq!(record.qty_allocated(), 60);
        assert_eq!(record.qty_available(), 40);
    }

    #[test]
    fn reserve_beyond_available_fails_without_mutation() {
        let record = record_with(100, 60);
        let before = record.clone();

        let err = record.handle(&reserve(50)).unwrap_err();
        assert_eq!(err, DomainError::insufficient(ShortfallKind::Available, 50, 40));
        assert_eq!(record, before);
    }

    #[test]
    fn release_below_zero_is_an_invariant_violation() {
        let record = record_with(10, 3);
        let err = record
            .handle(&InventoryCommand::Release(ReleaseStock {
                qty: 4,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn consume_reports_on_hand_shortfall_first() {
        // allocated can never exceed on_hand, so ask for more than both.
        let record = record_with(5, 5);
        let err = record.handle(&consume(6)).unwrap_err();
        assert_eq!(err, DomainError::insufficient(ShortfallKind::OnHand, 6, 5));
    }

    #[test]
    fn consume_requires_allocation() {
        let record = record_with(100, 20);
        let err = record.handle(&consume(30)).unwrap_err();
        assert_eq!(err, DomainError::insufficient(ShortfallKind::Allocated, 30, 20));
    }

    #[test]
    fn consume_decrements_both_quantities() {
        let mut record = record_with(100, 90);
        record.execute(&consume(30)).unwrap();
        assert_eq!(record.qty_on_hand(), 70);
        assert_eq!(record.qty_allocated(), 60);
    }

    #[test]
    fn delete_with_allocation_is_rejected() {
        let record = record_with(50, 10);
        let err = record
            .handle(&InventoryCommand::Delete(DeleteRecord {
                deletion: Deletion {
                    at: test_time(),
                    by: UserId::new(),
                    reason: "damaged".to_string(),
                },
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn delete_zeroes_on_hand_and_blocks_further_mutation() {
        let mut record = record_with(50, 0);
        record
            .execute(&InventoryCommand::Delete(DeleteRecord {
                deletion: Deletion {
                    at: test_time(),
                    by: UserId::new(),
                    reason: "stock count write-off".to_string(),
                },
            }))
            .unwrap();

        assert_eq!(record.qty_on_hand(), 0);
        assert!(!record.is_active());
        assert!(matches!(
            record.handle(&reserve(1)),
            Err(DomainError::AlreadyTerminal(_))
        ));
    }

    #[test]
    fn orphan_only_relabels_matching_asn() {
        let mut record =
            InventoryRecord::empty(InventoryId::generate(), test_key("SKU-B"), ConditionCode::good());
        record
            .execute(&InventoryCommand::Receive(ReceiveStock {
                qty: 20,
                receipt: ReceiptRef::Asn("ASN-9".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();

        let other = record
            .handle(&InventoryCommand::Orphan(OrphanReceipt {
                asn_number: "ASN-1".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(other.is_empty());

        record
            .execute(&InventoryCommand::Orphan(OrphanReceipt {
                asn_number: "ASN-9".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(record.receipt(), Some(&ReceiptRef::Orphaned("ASN-9".to_string())));
        assert_eq!(record.qty_on_hand(), 20);
    }

    #[test]
    fn version_increments_on_apply() {
        let record = record_with(10, 5);
        // opened + received + reserved
        assert_eq!(record.version(), 3);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let record = record_with(10, 0);
        let before = record.clone();
        let first = record.handle(&reserve(4)).unwrap();
        let second = record.handle(&reserve(4)).unwrap();
        assert_eq!(record, before);
        assert_eq!(first, second);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Receive(i64),
            Reserve(i64),
            Release(i64),
            Consume(i64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1i64..50).prop_map(Op::Receive),
                (1i64..50).prop_map(Op::Reserve),
                (1i64..50).prop_map(Op::Release),
                (1i64..50).prop_map(Op::Consume),
            ]
        }

        proptest! {
            #[test]
            fn allocated_never_exceeds_on_hand(ops in prop::collection::vec(op(), 1..60)) {
                let mut record = InventoryRecord::empty(
                    InventoryId::generate(),
                    test_key("SKU-P"),
                    ConditionCode::good(),
                );
                for op in ops {
                    let now = Utc::now();
                    let cmd = match op {
                        Op::Receive(qty) => InventoryCommand::Receive(ReceiveStock {
                            qty,
                            receipt: ReceiptRef::Manual("prop".to_string()),
                            occurred_at: now,
                        }),
                        Op::Reserve(qty) => InventoryCommand::Reserve(ReserveStock { qty, occurred_at: now }),
                        Op::Release(qty) => InventoryCommand::Release(ReleaseStock { qty, occurred_at: now }),
                        Op::Consume(qty) => InventoryCommand::Consume(ConsumeStock { qty, occurred_at: now }),
                    };
                    let before = record.clone();
                    if record.execute(&cmd).is_err() {
                        prop_assert_eq!(&record, &before);
                    }
                    prop_assert!(record.invariant_holds());
                    prop_assert!(record.qty_available() >= 0);
                }
            }
        }
    }
}
