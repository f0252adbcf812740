//! Inventory ledger operations.
//!
//! Every function here runs inside a caller-owned transaction. Quantity
//! checks are made by the [`InventoryRecord`] aggregate against the state
//! loaded in that same transaction, so check and write can never be split by
//! a concurrent writer. Each applied event appends its journal entry to the
//! same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stockforge_core::{
    Aggregate, ConditionCode, Deletion, LocationCode, ShortfallKind, Sku, UserId,
};
use stockforge_inventory::{
    ConsumeStock, DeleteRecord, InventoryCommand, InventoryId, InventoryRecord, MovementContext,
    OrphanReceipt, ReceiptRef, ReceiveStock, ReleaseStock, ReserveStock, StockKey, movement_for,
};
use stockforge_orders::Reservation;

use crate::error::EngineError;
use crate::store::StoreTx;

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReservationOutcome {
    Reserved { inventory_id: InventoryId, qty: i64 },
    /// Nothing was changed; `available` is the best single record's availability.
    InsufficientAvailable { available: i64 },
}

impl ReservationOutcome {
    pub fn reservation(&self) -> Option<Reservation> {
        match *self {
            ReservationOutcome::Reserved { inventory_id, qty } => {
                Some(Reservation { inventory_id, qty })
            }
            ReservationOutcome::InsufficientAvailable { .. } => None,
        }
    }

    pub fn into_result(self, requested: i64) -> Result<Reservation, EngineError> {
        match self {
            ReservationOutcome::Reserved { inventory_id, qty } => {
                Ok(Reservation { inventory_id, qty })
            }
            ReservationOutcome::InsufficientAvailable { available } => {
                Err(EngineError::insufficient_available(requested, available))
            }
        }
    }
}

/// Stock arriving at a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub key: StockKey,
    pub condition: ConditionCode,
    pub qty: i64,
    pub source: ReceiptRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOutcome {
    pub record: InventoryRecord,
    /// The receipt opened a new record rather than topping up an existing one.
    pub created: bool,
}

/// Apply one command to a record, journal its movements and store it.
fn execute(
    tx: &mut dyn StoreTx,
    mut record: InventoryRecord,
    command: InventoryCommand,
    ctx: &MovementContext,
) -> Result<InventoryRecord, EngineError> {
    let events = record.handle(&command)?;
    for event in &events {
        record.apply(event);
        if let Some(entry) = movement_for(&record, event, ctx) {
            tx.append_movement(entry)?;
        }
    }

    if !record.invariant_holds() {
        return Err(EngineError::InvariantViolation(format!(
            "record {} would hold allocated {} against on hand {}",
            record.id_typed(),
            record.qty_allocated(),
            record.qty_on_hand()
        )));
    }

    tx.put_inventory(record.clone())?;
    Ok(record)
}

fn load(tx: &dyn StoreTx, id: InventoryId) -> Result<InventoryRecord, EngineError> {
    tx.inventory(id)?
        .filter(|r| r.is_opened())
        .ok_or_else(|| EngineError::NotFound(format!("inventory record {id}")))
}

/// Preference order among records that can satisfy a reservation.
fn preference(
    record: &InventoryRecord,
    hint: Option<&LocationCode>,
) -> (bool, bool, Option<chrono::NaiveDate>, Option<DateTime<Utc>>, InventoryId) {
    let off_hint = hint.is_some_and(|h| h != record.location());
    let expiry = record.key().expiry;
    (
        off_hint,
        expiry.is_none(),
        expiry,
        record.created_at(),
        record.id_typed(),
    )
}

/// Pick the record a reservation of `qty` should target.
///
/// Among active records able to cover `qty`: the hinted location first, then
/// earliest expiry (records without expiry last), then the oldest record. When
/// none can cover it, the record with the most available stock is returned so
/// its availability can be reported.
pub fn resolve(
    tx: &dyn StoreTx,
    sku: &Sku,
    location_hint: Option<&LocationCode>,
    qty: i64,
) -> Result<Option<InventoryRecord>, EngineError> {
    let active: Vec<InventoryRecord> = tx
        .inventory_for_sku(sku)?
        .into_iter()
        .filter(|r| r.is_active())
        .collect();

    let best_fit = active
        .iter()
        .filter(|r| r.qty_available() >= qty)
        .min_by_key(|r| preference(r, location_hint));
    if let Some(record) = best_fit {
        return Ok(Some(record.clone()));
    }

    let largest = active.iter().max_by(|a, b| {
        a.qty_available()
            .cmp(&b.qty_available())
            .then_with(|| preference(b, location_hint).cmp(&preference(a, location_hint)))
    });
    Ok(largest.cloned())
}

/// Availability the creation decision and the reconciler work with.
pub fn available_for(
    tx: &dyn StoreTx,
    sku: &Sku,
    location_hint: Option<&LocationCode>,
    qty: i64,
) -> Result<i64, EngineError> {
    Ok(resolve(tx, sku, location_hint, qty)?
        .map(|r| r.qty_available())
        .unwrap_or(0))
}

/// Reserve `qty` of `sku`, all or nothing.
pub fn reserve(
    tx: &mut dyn StoreTx,
    sku: &Sku,
    location_hint: Option<&LocationCode>,
    qty: i64,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<ReservationOutcome, EngineError> {
    if qty <= 0 {
        return Err(EngineError::Validation("reservation quantity must be positive".into()));
    }

    let Some(record) = resolve(tx, sku, location_hint, qty)? else {
        return Ok(ReservationOutcome::InsufficientAvailable { available: 0 });
    };
    let available = record.qty_available();
    if available < qty {
        return Ok(ReservationOutcome::InsufficientAvailable { available });
    }

    let inventory_id = record.id_typed();
    match execute(
        tx,
        record,
        InventoryCommand::Reserve(ReserveStock { qty, occurred_at: now }),
        ctx,
    ) {
        Ok(_) => {
            debug!(%sku, %inventory_id, qty, "stock reserved");
            Ok(ReservationOutcome::Reserved { inventory_id, qty })
        }
        Err(EngineError::InsufficientInventory {
            kind: ShortfallKind::Available,
            available,
            ..
        }) => Ok(ReservationOutcome::InsufficientAvailable { available }),
        Err(e) => Err(e),
    }
}

/// Give back a reservation.
pub fn release(
    tx: &mut dyn StoreTx,
    reservation: &Reservation,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<InventoryRecord, EngineError> {
    let record = load(tx, reservation.inventory_id)?;
    execute(
        tx,
        record,
        InventoryCommand::Release(ReleaseStock {
            qty: reservation.qty,
            occurred_at: now,
        }),
        ctx,
    )
}

/// Ship reserved stock: on hand and allocated both drop by the reserved quantity.
pub fn consume(
    tx: &mut dyn StoreTx,
    reservation: &Reservation,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<InventoryRecord, EngineError> {
    let record = load(tx, reservation.inventory_id)?;
    execute(
        tx,
        record,
        InventoryCommand::Consume(ConsumeStock {
            qty: reservation.qty,
            occurred_at: now,
        }),
        ctx,
    )
}

/// Put stock away at `receipt.key`, opening the record if needed.
pub fn receive(
    tx: &mut dyn StoreTx,
    receipt: Receipt,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<ReceiveOutcome, EngineError> {
    let (record, created) = match tx.inventory_by_key(&receipt.key)? {
        Some(existing) => (existing, false),
        None => (
            InventoryRecord::empty(InventoryId::generate(), receipt.key, receipt.condition),
            true,
        ),
    };

    let record = execute(
        tx,
        record,
        InventoryCommand::Receive(ReceiveStock {
            qty: receipt.qty,
            receipt: receipt.source,
            occurred_at: now,
        }),
        ctx,
    )?;
    Ok(ReceiveOutcome { record, created })
}

/// Soft-delete a record.
///
/// Refused while stock on it is allocated or while any open order for the SKU
/// exists, since those orders may still need the stock.
pub fn delete(
    tx: &mut dyn StoreTx,
    id: InventoryId,
    reason: &str,
    actor: UserId,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<InventoryRecord, EngineError> {
    let record = load(tx, id)?;
    if !record.is_active() {
        return Err(EngineError::AlreadyTerminal(format!("inventory record {id} is deleted")));
    }
    if record.qty_allocated() > 0 {
        return Err(EngineError::Conflict(format!(
            "inventory record {id} has {} units allocated",
            record.qty_allocated()
        )));
    }
    let open_orders = tx
        .orders_for_sku(record.sku())?
        .into_iter()
        .filter(|o| !o.status().is_terminal())
        .count();
    if open_orders > 0 {
        return Err(EngineError::Conflict(format!(
            "{open_orders} open order(s) exist for {}",
            record.sku()
        )));
    }

    execute(
        tx,
        record,
        InventoryCommand::Delete(DeleteRecord {
            deletion: Deletion {
                at: now,
                by: actor,
                reason: reason.trim().to_string(),
            },
        }),
        ctx,
    )
}

/// Relabel every record received from `asn_number` as orphaned. Quantities are untouched.
pub fn orphan_receipts(
    tx: &mut dyn StoreTx,
    asn_number: &str,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<Vec<InventoryId>, EngineError> {
    let sourced = tx.inventory_by_receipt(&ReceiptRef::Asn(asn_number.to_string()))?;
    let mut orphaned = Vec::with_capacity(sourced.len());
    for record in sourced {
        let id = record.id_typed();
        execute(
            tx,
            record,
            InventoryCommand::Orphan(OrphanReceipt {
                asn_number: asn_number.to_string(),
                occurred_at: now,
            }),
            ctx,
        )?;
        orphaned.push(id);
    }
    Ok(orphaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockforge_inventory::MovementType;

    use crate::store::{Committed, InMemoryWarehouseStore, WarehouseStore};

    fn sku(s: &str) -> Sku {
        Sku::parse(s).unwrap()
    }

    fn loc(s: &str) -> LocationCode {
        LocationCode::parse(s).unwrap()
    }

    fn ctx() -> MovementContext {
        MovementContext::new("TEST", UserId::new())
    }

    fn receipt(sku_code: &str, location: &str, expiry: Option<NaiveDate>, qty: i64) -> Receipt {
        Receipt {
            key: StockKey {
                sku: sku(sku_code),
                batch: None,
                location: loc(location),
                expiry,
            },
            condition: ConditionCode::good(),
            qty,
            source: ReceiptRef::Manual("R".to_string()),
        }
    }

    fn tx<T>(
        store: &InMemoryWarehouseStore,
        f: impl FnOnce(&mut dyn StoreTx) -> Result<T, EngineError>,
    ) -> Result<Committed<T>, EngineError> {
        store.transaction(f)
    }

    fn seed(store: &InMemoryWarehouseStore, r: Receipt) -> InventoryId {
        tx(store, |t| receive(t, r, &ctx(), Utc::now()))
            .unwrap()
            .value
            .record
            .id_typed()
    }

    #[test]
    fn reserve_is_all_or_nothing() {
        let store = InMemoryWarehouseStore::new();
        let id = seed(&store, receipt("A", "A-01", None, 100));

        let first = tx(&store, |t| reserve(t, &sku("A"), None, 60, &ctx(), Utc::now())).unwrap();
        assert_eq!(
            first.value,
            ReservationOutcome::Reserved { inventory_id: id, qty: 60 }
        );
        assert_eq!(first.movements.len(), 1);
        assert_eq!(first.movements[0].movement_type, MovementType::Allocation);

        let second = tx(&store, |t| reserve(t, &sku("A"), None, 50, &ctx(), Utc::now())).unwrap();
        assert_eq!(
            second.value,
            ReservationOutcome::InsufficientAvailable { available: 40 }
        );
        assert!(second.movements.is_empty());

        let record = store.read(|v| v.inventory(id)).unwrap().unwrap().unwrap();
        assert_eq!((record.qty_on_hand(), record.qty_allocated()), (100, 60));
    }

    #[test]
    fn unknown_sku_reports_zero_available() {
        let store = InMemoryWarehouseStore::new();
        let outcome = tx(&store, |t| reserve(t, &sku("NOPE"), None, 1, &ctx(), Utc::now()))
            .unwrap()
            .value;
        assert_eq!(outcome, ReservationOutcome::InsufficientAvailable { available: 0 });
    }

    #[test]
    fn resolution_prefers_hint_then_earliest_expiry() {
        let store = InMemoryWarehouseStore::new();
        let early = NaiveDate::from_ymd_opt(2030, 1, 1);
        let late = NaiveDate::from_ymd_opt(2031, 1, 1);
        let no_expiry = seed(&store, receipt("F", "A-01", None, 10));
        let late_id = seed(&store, receipt("F", "A-02", late, 10));
        let early_id = seed(&store, receipt("F", "A-03", early, 10));

        store
            .read(|v| {
                let pick = resolve(v, &sku("F"), None, 5).unwrap().unwrap();
                assert_eq!(pick.id_typed(), early_id);

                let hinted = resolve(v, &sku("F"), Some(&loc("A-02")), 5).unwrap().unwrap();
                assert_eq!(hinted.id_typed(), late_id);

                let hinted = resolve(v, &sku("F"), Some(&loc("A-01")), 5).unwrap().unwrap();
                assert_eq!(hinted.id_typed(), no_expiry);
            })
            .unwrap();
    }

    #[test]
    fn resolution_reports_largest_record_when_none_suffices() {
        let store = InMemoryWarehouseStore::new();
        seed(&store, receipt("G", "A-01", None, 10));
        let big = seed(&store, receipt("G", "A-02", None, 25));

        store
            .read(|v| {
                let pick = resolve(v, &sku("G"), None, 30).unwrap().unwrap();
                assert_eq!(pick.id_typed(), big);
                assert_eq!(available_for(v, &sku("G"), None, 30).unwrap(), 25);
            })
            .unwrap();
    }

    #[test]
    fn receive_tops_up_the_same_position() {
        let store = InMemoryWarehouseStore::new();
        let first = tx(&store, |t| receive(t, receipt("B", "A-01", None, 20), &ctx(), Utc::now()))
            .unwrap()
            .value;
        let second = tx(&store, |t| receive(t, receipt("B", "A-01", None, 5), &ctx(), Utc::now()))
            .unwrap()
            .value;

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record.id_typed(), second.record.id_typed());
        assert_eq!(second.record.qty_on_hand(), 25);
    }

    #[test]
    fn consume_checks_on_hand_before_allocated() {
        let store = InMemoryWarehouseStore::new();
        let id = seed(&store, receipt("C", "A-01", None, 10));
        tx(&store, |t| reserve(t, &sku("C"), None, 5, &ctx(), Utc::now())).unwrap();

        let too_much = Reservation { inventory_id: id, qty: 12 };
        let err = tx(&store, |t| consume(t, &too_much, &ctx(), Utc::now())).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientInventory { kind: ShortfallKind::OnHand, .. }
        ));

        let over_allocated = Reservation { inventory_id: id, qty: 8 };
        let err = tx(&store, |t| consume(t, &over_allocated, &ctx(), Utc::now())).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientInventory { kind: ShortfallKind::Allocated, .. }
        ));
    }

    #[test]
    fn release_beyond_allocated_is_an_invariant_violation() {
        let store = InMemoryWarehouseStore::new();
        let id = seed(&store, receipt("D", "A-01", None, 10));
        let err = tx(&store, |t| {
            release(t, &Reservation { inventory_id: id, qty: 1 }, &ctx(), Utc::now())
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert!(err.is_internal());
    }

    #[test]
    fn delete_refuses_allocated_stock_without_mutation() {
        let store = InMemoryWarehouseStore::new();
        let id = seed(&store, receipt("E", "A-01", None, 30));
        tx(&store, |t| reserve(t, &sku("E"), None, 10, &ctx(), Utc::now())).unwrap();

        let err = tx(&store, |t| delete(t, id, "cleanup", UserId::new(), &ctx(), Utc::now()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let record = store.read(|v| v.inventory(id)).unwrap().unwrap().unwrap();
        assert!(record.is_active());
        assert_eq!((record.qty_on_hand(), record.qty_allocated()), (30, 10));
    }

    #[test]
    fn delete_writes_off_on_hand() {
        let store = InMemoryWarehouseStore::new();
        let id = seed(&store, receipt("H", "A-01", None, 7));
        let committed =
            tx(&store, |t| delete(t, id, "damaged", UserId::new(), &ctx(), Utc::now())).unwrap();

        assert!(!committed.value.is_active());
        assert_eq!(committed.value.qty_on_hand(), 0);
        assert_eq!(committed.movements.len(), 1);
        assert_eq!(committed.movements[0].movement_type, MovementType::Deletion);
        assert_eq!(committed.movements[0].quantity, -7);
    }

    #[test]
    fn orphaning_relabels_only_matching_records() {
        let store = InMemoryWarehouseStore::new();
        let mut from_asn = receipt("K", "A-01", None, 4);
        from_asn.source = ReceiptRef::Asn("ASN-9".to_string());
        let asn_id = seed(&store, from_asn);
        let manual_id = seed(&store, receipt("K", "A-02", None, 4));

        let committed =
            tx(&store, |t| orphan_receipts(t, "ASN-9", &ctx(), Utc::now())).unwrap();
        assert_eq!(committed.value, vec![asn_id]);
        assert_eq!(committed.movements[0].movement_type, MovementType::AsnDeletion);
        assert_eq!(committed.movements[0].quantity, 0);

        store
            .read(|v| {
                let r = v.inventory(asn_id).unwrap().unwrap();
                assert_eq!(r.receipt(), Some(&ReceiptRef::Orphaned("ASN-9".to_string())));
                assert_eq!(r.qty_on_hand(), 4);
                let m = v.inventory(manual_id).unwrap().unwrap();
                assert_eq!(m.receipt(), Some(&ReceiptRef::Manual("R".to_string())));
            })
            .unwrap();
    }
}
