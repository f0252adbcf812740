use std::collections::HashMap;
use std::sync::Mutex;

use stockforge_core::{ClientId, Sku};
use stockforge_inventory::{InventoryId, InventoryRecord, MovementEntry, ReceiptRef, StockKey};
use stockforge_orders::{OrderId, OrderStatus, OutboundOrder};
use stockforge_receiving::{Asn, AsnId};

use super::{Committed, Savepoint, StoreError, StoreTx, WarehouseStore};

#[derive(Debug, Clone, Default)]
struct WarehouseState {
    inventory: HashMap<InventoryId, InventoryRecord>,
    orders: HashMap<OrderId, OutboundOrder>,
    asns: HashMap<AsnId, Asn>,
    journal: Vec<MovementEntry>,
    order_sequence: u64,
}

impl WarehouseState {
    fn inventory(&self, id: InventoryId) -> Option<InventoryRecord> {
        self.inventory.get(&id).cloned()
    }

    fn inventory_by_key(&self, key: &StockKey) -> Option<InventoryRecord> {
        self.inventory
            .values()
            .find(|r| r.is_active() && r.key() == key)
            .cloned()
    }

    fn inventory_where(&self, pred: impl Fn(&InventoryRecord) -> bool) -> Vec<InventoryRecord> {
        let mut records: Vec<InventoryRecord> =
            self.inventory.values().filter(|r| pred(r)).cloned().collect();
        records.sort_by_key(|r| (r.created_at(), r.id_typed()));
        records
    }

    fn orders_where(&self, pred: impl Fn(&OutboundOrder) -> bool) -> Vec<OutboundOrder> {
        let mut orders: Vec<OutboundOrder> =
            self.orders.values().filter(|o| pred(o)).cloned().collect();
        orders.sort_by_key(|o| (o.created_at(), o.sequence()));
        orders
    }

    fn order_by_number(&self, client_id: ClientId, order_number: &str) -> Option<OutboundOrder> {
        self.orders
            .values()
            .find(|o| o.client_id() == Some(client_id) && o.order_number() == order_number)
            .cloned()
    }

    fn asn_by_number(&self, asn_number: &str) -> Option<Asn> {
        self.asns
            .values()
            .find(|a| a.asn_number() == asn_number)
            .cloned()
    }

    fn movements_for_sku(&self, sku: &Sku) -> Vec<MovementEntry> {
        self.journal.iter().filter(|m| &m.sku == sku).cloned().collect()
    }
}

/// In-memory warehouse store.
///
/// One mutex guards the whole state and is held for the full duration of a
/// transaction, so transactions are serializable. Each transaction works on a
/// copy of the state that replaces the shared state only on commit.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryWarehouseStore {
    state: Mutex<WarehouseState>,
    #[cfg(test)]
    fail_writes_for: Mutex<Option<Sku>>,
}

impl InMemoryWarehouseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every inventory write for `sku` fail with a backend error.
    #[cfg(test)]
    pub(crate) fn fail_writes_for(&self, sku: Option<Sku>) {
        if let Ok(mut slot) = self.fail_writes_for.lock() {
            *slot = sku;
        }
    }

    #[cfg(test)]
    fn injected_failure(&self) -> Option<Sku> {
        self.fail_writes_for.lock().ok().and_then(|s| s.clone())
    }
}

impl WarehouseStore for InMemoryWarehouseStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<Committed<T>, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut shared = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let journal_start = shared.journal.len();

        let mut tx = InMemoryTx {
            state: shared.clone(),
            savepoints: Vec::new(),
            #[cfg(test)]
            fail_writes_for: self.injected_failure(),
        };

        let value = f(&mut tx)?;

        let movements = tx.state.journal[journal_start..].to_vec();
        *shared = tx.state;

        Ok(Committed { value, movements })
    }

    fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn StoreTx) -> T,
    {
        let shared = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&ReadView(&shared)))
    }
}

struct InMemoryTx {
    state: WarehouseState,
    savepoints: Vec<WarehouseState>,
    #[cfg(test)]
    fail_writes_for: Option<Sku>,
}

impl InMemoryTx {
    #[cfg(test)]
    fn check_write(&self, sku: &Sku) -> Result<(), StoreError> {
        if self.fail_writes_for.as_ref() == Some(sku) {
            return Err(StoreError::Backend(format!("injected write failure for {sku}")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_write(&self, _sku: &Sku) -> Result<(), StoreError> {
        Ok(())
    }

    fn take_savepoint(&mut self, savepoint: Savepoint) -> Result<WarehouseState, StoreError> {
        let Savepoint(index) = savepoint;
        if index >= self.savepoints.len() {
            return Err(StoreError::Savepoint(format!(
                "savepoint {index} is not open ({} open)",
                self.savepoints.len()
            )));
        }
        let snapshot = self.savepoints.swap_remove(index);
        self.savepoints.truncate(index);
        Ok(snapshot)
    }
}

impl StoreTx for InMemoryTx {
    fn inventory(&self, id: InventoryId) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.state.inventory(id))
    }

    fn inventory_by_key(&self, key: &StockKey) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.state.inventory_by_key(key))
    }

    fn inventory_for_sku(&self, sku: &Sku) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(self.state.inventory_where(|r| r.sku() == sku))
    }

    fn inventory_by_receipt(
        &self,
        receipt: &ReceiptRef,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(self.state.inventory_where(|r| r.receipt() == Some(receipt)))
    }

    fn put_inventory(&mut self, record: InventoryRecord) -> Result<(), StoreError> {
        self.check_write(record.sku())?;
        self.state.inventory.insert(record.id_typed(), record);
        Ok(())
    }

    fn order(&self, id: OrderId) -> Result<Option<OutboundOrder>, StoreError> {
        Ok(self.state.orders.get(&id).cloned())
    }

    fn order_by_number(
        &self,
        client_id: ClientId,
        order_number: &str,
    ) -> Result<Option<OutboundOrder>, StoreError> {
        Ok(self.state.order_by_number(client_id, order_number))
    }

    fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<OutboundOrder>, StoreError> {
        Ok(self.state.orders_where(|o| o.status() == status))
    }

    fn orders_for_sku(&self, sku: &Sku) -> Result<Vec<OutboundOrder>, StoreError> {
        Ok(self.state.orders_where(|o| o.sku() == Some(sku)))
    }

    fn next_order_sequence(&mut self) -> Result<u64, StoreError> {
        self.state.order_sequence += 1;
        Ok(self.state.order_sequence)
    }

    fn put_order(&mut self, order: OutboundOrder) -> Result<(), StoreError> {
        self.state.orders.insert(order.id_typed(), order);
        Ok(())
    }

    fn asn(&self, id: AsnId) -> Result<Option<Asn>, StoreError> {
        Ok(self.state.asns.get(&id).cloned())
    }

    fn asn_by_number(&self, asn_number: &str) -> Result<Option<Asn>, StoreError> {
        Ok(self.state.asn_by_number(asn_number))
    }

    fn put_asn(&mut self, asn: Asn) -> Result<(), StoreError> {
        self.state.asns.insert(asn.id_typed(), asn);
        Ok(())
    }

    fn append_movement(&mut self, mut entry: MovementEntry) -> Result<MovementEntry, StoreError> {
        entry.sequence = self.state.journal.len() as u64 + 1;
        self.state.journal.push(entry.clone());
        Ok(entry)
    }

    fn movements_for_sku(&self, sku: &Sku) -> Result<Vec<MovementEntry>, StoreError> {
        Ok(self.state.movements_for_sku(sku))
    }

    fn savepoint(&mut self) -> Result<Savepoint, StoreError> {
        self.savepoints.push(self.state.clone());
        Ok(Savepoint(self.savepoints.len() - 1))
    }

    fn rollback_to(&mut self, savepoint: Savepoint) -> Result<(), StoreError> {
        self.state = self.take_savepoint(savepoint)?;
        Ok(())
    }

    fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<(), StoreError> {
        self.take_savepoint(savepoint)?;
        Ok(())
    }
}

/// Read-only view over the committed state.
struct ReadView<'a>(&'a WarehouseState);

impl ReadView<'_> {
    fn read_only<T>() -> Result<T, StoreError> {
        Err(StoreError::Backend("write attempted on a read-only snapshot".to_string()))
    }
}

impl StoreTx for ReadView<'_> {
    fn inventory(&self, id: InventoryId) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.0.inventory(id))
    }

    fn inventory_by_key(&self, key: &StockKey) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.0.inventory_by_key(key))
    }

    fn inventory_for_sku(&self, sku: &Sku) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(self.0.inventory_where(|r| r.sku() == sku))
    }

    fn inventory_by_receipt(
        &self,
        receipt: &ReceiptRef,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(self.0.inventory_where(|r| r.receipt() == Some(receipt)))
    }

    fn put_inventory(&mut self, _record: InventoryRecord) -> Result<(), StoreError> {
        Self::read_only()
    }

    fn order(&self, id: OrderId) -> Result<Option<OutboundOrder>, StoreError> {
        Ok(self.0.orders.get(&id).cloned())
    }

    fn order_by_number(
        &self,
        client_id: ClientId,
        order_number: &str,
    ) -> Result<Option<OutboundOrder>, StoreError> {
        Ok(self.0.order_by_number(client_id, order_number))
    }

    fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<OutboundOrder>, StoreError> {
        Ok(self.0.orders_where(|o| o.status() == status))
    }

    fn orders_for_sku(&self, sku: &Sku) -> Result<Vec<OutboundOrder>, StoreError> {
        Ok(self.0.orders_where(|o| o.sku() == Some(sku)))
    }

    fn next_order_sequence(&mut self) -> Result<u64, StoreError> {
        Self::read_only()
    }

    fn put_order(&mut self, _order: OutboundOrder) -> Result<(), StoreError> {
        Self::read_only()
    }

    fn asn(&self, id: AsnId) -> Result<Option<Asn>, StoreError> {
        Ok(self.0.asns.get(&id).cloned())
    }

    fn asn_by_number(&self, asn_number: &str) -> Result<Option<Asn>, StoreError> {
        Ok(self.0.asn_by_number(asn_number))
    }

    fn put_asn(&mut self, _asn: Asn) -> Result<(), StoreError> {
        Self::read_only()
    }

    fn append_movement(&mut self, _entry: MovementEntry) -> Result<MovementEntry, StoreError> {
        Self::read_only()
    }

    fn movements_for_sku(&self, sku: &Sku) -> Result<Vec<MovementEntry>, StoreError> {
        Ok(self.0.movements_for_sku(sku))
    }

    fn savepoint(&mut self) -> Result<Savepoint, StoreError> {
        Self::read_only()
    }

    fn rollback_to(&mut self, _savepoint: Savepoint) -> Result<(), StoreError> {
        Self::read_only()
    }

    fn release_savepoint(&mut self, _savepoint: Savepoint) -> Result<(), StoreError> {
        Self::read_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockforge_core::{Aggregate, ConditionCode, LocationCode};
    use stockforge_inventory::{InventoryCommand, ReceiveStock};

    fn record(sku: &str, qty: i64) -> InventoryRecord {
        let mut record = InventoryRecord::empty(
            InventoryId::generate(),
            StockKey {
                sku: Sku::parse(sku).unwrap(),
                batch: None,
                location: LocationCode::parse("A-01").unwrap(),
                expiry: None,
            },
            ConditionCode::good(),
        );
        record
            .execute(&InventoryCommand::Receive(ReceiveStock {
                qty,
                receipt: ReceiptRef::Manual("T".to_string()),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        record
    }

    #[test]
    fn err_discards_all_writes() {
        let store = InMemoryWarehouseStore::new();
        let r = record("SKU-A", 10);
        let id = r.id_typed();

        let result: Result<Committed<()>, StoreError> = store.transaction(|tx| {
            tx.put_inventory(r.clone())?;
            Err(StoreError::Backend("boom".to_string()))
        });
        assert!(result.is_err());

        let found = store.read(|view| view.inventory(id)).unwrap().unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn ok_commits_writes() {
        let store = InMemoryWarehouseStore::new();
        let r = record("SKU-A", 10);
        let id = r.id_typed();

        let committed: Result<Committed<()>, StoreError> =
            store.transaction(|tx| tx.put_inventory(r.clone()));
        assert!(committed.is_ok());

        let found = store.read(|view| view.inventory(id)).unwrap().unwrap();
        assert_eq!(found.map(|r| r.qty_on_hand()), Some(10));
    }

    #[test]
    fn rollback_to_savepoint_keeps_earlier_writes() {
        let store = InMemoryWarehouseStore::new();
        let kept = record("SKU-A", 1);
        let dropped = record("SKU-B", 2);
        let (kept_id, dropped_id) = (kept.id_typed(), dropped.id_typed());

        let committed = store
            .transaction(|tx| -> Result<(), StoreError> {
                tx.put_inventory(kept.clone())?;
                let sp = tx.savepoint()?;
                tx.put_inventory(dropped.clone())?;
                tx.rollback_to(sp)?;
                Ok(())
            })
            .unwrap();
        assert!(committed.movements.is_empty());

        store
            .read(|view| {
                assert!(view.inventory(kept_id).unwrap().is_some());
                assert!(view.inventory(dropped_id).unwrap().is_none());
            })
            .unwrap();
    }

    #[test]
    fn savepoint_cannot_be_used_twice() {
        let store = InMemoryWarehouseStore::new();
        let result = store.transaction(|tx| -> Result<(), StoreError> {
            let sp = tx.savepoint()?;
            let again = Savepoint(sp.0);
            tx.release_savepoint(sp)?;
            tx.rollback_to(again)
        });
        assert!(matches!(result, Err(StoreError::Savepoint(_))));
    }

    #[test]
    fn read_view_rejects_writes() {
        let store = InMemoryWarehouseStore::new();
        let state = WarehouseState::default();
        let mut view = ReadView(&state);
        assert!(view.next_order_sequence().is_err());
        assert!(store.read(|v| v.orders_with_status(OrderStatus::Hold).unwrap().is_empty()).unwrap());
    }

    #[test]
    fn injected_failure_only_hits_the_named_sku() {
        let store = InMemoryWarehouseStore::new();
        store.fail_writes_for(Some(Sku::parse("SKU-X").unwrap()));

        let ok: Result<Committed<()>, StoreError> =
            store.transaction(|tx| tx.put_inventory(record("SKU-A", 1)));
        assert!(ok.is_ok());

        let err: Result<Committed<()>, StoreError> =
            store.transaction(|tx| tx.put_inventory(record("SKU-X", 1)));
        assert!(matches!(err, Err(StoreError::Backend(_))));
    }
}
