//! The warehouse engine: public entry point for the presentation layer.
//!
//! Every mutating operation follows the same pipeline:
//!
//! ```text
//! rate limit → permission check → transaction (ledger + aggregates + journal)
//!   → commit → publish journal entries → audit
//! ```
//!
//! Rejections at any step leave storage untouched and are audited as such.
//! Journal publication happens only after commit, so subscribers never see a
//! movement that was rolled back.

use std::io;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use stockforge_auth::{Permission, Principal};
use stockforge_core::{BatchNumber, ClientId, ConditionCode, ExpectedVersion, LocationCode, Sku};
use stockforge_events::{EventBus, EventEnvelope, InMemoryEventBus};
use stockforge_inventory::{
    InventoryId, InventoryRecord, MovementContext, MovementEntry, ReceiptRef, StockKey,
};
use stockforge_orders::{OrderId, OrderStatus, OutboundOrder};
use stockforge_receiving::Asn;

use crate::collaborators::{
    AuditEvent, AuditOutcome, Collaborators, FixedWindowRateLimiter, RbacPermissionChecker,
    TracingAuditLogger,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fulfillment::{self, NewOrder, OrderEdit, OrderPlacement};
use crate::journal::{self, JournalReconciliation};
use crate::ledger::{self, Receipt, ReceiveOutcome};
use crate::receiving::{self, AsnDeletionReport, AsnProcessingReport, NewAsn};
use crate::reconciler::{self, AutoReleaseReport};
use crate::scheduler::{AutoReleaseHandle, AutoReleaseScheduler};
use crate::store::{Committed, InMemoryWarehouseStore, StoreTx, WarehouseStore};

/// Movement bus message type.
pub type MovementEnvelope = EventEnvelope<MovementEntry>;

/// Stock received outside any ASN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReceipt {
    pub sku: Sku,
    pub location: LocationCode,
    pub batch: Option<BatchNumber>,
    pub condition: ConditionCode,
    pub expiry: Option<NaiveDate>,
    pub qty: i64,
    /// Free-form document reference (delivery note, adjustment ticket).
    pub reference: String,
}

pub struct WarehouseEngine<S, B> {
    store: S,
    bus: B,
    config: EngineConfig,
    collaborators: Collaborators,
}

impl WarehouseEngine<InMemoryWarehouseStore, InMemoryEventBus<MovementEnvelope>> {
    /// Engine over in-memory storage with no collaborators.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(InMemoryWarehouseStore::new(), InMemoryEventBus::new(), config)
    }
}

impl<S, B> WarehouseEngine<S, B>
where
    S: WarehouseStore,
    B: EventBus<MovementEnvelope>,
{
    pub fn new(store: S, bus: B, config: EngineConfig) -> Self {
        Self {
            store,
            bus,
            config,
            collaborators: Collaborators::none(),
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Tracing audit log, RBAC permission checks and a fixed-window rate
    /// limiter sized from the configuration.
    pub fn with_standard_collaborators(self) -> Self {
        let limiter = FixedWindowRateLimiter::new(
            self.config.rate_limit_max,
            self.config.rate_limit_window,
        );
        let collaborators = Collaborators::none()
            .with_audit(Arc::new(TracingAuditLogger))
            .with_permissions(Arc::new(RbacPermissionChecker))
            .with_rate_limiter(Arc::new(limiter), self.config.rate_limit_policy);
        self.with_collaborators(collaborators)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gate, run and publish one mutating operation.
    fn execute<T, F>(
        &self,
        principal: &Principal,
        permission: &Permission,
        subject: &str,
        f: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, EngineError>,
    {
        let action = permission.as_str();
        let result = self
            .collaborators
            .throttle(principal, action)
            .and_then(|()| self.collaborators.authorize(principal, permission))
            .and_then(|()| self.store.transaction(f));

        let outcome = match &result {
            Ok(Committed { movements, .. }) => {
                info!(action, subject, movements = movements.len(), "operation committed");
                AuditOutcome::Success
            }
            Err(e) if e.is_internal() => {
                error!(action, subject, error = %e, "operation failed; rolled back");
                AuditOutcome::Rejected(e.public_message())
            }
            Err(e) => {
                warn!(action, subject, error = %e, "operation rejected");
                AuditOutcome::Rejected(e.public_message())
            }
        };
        self.collaborators.audit(AuditEvent {
            action: action.to_string(),
            actor: principal.principal_id,
            subject: subject.to_string(),
            outcome,
            at: Utc::now(),
        });

        let Committed { value, movements } = result?;
        journal::publish_movements(&self.bus, movements);
        Ok(value)
    }

    fn query<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&dyn StoreTx) -> Result<T, EngineError>,
    {
        self.store.read(f)?
    }

    // ---- orders -------------------------------------------------------

    /// Register an order and decide its initial status.
    #[instrument(skip_all, fields(order_number = %new.order_number, sku = %new.sku, qty = new.qty_ordered))]
    pub fn create_order(
        &self,
        principal: &Principal,
        new: NewOrder,
    ) -> Result<OrderPlacement, EngineError> {
        let subject = new.order_number.clone();
        let actor = principal.principal_id;
        self.execute(principal, &Permission::ORDERS_CREATE, &subject, |tx| {
            fulfillment::create_order(tx, new, actor, Utc::now())
        })
    }

    #[instrument(skip_all, fields(order_id = %order_id, to = %target))]
    pub fn transition_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<OutboundOrder, EngineError> {
        let actor = principal.principal_id;
        self.execute(
            principal,
            &Permission::ORDERS_TRANSITION,
            &order_id.to_string(),
            |tx| fulfillment::transition_order(tx, order_id, target, actor, Utc::now()),
        )
    }

    #[instrument(skip_all, fields(order_id = %order_id))]
    pub fn cancel_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
        reason: &str,
    ) -> Result<OutboundOrder, EngineError> {
        let actor = principal.principal_id;
        self.execute(
            principal,
            &Permission::ORDERS_TRANSITION,
            &order_id.to_string(),
            |tx| fulfillment::cancel_order(tx, order_id, reason, actor, Utc::now()),
        )
    }

    #[instrument(skip_all, fields(order_id = %order_id))]
    pub fn edit_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
        edit: OrderEdit,
        expected_version: ExpectedVersion,
    ) -> Result<OutboundOrder, EngineError> {
        self.execute(principal, &Permission::ORDERS_EDIT, &order_id.to_string(), |tx| {
            fulfillment::edit_order(tx, order_id, edit, expected_version, Utc::now())
        })
    }

    #[instrument(skip_all, fields(order_id = %order_id, to = %target))]
    pub fn override_order_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        target: OrderStatus,
        expected_version: ExpectedVersion,
    ) -> Result<OutboundOrder, EngineError> {
        let actor = principal.principal_id;
        self.execute(principal, &Permission::ORDERS_EDIT, &order_id.to_string(), |tx| {
            fulfillment::override_status(tx, order_id, target, expected_version, actor, Utc::now())
        })
    }

    // ---- inventory ----------------------------------------------------

    #[instrument(skip_all, fields(sku = %receipt.sku, location = %receipt.location, qty = receipt.qty))]
    pub fn receive_inventory(
        &self,
        principal: &Principal,
        receipt: ManualReceipt,
    ) -> Result<ReceiveOutcome, EngineError> {
        let subject = receipt.reference.clone();
        let ctx = MovementContext::new(receipt.reference.clone(), principal.principal_id);
        self.execute(principal, &Permission::INVENTORY_RECEIVE, &subject, |tx| {
            ledger::receive(
                tx,
                Receipt {
                    key: StockKey {
                        sku: receipt.sku,
                        batch: receipt.batch,
                        location: receipt.location,
                        expiry: receipt.expiry,
                    },
                    condition: receipt.condition,
                    qty: receipt.qty,
                    source: ReceiptRef::Manual(receipt.reference),
                },
                &ctx,
                Utc::now(),
            )
        })
    }

    /// Soft-delete a record. Rejected while stock on it is allocated or open
    /// orders exist for its SKU.
    #[instrument(skip_all, fields(inventory_id = %inventory_id))]
    pub fn delete_inventory(
        &self,
        principal: &Principal,
        inventory_id: InventoryId,
        reason: &str,
    ) -> Result<InventoryRecord, EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation("deletion reason cannot be empty".into()));
        }
        let actor = principal.principal_id;
        let ctx = MovementContext::new(format!("DELETE {inventory_id}"), actor);
        self.execute(
            principal,
            &Permission::INVENTORY_DELETE,
            &inventory_id.to_string(),
            |tx| ledger::delete(tx, inventory_id, reason, actor, &ctx, Utc::now()),
        )
    }

    // ---- receiving ----------------------------------------------------

    #[instrument(skip_all, fields(asn = %new.asn_number, lines = new.lines.len()))]
    pub fn create_asn(&self, principal: &Principal, new: NewAsn) -> Result<Asn, EngineError> {
        let subject = new.asn_number.clone();
        self.execute(principal, &Permission::ASN_MANAGE, &subject, |tx| {
            receiving::create_asn(tx, new, Utc::now())
        })
    }

    #[instrument(skip_all, fields(asn = %asn_number))]
    pub fn hold_asn(&self, principal: &Principal, asn_number: &str) -> Result<Asn, EngineError> {
        self.execute(principal, &Permission::ASN_MANAGE, asn_number, |tx| {
            receiving::hold_asn(tx, asn_number, Utc::now())
        })
    }

    #[instrument(skip_all, fields(asn = %asn_number))]
    pub fn release_asn(&self, principal: &Principal, asn_number: &str) -> Result<Asn, EngineError> {
        self.execute(principal, &Permission::ASN_MANAGE, asn_number, |tx| {
            receiving::release_asn(tx, asn_number, Utc::now())
        })
    }

    #[instrument(skip_all, fields(asn = %asn_number))]
    pub fn start_receiving(
        &self,
        principal: &Principal,
        asn_number: &str,
    ) -> Result<Asn, EngineError> {
        self.execute(principal, &Permission::ASN_PROCESS, asn_number, |tx| {
            receiving::start_receiving(tx, asn_number, Utc::now())
        })
    }

    /// Put every open line of an ASN into stock and complete it.
    #[instrument(skip_all, fields(asn = %asn_number))]
    pub fn process_asn(
        &self,
        principal: &Principal,
        asn_number: &str,
    ) -> Result<AsnProcessingReport, EngineError> {
        let actor = principal.principal_id;
        let location = self.config.receiving_location.clone();
        let report = self.execute(principal, &Permission::ASN_PROCESS, asn_number, |tx| {
            receiving::process_asn(tx, asn_number, &location, actor, Utc::now())
        })?;
        if !report.line_errors.is_empty() {
            warn!(
                processed = report.lines_processed,
                failed = report.line_errors.len(),
                "ASN completed with line errors"
            );
        }
        Ok(report)
    }

    #[instrument(skip_all, fields(asn = %asn_number))]
    pub fn delete_asn(
        &self,
        principal: &Principal,
        asn_number: &str,
        reason: &str,
    ) -> Result<AsnDeletionReport, EngineError> {
        let actor = principal.principal_id;
        self.execute(principal, &Permission::ASN_MANAGE, asn_number, |tx| {
            receiving::delete_asn(tx, asn_number, reason, actor, Utc::now())
        })
    }

    // ---- reconciler ---------------------------------------------------

    /// Promote HOLD orders whose stock has become available, oldest first.
    ///
    /// Candidates come from a scan at the start of the run; each one is
    /// re-verified when its turn comes.
    #[instrument(skip_all)]
    pub fn run_auto_release(&self, principal: &Principal) -> Result<AutoReleaseReport, EngineError> {
        let limit = self.config.auto_release_batch_limit;
        let actor = principal.principal_id;
        let report = self.execute(principal, &Permission::ALLOCATION_RUN, "auto-release", |tx| {
            let candidates = reconciler::scan_candidates(&*tx, limit)?;
            reconciler::release_candidates(tx, &candidates, actor, Utc::now())
        })?;
        if report.processed > 0 {
            info!(
                processed = report.processed,
                released = report.released,
                errors = report.errors.len(),
                "auto-release run"
            );
        }
        Ok(report)
    }

    // ---- queries ------------------------------------------------------

    pub fn order(&self, order_id: OrderId) -> Result<Option<OutboundOrder>, EngineError> {
        self.query(|v| Ok(v.order(order_id)?))
    }

    pub fn order_by_number(
        &self,
        client_id: ClientId,
        order_number: &str,
    ) -> Result<Option<OutboundOrder>, EngineError> {
        self.query(|v| Ok(v.order_by_number(client_id, order_number)?))
    }

    pub fn inventory(&self, id: InventoryId) -> Result<Option<InventoryRecord>, EngineError> {
        self.query(|v| Ok(v.inventory(id)?))
    }

    pub fn inventory_for_sku(&self, sku: &Sku) -> Result<Vec<InventoryRecord>, EngineError> {
        self.query(|v| Ok(v.inventory_for_sku(sku)?))
    }

    pub fn available_for(
        &self,
        sku: &Sku,
        location_hint: Option<&LocationCode>,
        qty: i64,
    ) -> Result<i64, EngineError> {
        self.query(|v| ledger::available_for(v, sku, location_hint, qty))
    }

    pub fn asn(&self, asn_number: &str) -> Result<Option<Asn>, EngineError> {
        self.query(|v| Ok(v.asn_by_number(asn_number)?))
    }

    pub fn movements_for_sku(&self, sku: &Sku) -> Result<Vec<MovementEntry>, EngineError> {
        self.query(|v| Ok(v.movements_for_sku(sku)?))
    }

    /// Compare the replayed journal of `sku` with its records.
    pub fn reconcile_journal(&self, sku: &Sku) -> Result<JournalReconciliation, EngineError> {
        let reconciliation = self.query(|v| journal::reconcile(v, sku))?;
        if !reconciliation.is_consistent() {
            error!(
                %sku,
                replayed_on_hand = reconciliation.replayed.on_hand,
                on_hand = reconciliation.on_hand,
                replayed_allocated = reconciliation.replayed.allocated,
                allocated = reconciliation.allocated,
                "movement journal disagrees with stock records"
            );
        }
        Ok(reconciliation)
    }
}

impl<S, B> WarehouseEngine<S, B>
where
    S: WarehouseStore + 'static,
    B: EventBus<MovementEnvelope> + 'static,
{
    /// Run the reconciler every `auto_release_interval` as the system principal.
    pub fn spawn_auto_release(self: &Arc<Self>) -> io::Result<AutoReleaseHandle> {
        let engine = Arc::clone(self);
        AutoReleaseScheduler::new(self.config.auto_release_interval)
            .spawn(move || engine.run_auto_release(&Principal::system()))
    }
}

impl<S, B> core::fmt::Debug for WarehouseEngine<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WarehouseEngine")
            .field("config", &self.config)
            .field("collaborators", &self.collaborators)
            .finish_non_exhaustive()
    }
}
