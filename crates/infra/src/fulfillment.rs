//! Order fulfillment: every status transition together with its ledger effect.
//!
//! Functions run inside a caller-owned transaction. The ledger call and the
//! order write happen in that one transaction, so a failed reservation or
//! consumption leaves the order exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stockforge_core::{
    Aggregate, AggregateRoot, ClientId, ExpectedVersion, LocationCode, Sku, UserId,
};
use stockforge_inventory::MovementContext;
use stockforge_orders::{
    AllocateOrder, CancelOrder, CreateOrder, DeliveryDetails, EditOrder, OrderCancelled,
    OrderCommand, OrderEvent, OrderId, OrderStatus, OutboundOrder, OverrideStatus, PickOrder,
    ReleaseOrder, Reservation, ShipOrder,
};
use stockforge_orders::order::MAX_ORDER_NUMBER_LEN;

use crate::error::EngineError;
use crate::ledger::{self, ReservationOutcome};
use crate::store::StoreTx;

/// Reason recorded when an order is cancelled through a plain status transition.
pub const DEFAULT_CANCEL_REASON: &str = "cancelled by operator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub client_id: ClientId,
    pub sku: Sku,
    pub qty_ordered: i64,
    pub client_reference: Option<String>,
    pub delivery: DeliveryDetails,
    pub preferred_location: Option<LocationCode>,
}

impl NewOrder {
    /// Input checks made before the ledger is touched.
    pub fn validate(&self) -> Result<(), EngineError> {
        let number = self.order_number.trim();
        if number.is_empty() {
            return Err(EngineError::Validation("order number cannot be empty".into()));
        }
        if number.len() > MAX_ORDER_NUMBER_LEN {
            return Err(EngineError::Validation(format!(
                "order number longer than {MAX_ORDER_NUMBER_LEN} characters"
            )));
        }
        if self.qty_ordered <= 0 {
            return Err(EngineError::Validation("quantity ordered must be positive".into()));
        }
        self.delivery.validate()?;
        Ok(())
    }
}

/// What order creation decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacement {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub reservation: ReservationOutcome,
}

/// Customer-facing fields an operator may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEdit {
    pub delivery: DeliveryDetails,
    pub client_reference: Option<String>,
}

fn load(tx: &dyn StoreTx, id: OrderId) -> Result<OutboundOrder, EngineError> {
    tx.order(id)?
        .filter(|o| o.is_created())
        .ok_or_else(|| EngineError::NotFound(format!("order {id}")))
}

fn order_sku(order: &OutboundOrder) -> Result<Sku, EngineError> {
    order.sku().cloned().ok_or_else(|| {
        EngineError::InvariantViolation(format!("order {} has no line", order.order_number()))
    })
}

fn movement_context(order: &OutboundOrder, actor: UserId) -> MovementContext {
    MovementContext::new(order.order_number(), actor)
}

/// Status gate checked before any ledger access.
fn precheck(order: &OutboundOrder, allowed: &[OrderStatus], action: &str) -> Result<(), EngineError> {
    let status = order.status();
    if status.is_terminal() {
        return Err(EngineError::AlreadyTerminal(format!(
            "order {} is {status}",
            order.order_number()
        )));
    }
    if !allowed.contains(&status) {
        return Err(EngineError::Conflict(format!(
            "cannot {action} order {} in status {status}",
            order.order_number()
        )));
    }
    Ok(())
}

fn apply_all(order: &mut OutboundOrder, events: &[OrderEvent]) {
    for event in events {
        order.apply(event);
    }
}

fn execute(
    tx: &mut dyn StoreTx,
    mut order: OutboundOrder,
    command: OrderCommand,
) -> Result<OutboundOrder, EngineError> {
    let events = order.handle(&command)?;
    apply_all(&mut order, &events);
    tx.put_order(order.clone())?;
    Ok(order)
}

/// Reserve the full ordered quantity or fail with the shortfall.
fn reserve_full(
    tx: &mut dyn StoreTx,
    order: &OutboundOrder,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<Reservation, EngineError> {
    let sku = order_sku(order)?;
    let qty = order.qty_ordered();
    ledger::reserve(tx, &sku, order.preferred_location(), qty, ctx, now)?.into_result(qty)
}

/// Register a new order and make the creation decision.
///
/// Enough stock on one record: the order starts RELEASED holding a reservation
/// for the full quantity. Some but not enough: PARTIAL. None: HOLD.
pub fn create_order(
    tx: &mut dyn StoreTx,
    new: NewOrder,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<OrderPlacement, EngineError> {
    new.validate()?;
    let order_number = new.order_number.trim().to_string();
    if tx.order_by_number(new.client_id, &order_number)?.is_some() {
        return Err(EngineError::Conflict(format!(
            "order number {order_number} already exists for client {}",
            new.client_id
        )));
    }

    let ctx = MovementContext::new(order_number.clone(), actor);
    let hint = new.preferred_location.as_ref();
    let available = ledger::available_for(tx, &new.sku, hint, new.qty_ordered)?;
    let outcome = if available >= new.qty_ordered {
        ledger::reserve(tx, &new.sku, hint, new.qty_ordered, &ctx, now)?
    } else {
        ReservationOutcome::InsufficientAvailable { available }
    };
    let qty_available = match outcome {
        ReservationOutcome::Reserved { qty, .. } => qty,
        ReservationOutcome::InsufficientAvailable { available } => available,
    };

    let sequence = tx.next_order_sequence()?;
    let order_id = OrderId::generate();
    let order = execute(
        tx,
        OutboundOrder::empty(order_id),
        OrderCommand::Create(CreateOrder {
            order_id,
            order_number,
            client_id: new.client_id,
            sku: new.sku,
            qty_ordered: new.qty_ordered,
            client_reference: new.client_reference,
            delivery: new.delivery,
            preferred_location: new.preferred_location,
            qty_available,
            reservation: outcome.reservation(),
            sequence,
            occurred_at: now,
        }),
    )?;

    debug!(order = order.order_number(), status = %order.status(), "order created");
    Ok(OrderPlacement {
        order_id: order.id_typed(),
        order_number: order.order_number().to_string(),
        status: order.status(),
        reservation: outcome,
    })
}

/// HOLD/PARTIAL → RELEASED, reserving the full quantity.
pub fn release_order(
    tx: &mut dyn StoreTx,
    id: OrderId,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    let order = load(tx, id)?;
    precheck(&order, &[OrderStatus::Hold, OrderStatus::Partial], "release")?;

    let ctx = movement_context(&order, actor);
    let reservation = reserve_full(tx, &order, &ctx, now)?;
    execute(
        tx,
        order,
        OrderCommand::Release(ReleaseOrder {
            reservation,
            occurred_at: now,
        }),
    )
}

/// Confirm allocation. Orders without a reservation reserve first.
pub fn allocate_order(
    tx: &mut dyn StoreTx,
    id: OrderId,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    let order = load(tx, id)?;
    precheck(
        &order,
        &[OrderStatus::Hold, OrderStatus::Partial, OrderStatus::Released],
        "allocate",
    )?;

    let reservation = match order.reservation() {
        Some(_) => None,
        None => {
            let ctx = movement_context(&order, actor);
            Some(reserve_full(tx, &order, &ctx, now)?)
        }
    };
    execute(
        tx,
        order,
        OrderCommand::Allocate(AllocateOrder {
            reservation,
            occurred_at: now,
        }),
    )
}

pub fn pick_order(
    tx: &mut dyn StoreTx,
    id: OrderId,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    let order = load(tx, id)?;
    execute(tx, order, OrderCommand::Pick(PickOrder { occurred_at: now }))
}

/// PICKED → SHIPPED, consuming the reservation from on-hand and allocated.
pub fn ship_order(
    tx: &mut dyn StoreTx,
    id: OrderId,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    let mut order = load(tx, id)?;
    let events = order.handle(&OrderCommand::Ship(ShipOrder { occurred_at: now }))?;

    let ctx = movement_context(&order, actor);
    for event in &events {
        if let OrderEvent::OrderShipped(shipped) = event {
            ledger::consume(tx, &shipped.consumed, &ctx, now)?;
        }
    }

    apply_all(&mut order, &events);
    tx.put_order(order.clone())?;
    Ok(order)
}

/// Cancel from any non-terminal status, giving back a held reservation first.
pub fn cancel_order(
    tx: &mut dyn StoreTx,
    id: OrderId,
    reason: &str,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    let mut order = load(tx, id)?;
    let events = order.handle(&OrderCommand::Cancel(CancelOrder {
        reason: reason.to_string(),
        occurred_at: now,
    }))?;

    let ctx = movement_context(&order, actor);
    for event in &events {
        if let OrderEvent::OrderCancelled(OrderCancelled {
            released: Some(held),
            ..
        }) = event
        {
            ledger::release(tx, held, &ctx, now)?;
        }
    }

    apply_all(&mut order, &events);
    tx.put_order(order.clone())?;
    Ok(order)
}

/// Move an order to `target` along the regular life cycle.
///
/// HOLD and PARTIAL are not reachable this way; use [`override_status`].
pub fn transition_order(
    tx: &mut dyn StoreTx,
    id: OrderId,
    target: OrderStatus,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    match target {
        OrderStatus::Released => release_order(tx, id, actor, now),
        OrderStatus::Allocated => allocate_order(tx, id, actor, now),
        OrderStatus::Picked => pick_order(tx, id, now),
        OrderStatus::Shipped => ship_order(tx, id, actor, now),
        OrderStatus::Cancelled => cancel_order(tx, id, DEFAULT_CANCEL_REASON, actor, now),
        OrderStatus::Hold | OrderStatus::Partial => Err(EngineError::Validation(format!(
            "{target} is only reachable through a status override"
        ))),
    }
}

pub fn edit_order(
    tx: &mut dyn StoreTx,
    id: OrderId,
    edit: OrderEdit,
    expected_version: ExpectedVersion,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    let order = load(tx, id)?;
    execute(
        tx,
        order,
        OrderCommand::Edit(EditOrder {
            delivery: edit.delivery,
            client_reference: edit.client_reference,
            expected_version,
            occurred_at: now,
        }),
    )
}

/// Force an order to `target` among the pre-pick statuses.
///
/// Entering a reserved status reserves first; leaving one releases first.
/// Both happen in the caller's transaction together with the status change.
pub fn override_status(
    tx: &mut dyn StoreTx,
    id: OrderId,
    target: OrderStatus,
    expected_version: ExpectedVersion,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<OutboundOrder, EngineError> {
    let order = load(tx, id)?;
    if !target.is_overridable() {
        return Err(EngineError::Validation(format!(
            "status {target} cannot be set by override"
        )));
    }
    precheck(
        &order,
        &[
            OrderStatus::Hold,
            OrderStatus::Partial,
            OrderStatus::Released,
            OrderStatus::Allocated,
        ],
        "override",
    )?;
    expected_version.check(order.version())?;
    if target == order.status() {
        return Ok(order);
    }

    let ctx = movement_context(&order, actor);
    let mut reserved = None;
    let mut released = false;
    match (target.holds_reservation(), order.reservation()) {
        (true, None) => reserved = Some(reserve_full(tx, &order, &ctx, now)?),
        (false, Some(held)) => {
            ledger::release(tx, &held, &ctx, now)?;
            released = true;
        }
        _ => {}
    }

    execute(
        tx,
        order,
        OrderCommand::OverrideStatus(OverrideStatus {
            target,
            reserved,
            released,
            expected_version,
            occurred_at: now,
        }),
    )
}
