//! Auto-release reconciler: promote HOLD orders once stock is available.
//!
//! A read-only scan picks candidates oldest first. The scan is only a hint:
//! each candidate is re-verified and reserved inside the write transaction,
//! under its own savepoint, so one rejected candidate never undoes the
//! releases made before it. An internal failure aborts the whole run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stockforge_core::{Aggregate, UserId};
use stockforge_inventory::MovementContext;
use stockforge_orders::{
    OrderCommand, OrderId, OrderStatus, OutboundOrder, ReleaseOrder, Reservation,
};

use crate::error::EngineError;
use crate::ledger::{self, ReservationOutcome};
use crate::store::StoreTx;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReleaseError {
    pub order_id: OrderId,
    pub order_number: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReleaseReport {
    /// Candidates attempted.
    pub processed: usize,
    pub released: usize,
    pub errors: Vec<AutoReleaseError>,
}

fn fifo_key(order: &OutboundOrder) -> (Option<DateTime<Utc>>, u64) {
    (order.created_at(), order.sequence())
}

/// HOLD orders whose SKU currently shows enough stock, oldest first.
pub fn scan_candidates(
    tx: &dyn StoreTx,
    limit: Option<usize>,
) -> Result<Vec<OrderId>, EngineError> {
    let mut held = tx.orders_with_status(OrderStatus::Hold)?;
    held.sort_by_key(fifo_key);

    let mut candidates = Vec::new();
    for order in &held {
        if limit.is_some_and(|max| candidates.len() >= max) {
            break;
        }
        let Some(sku) = order.sku() else { continue };
        let qty = order.qty_ordered();
        if ledger::available_for(tx, sku, order.preferred_location(), qty)? >= qty {
            candidates.push(order.id_typed());
        }
    }
    Ok(candidates)
}

/// Re-verify and release one candidate.
fn release_candidate(
    tx: &mut dyn StoreTx,
    mut order: OutboundOrder,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if order.status() != OrderStatus::Hold {
        return Err(EngineError::Conflict(format!(
            "order {} is now {}",
            order.order_number(),
            order.status()
        )));
    }
    let Some(sku) = order.sku().cloned() else {
        return Err(EngineError::InvariantViolation(format!(
            "order {} has no line",
            order.order_number()
        )));
    };

    let qty = order.qty_ordered();
    let ctx = MovementContext::new(order.order_number(), actor);
    let reservation = match ledger::reserve(tx, &sku, order.preferred_location(), qty, &ctx, now)? {
        ReservationOutcome::Reserved { inventory_id, qty } => Reservation { inventory_id, qty },
        ReservationOutcome::InsufficientAvailable { available } => {
            return Err(EngineError::insufficient_available(qty, available));
        }
    };

    let events = order.handle(&OrderCommand::Release(ReleaseOrder {
        reservation,
        occurred_at: now,
    }))?;
    for event in &events {
        order.apply(event);
    }
    tx.put_order(order)?;
    Ok(())
}

/// Release the given candidates in order, each under its own savepoint.
///
/// Recoverable per-order failures are collected. Internal failures abort
/// the run and roll back the whole transaction.
pub fn release_candidates(
    tx: &mut dyn StoreTx,
    candidates: &[OrderId],
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<AutoReleaseReport, EngineError> {
    let mut report = AutoReleaseReport::default();

    for &order_id in candidates {
        report.processed += 1;
        let Some(order) = tx.order(order_id)? else {
            report.errors.push(AutoReleaseError {
                order_id,
                order_number: String::new(),
                message: format!("order {order_id} no longer exists"),
            });
            continue;
        };
        let order_number = order.order_number().to_string();

        let savepoint = tx.savepoint()?;
        match release_candidate(tx, order, actor, now) {
            Ok(()) => {
                tx.release_savepoint(savepoint)?;
                report.released += 1;
                debug!(order = %order_number, "order auto-released");
            }
            Err(e) if e.is_internal() => return Err(e),
            Err(e) => {
                tx.rollback_to(savepoint)?;
                warn!(order = %order_number, error = %e, "auto-release skipped order");
                report.errors.push(AutoReleaseError {
                    order_id,
                    order_number,
                    message: e.public_message(),
                });
            }
        }
    }

    Ok(report)
}
