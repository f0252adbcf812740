//! ASN receiving pipeline.
//!
//! Registration has no ledger effect. Processing puts every open line away
//! through [`ledger::receive`], one savepoint per line: a line that fails is
//! undone and reported while the lines before it stay committed. Storage
//! failures and invariant violations are not caught and abort the whole batch.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use stockforge_core::{Aggregate, Deletion, LocationCode, Sku, UserId};
use stockforge_inventory::{InventoryId, MovementContext, ReceiptRef, StockKey};
use stockforge_receiving::{
    Asn, AsnCommand, AsnId, AsnLine, CompleteAsn, CreateAsn, DeleteAsn, HoldAsn, NewAsnLine,
    ReceiveLine, RejectLine, ReleaseAsn, StartReceiving,
};

use crate::error::EngineError;
use crate::ledger::{self, Receipt, ReceiveOutcome};
use crate::store::StoreTx;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsn {
    pub asn_number: String,
    pub supplier: String,
    pub arrival_date: NaiveDate,
    pub lines: Vec<NewAsnLine>,
}

/// A line that could not be put away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnLineError {
    pub line_no: u32,
    pub sku: Sku,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnProcessingReport {
    pub asn_number: String,
    /// Lines put away by this run.
    pub lines_processed: usize,
    /// Lines already received by an earlier run.
    pub lines_skipped: usize,
    /// Putaways that opened a new record.
    pub items_added: usize,
    /// Putaways that topped up an existing record.
    pub items_updated: usize,
    pub line_errors: Vec<AsnLineError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnDeletionReport {
    pub asn_number: String,
    /// Records whose provenance was relabelled; their stock is untouched.
    pub orphaned: Vec<InventoryId>,
}

fn load(tx: &dyn StoreTx, asn_number: &str) -> Result<Asn, EngineError> {
    tx.asn_by_number(asn_number.trim())?
        .filter(|a| a.is_created())
        .ok_or_else(|| EngineError::NotFound(format!("ASN {asn_number}")))
}

fn execute(asn: &mut Asn, command: AsnCommand) -> Result<(), EngineError> {
    let events = asn.handle(&command)?;
    for event in &events {
        asn.apply(event);
    }
    Ok(())
}

fn execute_and_store(
    tx: &mut dyn StoreTx,
    mut asn: Asn,
    command: AsnCommand,
) -> Result<Asn, EngineError> {
    execute(&mut asn, command)?;
    tx.put_asn(asn.clone())?;
    Ok(asn)
}

/// Register an ASN with all lines unreceived.
pub fn create_asn(
    tx: &mut dyn StoreTx,
    new: NewAsn,
    now: DateTime<Utc>,
) -> Result<Asn, EngineError> {
    let asn_number = new.asn_number.trim().to_string();
    if tx.asn_by_number(&asn_number)?.is_some() {
        return Err(EngineError::Conflict(format!("ASN {asn_number} already exists")));
    }

    let asn_id = AsnId::generate();
    execute_and_store(
        tx,
        Asn::empty(asn_id),
        AsnCommand::Create(CreateAsn {
            asn_id,
            asn_number,
            supplier: new.supplier,
            arrival_date: new.arrival_date,
            lines: new.lines,
            occurred_at: now,
        }),
    )
}

pub fn hold_asn(
    tx: &mut dyn StoreTx,
    asn_number: &str,
    now: DateTime<Utc>,
) -> Result<Asn, EngineError> {
    let asn = load(tx, asn_number)?;
    execute_and_store(tx, asn, AsnCommand::Hold(HoldAsn { occurred_at: now }))
}

pub fn release_asn(
    tx: &mut dyn StoreTx,
    asn_number: &str,
    now: DateTime<Utc>,
) -> Result<Asn, EngineError> {
    let asn = load(tx, asn_number)?;
    execute_and_store(tx, asn, AsnCommand::Release(ReleaseAsn { occurred_at: now }))
}

pub fn start_receiving(
    tx: &mut dyn StoreTx,
    asn_number: &str,
    now: DateTime<Utc>,
) -> Result<Asn, EngineError> {
    let asn = load(tx, asn_number)?;
    execute_and_store(
        tx,
        asn,
        AsnCommand::StartReceiving(StartReceiving { occurred_at: now }),
    )
}

/// Put one line away and mark it received.
fn put_away_line(
    tx: &mut dyn StoreTx,
    asn: &mut Asn,
    line: &AsnLine,
    receiving_location: &LocationCode,
    ctx: &MovementContext,
    now: DateTime<Utc>,
) -> Result<ReceiveOutcome, EngineError> {
    let today = now.date_naive();
    if let Some(expiry) = line.expiry.filter(|e| *e < today) {
        return Err(EngineError::Validation(format!(
            "expiry date {expiry} is before {today}"
        )));
    }

    let location = line
        .putaway_location
        .clone()
        .unwrap_or_else(|| receiving_location.clone());
    let outcome = ledger::receive(
        tx,
        Receipt {
            key: StockKey {
                sku: line.sku.clone(),
                batch: line.batch.clone(),
                location,
                expiry: line.expiry,
            },
            condition: line.condition.clone(),
            qty: line.expected_qty,
            source: ReceiptRef::Asn(asn.asn_number().to_string()),
        },
        ctx,
        now,
    )?;

    execute(
        asn,
        AsnCommand::ReceiveLine(ReceiveLine {
            line_no: line.line_no,
            qty: line.expected_qty,
            inventory_id: outcome.record.id_typed(),
            occurred_at: now,
        }),
    )?;
    Ok(outcome)
}

/// Receive every open line of an ASN into stock, then mark it Completed.
///
/// The ASN is completed once every line has been attempted, whatever the
/// per-line outcomes. A completed ASN is never processed again.
pub fn process_asn(
    tx: &mut dyn StoreTx,
    asn_number: &str,
    receiving_location: &LocationCode,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<AsnProcessingReport, EngineError> {
    let mut asn = load(tx, asn_number)?;
    asn.ensure_processable()?;

    let mut report = AsnProcessingReport {
        asn_number: asn.asn_number().to_string(),
        ..AsnProcessingReport::default()
    };
    let ctx = MovementContext::new(asn.asn_number(), actor);
    let lines = asn.lines().to_vec();

    for line in &lines {
        if line.is_received() {
            report.lines_skipped += 1;
            continue;
        }

        let savepoint = tx.savepoint()?;
        let snapshot = asn.clone();
        match put_away_line(tx, &mut asn, line, receiving_location, &ctx, now) {
            Ok(outcome) => {
                tx.release_savepoint(savepoint)?;
                report.lines_processed += 1;
                if outcome.created {
                    report.items_added += 1;
                } else {
                    report.items_updated += 1;
                }
            }
            Err(e) if e.is_internal() => return Err(e),
            Err(e) => {
                tx.rollback_to(savepoint)?;
                asn = snapshot;
                warn!(
                    asn = %report.asn_number,
                    line_no = line.line_no,
                    sku = %line.sku,
                    error = %e,
                    "ASN line rejected"
                );
                execute(
                    &mut asn,
                    AsnCommand::RejectLine(RejectLine {
                        line_no: line.line_no,
                        reason: e.to_string(),
                        occurred_at: now,
                    }),
                )?;
                report.line_errors.push(AsnLineError {
                    line_no: line.line_no,
                    sku: line.sku.clone(),
                    message: e.public_message(),
                });
            }
        }
    }

    execute_and_store(tx, asn, AsnCommand::Complete(CompleteAsn { occurred_at: now }))?;
    Ok(report)
}

/// Delete an ASN. Stock it already produced stays; its provenance becomes orphaned.
pub fn delete_asn(
    tx: &mut dyn StoreTx,
    asn_number: &str,
    reason: &str,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<AsnDeletionReport, EngineError> {
    let mut asn = load(tx, asn_number)?;
    execute(
        &mut asn,
        AsnCommand::Delete(DeleteAsn {
            deletion: Deletion {
                at: now,
                by: actor,
                reason: reason.trim().to_string(),
            },
        }),
    )?;

    let ctx = MovementContext::new(asn.asn_number(), actor);
    let orphaned = ledger::orphan_receipts(tx, asn.asn_number(), &ctx, now)?;
    let asn_number = asn.asn_number().to_string();
    tx.put_asn(asn)?;

    Ok(AsnDeletionReport {
        asn_number,
        orphaned,
    })
}
