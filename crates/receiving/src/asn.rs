use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockforge_core::{
    Aggregate, AggregateId, AggregateRoot, BatchNumber, ConditionCode, Deletion, DomainError,
    Entity, LocationCode, Sku, find_entity,
};
use stockforge_events::Event;
use stockforge_inventory::InventoryId;

/// ASN identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AsnId(pub AggregateId);

impl AsnId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for AsnId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AsnStatus {
    Pending,
    Released,
    InProgress,
    Hold,
    Completed,
    Deleted(Deletion),
}

impl AsnStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AsnStatus::Completed | AsnStatus::Deleted(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            AsnStatus::Pending => "Pending",
            AsnStatus::Released => "Released",
            AsnStatus::InProgress => "In Progress",
            AsnStatus::Hold => "Hold",
            AsnStatus::Completed => "Completed",
            AsnStatus::Deleted(_) => "Deleted",
        }
    }
}

impl core::fmt::Display for AsnStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Line as submitted when the ASN is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsnLine {
    pub sku: Sku,
    pub expected_qty: i64,
    pub batch: Option<BatchNumber>,
    pub condition: ConditionCode,
    pub expiry: Option<NaiveDate>,
    /// Putaway location; the configured receiving location is used when absent.
    pub putaway_location: Option<LocationCode>,
}

/// ASN line (entity inside the ASN aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnLine {
    pub line_no: u32,
    pub sku: Sku,
    pub expected_qty: i64,
    pub received_qty: i64,
    pub batch: Option<BatchNumber>,
    pub condition: ConditionCode,
    pub expiry: Option<NaiveDate>,
    pub putaway_location: Option<LocationCode>,
    /// Record the line was put away into.
    pub inventory_id: Option<InventoryId>,
    /// Reason the last processing attempt failed, cleared on receipt.
    pub last_error: Option<String>,
}

impl AsnLine {
    pub fn is_received(&self) -> bool {
        self.inventory_id.is_some()
    }

    /// `expected - received`; positive means short-shipped.
    pub fn discrepancy(&self) -> i64 {
        self.expected_qty - self.received_qty
    }
}

impl Entity for AsnLine {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.line_no
    }
}

/// Aggregate root: Asn (header + lines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asn {
    id: AsnId,
    asn_number: String,
    supplier: String,
    arrival_date: Option<NaiveDate>,
    status: AsnStatus,
    lines: Vec<AsnLine>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Asn {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: AsnId) -> Self {
        Self {
            id,
            asn_number: String::new(),
            supplier: String::new(),
            arrival_date: None,
            status: AsnStatus::Pending,
            lines: Vec::new(),
            created_at: None,
            updated_at: None,
            completed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AsnId {
        self.id
    }

    pub fn asn_number(&self) -> &str {
        &self.asn_number
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn arrival_date(&self) -> Option<NaiveDate> {
        self.arrival_date
    }

    pub fn status(&self) -> &AsnStatus {
        &self.status
    }

    pub fn lines(&self) -> &[AsnLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&AsnLine> {
        find_entity(&self.lines, &line_no)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Fails unless lines may currently be put away.
    pub fn ensure_processable(&self) -> Result<(), DomainError> {
        match &self.status {
            AsnStatus::Pending | AsnStatus::Released | AsnStatus::InProgress => Ok(()),
            AsnStatus::Hold => Err(DomainError::conflict(format!(
                "ASN {} is on hold",
                self.asn_number
            ))),
            AsnStatus::Completed | AsnStatus::Deleted(_) => Err(DomainError::already_terminal(
                format!("ASN {} is {}", self.asn_number, self.status),
            )),
        }
    }
}

impl AggregateRoot for Asn {
    type Id = AsnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateAsn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAsn {
    pub asn_id: AsnId,
    pub asn_number: String,
    pub supplier: String,
    pub arrival_date: NaiveDate,
    pub lines: Vec<NewAsnLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: HoldAsn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldAsn {
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseAsn (Pending/Hold → Released).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsn {
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartReceiving (Pending/Released → In Progress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReceiving {
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveLine (the line's stock was put away).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub line_no: u32,
    pub qty: i64,
    pub inventory_id: InventoryId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectLine (putaway of the line failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectLine {
    pub line_no: u32,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteAsn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteAsn {
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteAsn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAsn {
    pub deletion: Deletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsnCommand {
    Create(CreateAsn),
    Hold(HoldAsn),
    Release(ReleaseAsn),
    StartReceiving(StartReceiving),
    ReceiveLine(ReceiveLine),
    RejectLine(RejectLine),
    Complete(CompleteAsn),
    Delete(DeleteAsn),
}

/// Event: AsnCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnCreated {
    pub asn_id: AsnId,
    pub asn_number: String,
    pub supplier: String,
    pub arrival_date: NaiveDate,
    pub lines: Vec<AsnLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AsnHeld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnHeld {
    pub asn_id: AsnId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AsnReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnReleased {
    pub asn_id: AsnId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReceivingStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingStarted {
    pub asn_id: AsnId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceived {
    pub asn_id: AsnId,
    pub line_no: u32,
    pub qty: i64,
    pub inventory_id: InventoryId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRejected {
    pub asn_id: AsnId,
    pub line_no: u32,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AsnCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnCompleted {
    pub asn_id: AsnId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AsnDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnDeleted {
    pub asn_id: AsnId,
    pub deletion: Deletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsnEvent {
    AsnCreated(AsnCreated),
    AsnHeld(AsnHeld),
    AsnReleased(AsnReleased),
    ReceivingStarted(ReceivingStarted),
    LineReceived(LineReceived),
    LineRejected(LineRejected),
    AsnCompleted(AsnCompleted),
    AsnDeleted(AsnDeleted),
}

impl Event for AsnEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AsnEvent::AsnCreated(_) => "receiving.asn.created",
            AsnEvent::AsnHeld(_) => "receiving.asn.held",
            AsnEvent::AsnReleased(_) => "receiving.asn.released",
            AsnEvent::ReceivingStarted(_) => "receiving.asn.receiving_started",
            AsnEvent::LineReceived(_) => "receiving.asn.line_received",
            AsnEvent::LineRejected(_) => "receiving.asn.line_rejected",
            AsnEvent::AsnCompleted(_) => "receiving.asn.completed",
            AsnEvent::AsnDeleted(_) => "receiving.asn.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AsnEvent::AsnCreated(e) => e.occurred_at,
            AsnEvent::AsnHeld(e) => e.occurred_at,
            AsnEvent::AsnReleased(e) => e.occurred_at,
            AsnEvent::ReceivingStarted(e) => e.occurred_at,
            AsnEvent::LineReceived(e) => e.occurred_at,
            AsnEvent::LineRejected(e) => e.occurred_at,
            AsnEvent::AsnCompleted(e) => e.occurred_at,
            AsnEvent::AsnDeleted(e) => e.deletion.at,
        }
    }
}

impl Aggregate for Asn {
    type Command = AsnCommand;
    type Event = AsnEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AsnEvent::AsnCreated(e) => {
                self.id = e.asn_id;
                self.asn_number = e.asn_number.clone();
                self.supplier = e.supplier.clone();
                self.arrival_date = Some(e.arrival_date);
                self.status = AsnStatus::Pending;
                self.lines = e.lines.clone();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            AsnEvent::AsnHeld(_) => {
                self.status = AsnStatus::Hold;
            }
            AsnEvent::AsnReleased(_) => {
                self.status = AsnStatus::Released;
            }
            AsnEvent::ReceivingStarted(_) => {
                self.status = AsnStatus::InProgress;
            }
            AsnEvent::LineReceived(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.received_qty += e.qty;
                    line.inventory_id = Some(e.inventory_id);
                    line.last_error = None;
                }
                self.status = AsnStatus::InProgress;
            }
            AsnEvent::LineRejected(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.last_error = Some(e.reason.clone());
                }
                self.status = AsnStatus::InProgress;
            }
            AsnEvent::AsnCompleted(e) => {
                self.status = AsnStatus::Completed;
                self.completed_at = Some(e.occurred_at);
            }
            AsnEvent::AsnDeleted(e) => {
                self.status = AsnStatus::Deleted(e.deletion.clone());
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AsnCommand::Create(cmd) => self.handle_create(cmd),
            AsnCommand::Hold(cmd) => self.handle_hold(cmd),
            AsnCommand::Release(cmd) => self.handle_release(cmd),
            AsnCommand::StartReceiving(cmd) => self.handle_start(cmd),
            AsnCommand::ReceiveLine(cmd) => self.handle_receive_line(cmd),
            AsnCommand::RejectLine(cmd) => self.handle_reject_line(cmd),
            AsnCommand::Complete(cmd) => self.handle_complete(cmd),
            AsnCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Asn {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("ASN {}", self.id)));
        }
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::already_terminal(format!(
                "ASN {} is {}",
                self.asn_number, self.status
            )));
        }
        Ok(())
    }

    fn open_line(&self, line_no: u32) -> Result<&AsnLine, DomainError> {
        let line = self
            .line(line_no)
            .ok_or_else(|| DomainError::not_found(format!("ASN {} line {line_no}", self.asn_number)))?;
        if line.is_received() {
            return Err(DomainError::conflict(format!(
                "ASN {} line {line_no} already received",
                self.asn_number
            )));
        }
        Ok(line)
    }

    fn handle_create(&self, cmd: &CreateAsn) -> Result<Vec<AsnEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ASN already exists"));
        }

        let asn_number = cmd.asn_number.trim();
        if asn_number.is_empty() {
            return Err(DomainError::validation("ASN number cannot be empty"));
        }
        if cmd.supplier.trim().is_empty() {
            return Err(DomainError::validation("supplier cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("ASN must have at least one line"));
        }
        if let Some(bad) = cmd.lines.iter().position(|l| l.expected_qty <= 0) {
            return Err(DomainError::validation(format!(
                "line {} expected quantity must be positive",
                bad + 1
            )));
        }

        let lines = cmd
            .lines
            .iter()
            .zip(1u32..)
            .map(|(l, line_no)| AsnLine {
                line_no,
                sku: l.sku.clone(),
                expected_qty: l.expected_qty,
                received_qty: 0,
                batch: l.batch.clone(),
                condition: l.condition.clone(),
                expiry: l.expiry,
                putaway_location: l.putaway_location.clone(),
                inventory_id: None,
                last_error: None,
            })
            .collect();

        Ok(vec![AsnEvent::AsnCreated(AsnCreated {
            asn_id: cmd.asn_id,
            asn_number: asn_number.to_string(),
            supplier: cmd.supplier.trim().to_string(),
            arrival_date: cmd.arrival_date,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_hold(&self, cmd: &HoldAsn) -> Result<Vec<AsnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_not_terminal()?;
        if self.status == AsnStatus::Hold {
            return Ok(vec![]);
        }

        Ok(vec![AsnEvent::AsnHeld(AsnHeld {
            asn_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseAsn) -> Result<Vec<AsnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_not_terminal()?;
        match self.status {
            AsnStatus::Pending | AsnStatus::Hold => {}
            AsnStatus::Released => return Ok(vec![]),
            _ => {
                return Err(DomainError::conflict(format!(
                    "cannot release ASN {} in status {}",
                    self.asn_number, self.status
                )));
            }
        }

        Ok(vec![AsnEvent::AsnReleased(AsnReleased {
            asn_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start(&self, cmd: &StartReceiving) -> Result<Vec<AsnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_processable()?;
        if self.status == AsnStatus::InProgress {
            return Ok(vec![]);
        }

        Ok(vec![AsnEvent::ReceivingStarted(ReceivingStarted {
            asn_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_line(&self, cmd: &ReceiveLine) -> Result<Vec<AsnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_processable()?;
        self.open_line(cmd.line_no)?;
        if cmd.qty <= 0 {
            return Err(DomainError::validation("received quantity must be positive"));
        }

        Ok(vec![AsnEvent::LineReceived(LineReceived {
            asn_id: self.id,
            line_no: cmd.line_no,
            qty: cmd.qty,
            inventory_id: cmd.inventory_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject_line(&self, cmd: &RejectLine) -> Result<Vec<AsnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_processable()?;
        self.open_line(cmd.line_no)?;

        Ok(vec![AsnEvent::LineRejected(LineRejected {
            asn_id: self.id,
            line_no: cmd.line_no,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteAsn) -> Result<Vec<AsnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_processable()?;

        Ok(vec![AsnEvent::AsnCompleted(AsnCompleted {
            asn_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteAsn) -> Result<Vec<AsnEvent>, DomainError> {
        self.ensure_created()?;
        if let AsnStatus::Deleted(_) = self.status {
            return Err(DomainError::already_terminal(format!(
                "ASN {} is already deleted",
                self.asn_number
            )));
        }
        if cmd.deletion.reason.trim().is_empty() {
            return Err(DomainError::validation("deletion reason cannot be empty"));
        }

        Ok(vec![AsnEvent::AsnDeleted(AsnDeleted {
            asn_id: self.id,
            deletion: cmd.deletion.clone(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockforge_core::UserId;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_line(sku: &str, qty: i64) -> NewAsnLine {
        NewAsnLine {
            sku: Sku::parse(sku).unwrap(),
            expected_qty: qty,
            batch: None,
            condition: ConditionCode::good(),
            expiry: None,
            putaway_location: None,
        }
    }

    fn created_asn() -> Asn {
        let id = AsnId::generate();
        let mut asn = Asn::empty(id);
        asn.execute(&AsnCommand::Create(CreateAsn {
            asn_id: id,
            asn_number: "ASN-100".to_string(),
            supplier: "Acme Supply".to_string(),
            arrival_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            lines: vec![new_line("SKU-B", 20), new_line("SKU-C", 5)],
            occurred_at: test_time(),
        }))
        .unwrap();
        asn
    }

    #[test]
    fn create_numbers_lines_and_starts_pending() {
        let asn = created_asn();
        assert_eq!(asn.status(), &AsnStatus::Pending);
        assert_eq!(asn.lines().len(), 2);
        assert_eq!(asn.line(2).map(|l| l.expected_qty), Some(5));
        assert!(asn.lines().iter().all(|l| l.received_qty == 0));
        assert_eq!(asn.version(), 1);
    }

    #[test]
    fn create_rejects_empty_or_non_positive_lines() {
        let id = AsnId::generate();
        let asn = Asn::empty(id);
        let mut cmd = CreateAsn {
            asn_id: id,
            asn_number: "ASN-1".to_string(),
            supplier: "S".to_string(),
            arrival_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            lines: vec![],
            occurred_at: test_time(),
        };
        assert!(matches!(
            asn.handle(&AsnCommand::Create(cmd.clone())),
            Err(DomainError::Validation(_))
        ));

        cmd.lines = vec![new_line("SKU-B", 0)];
        assert!(matches!(
            asn.handle(&AsnCommand::Create(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn receiving_a_line_moves_asn_in_progress() {
        let mut asn = created_asn();
        let inventory_id = InventoryId::generate();
        asn.execute(&AsnCommand::ReceiveLine(ReceiveLine {
            line_no: 1,
            qty: 20,
            inventory_id,
            occurred_at: test_time(),
        }))
        .unwrap();

        let line = asn.line(1).unwrap();
        assert!(line.is_received());
        assert_eq!(line.received_qty, 20);
        assert_eq!(line.discrepancy(), 0);
        assert_eq!(asn.status(), &AsnStatus::InProgress);
    }

    #[test]
    fn line_cannot_be_received_twice() {
        let mut asn = created_asn();
        let cmd = AsnCommand::ReceiveLine(ReceiveLine {
            line_no: 1,
            qty: 20,
            inventory_id: InventoryId::generate(),
            occurred_at: test_time(),
        });
        asn.execute(&cmd).unwrap();
        assert!(matches!(asn.handle(&cmd), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn rejected_line_keeps_reason_until_received() {
        let mut asn = created_asn();
        asn.execute(&AsnCommand::RejectLine(RejectLine {
            line_no: 2,
            reason: "expired on arrival".to_string(),
            occurred_at: test_time(),
        }))
        .unwrap();
        assert_eq!(asn.line(2).and_then(|l| l.last_error.as_deref()), Some("expired on arrival"));
        assert!(!asn.line(2).unwrap().is_received());
    }

    #[test]
    fn completed_asn_cannot_be_processed_again() {
        let mut asn = created_asn();
        asn.execute(&AsnCommand::Complete(CompleteAsn { occurred_at: test_time() }))
            .unwrap();
        assert_eq!(asn.status(), &AsnStatus::Completed);
        assert!(asn.completed_at().is_some());

        assert!(matches!(
            asn.ensure_processable(),
            Err(DomainError::AlreadyTerminal(_))
        ));
        let err = asn
            .handle(&AsnCommand::Complete(CompleteAsn { occurred_at: test_time() }))
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyTerminal(_)));
    }

    #[test]
    fn held_asn_is_not_processable_until_released() {
        let mut asn = created_asn();
        asn.execute(&AsnCommand::Hold(HoldAsn { occurred_at: test_time() }))
            .unwrap();
        assert!(matches!(asn.ensure_processable(), Err(DomainError::Conflict(_))));

        asn.execute(&AsnCommand::Release(ReleaseAsn { occurred_at: test_time() }))
            .unwrap();
        assert_eq!(asn.status(), &AsnStatus::Released);
        assert!(asn.ensure_processable().is_ok());
    }

    #[test]
    fn completed_asn_can_still_be_deleted_once() {
        let mut asn = created_asn();
        asn.execute(&AsnCommand::Complete(CompleteAsn { occurred_at: test_time() }))
            .unwrap();

        let delete = AsnCommand::Delete(DeleteAsn {
            deletion: Deletion {
                at: test_time(),
                by: UserId::new(),
                reason: "entered twice".to_string(),
            },
        });
        asn.execute(&delete).unwrap();
        assert!(matches!(asn.status(), AsnStatus::Deleted(d) if d.reason == "entered twice"));
        assert!(matches!(asn.handle(&delete), Err(DomainError::AlreadyTerminal(_))));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let asn = created_asn();
        let before = asn.clone();
        let _ = asn.handle(&AsnCommand::StartReceiving(StartReceiving { occurred_at: test_time() }));
        assert_eq!(asn, before);
    }
}
