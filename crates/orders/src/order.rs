use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockforge_core::{
    Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, ExpectedVersion, LocationCode,
    Sku,
};
use stockforge_events::Event;
use stockforge_inventory::InventoryId;

/// Outbound order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Outbound order status life cycle.
///
/// RELEASED and ALLOCATED both hold a reservation: RELEASED is queued for
/// allocation confirmation, ALLOCATED is confirmed and may be picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Hold,
    Released,
    Allocated,
    Partial,
    Picked,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    /// Status a new order starts in, given what the ledger can offer.
    pub fn initial_for(qty_ordered: i64, qty_available: i64) -> Self {
        if qty_available >= qty_ordered {
            OrderStatus::Released
        } else if qty_available > 0 {
            OrderStatus::Partial
        } else {
            OrderStatus::Hold
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Cancelled)
    }

    /// Statuses in which the order must hold its full reservation.
    pub fn holds_reservation(&self) -> bool {
        matches!(
            self,
            OrderStatus::Released | OrderStatus::Allocated | OrderStatus::Picked
        )
    }

    pub fn is_editable(&self) -> bool {
        !self.is_terminal()
    }

    /// Statuses reachable through a manual status override.
    pub fn is_overridable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Hold | OrderStatus::Partial | OrderStatus::Released | OrderStatus::Allocated
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Hold => "HOLD",
            OrderStatus::Released => "RELEASED",
            OrderStatus::Allocated => "ALLOCATED",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Picked => "PICKED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOLD" => Ok(OrderStatus::Hold),
            "RELEASED" => Ok(OrderStatus::Released),
            "ALLOCATED" => Ok(OrderStatus::Allocated),
            "PARTIAL" => Ok(OrderStatus::Partial),
            "PICKED" => Ok(OrderStatus::Picked),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

/// Stock reserved on behalf of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub inventory_id: InventoryId,
    pub qty: i64,
}

/// The single line of an outbound order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: Sku,
    pub qty_ordered: i64,
}

/// Customer and delivery information (editable until shipped or cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub customer_name: String,
    pub address_lines: Vec<String>,
    pub city: String,
    pub postcode: String,
    pub country: String,
    pub carrier: Option<String>,
    pub requested_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl DeliveryDetails {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if self.address_lines.iter().all(|l| l.trim().is_empty()) {
            return Err(DomainError::validation("delivery address cannot be empty"));
        }
        if self.country.trim().is_empty() {
            return Err(DomainError::validation("country cannot be empty"));
        }
        Ok(())
    }
}

/// Longest order number accepted.
pub const MAX_ORDER_NUMBER_LEN: usize = 64;

/// Aggregate root: OutboundOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundOrder {
    id: OrderId,
    order_number: String,
    client_id: Option<ClientId>,
    line: Option<OrderLine>,
    client_reference: Option<String>,
    delivery: DeliveryDetails,
    preferred_location: Option<LocationCode>,
    status: OrderStatus,
    reservation: Option<Reservation>,
    sequence: u64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl OutboundOrder {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            client_id: None,
            line: None,
            client_reference: None,
            delivery: DeliveryDetails::default(),
            preferred_location: None,
            status: OrderStatus::Hold,
            reservation: None,
            sequence: 0,
            created_at: None,
            updated_at: None,
            shipped_at: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn line(&self) -> Option<&OrderLine> {
        self.line.as_ref()
    }

    pub fn sku(&self) -> Option<&Sku> {
        self.line.as_ref().map(|l| &l.sku)
    }

    pub fn qty_ordered(&self) -> i64 {
        self.line.as_ref().map(|l| l.qty_ordered).unwrap_or(0)
    }

    pub fn client_reference(&self) -> Option<&str> {
        self.client_reference.as_deref()
    }

    pub fn delivery(&self) -> &DeliveryDetails {
        &self.delivery
    }

    /// Location hint used when resolving which record to reserve from.
    pub fn preferred_location(&self) -> Option<&LocationCode> {
        self.preferred_location.as_ref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn reservation(&self) -> Option<Reservation> {
        self.reservation
    }

    /// Intake sequence (FIFO tie-break after `created_at`).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for OutboundOrder {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder.
///
/// `qty_available` is what the ledger offered on the target record at decision
/// time; `reservation` must be present exactly when that was enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub client_id: ClientId,
    pub sku: Sku,
    pub qty_ordered: i64,
    pub client_reference: Option<String>,
    pub delivery: DeliveryDetails,
    pub preferred_location: Option<LocationCode>,
    pub qty_available: i64,
    pub reservation: Option<Reservation>,
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseOrder (HOLD/PARTIAL → RELEASED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOrder {
    pub reservation: Reservation,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AllocateOrder (HOLD/PARTIAL/RELEASED → ALLOCATED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateOrder {
    /// New reservation; `None` when the order already holds one.
    pub reservation: Option<Reservation>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PickOrder (ALLOCATED → PICKED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickOrder {
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipOrder (PICKED → SHIPPED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipOrder {
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditOrder (customer / delivery details).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOrder {
    pub delivery: DeliveryDetails,
    pub client_reference: Option<String>,
    pub expected_version: ExpectedVersion,
    pub occurred_at: DateTime<Utc>,
}

/// Command: OverrideStatus (manual status change among the pre-pick statuses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideStatus {
    pub target: OrderStatus,
    /// Reservation made for this override (crossing into a reserved status).
    pub reserved: Option<Reservation>,
    /// Whether the held reservation was returned (crossing out of a reserved status).
    pub released: bool,
    pub expected_version: ExpectedVersion,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    Create(CreateOrder),
    Release(ReleaseOrder),
    Allocate(AllocateOrder),
    Pick(PickOrder),
    Ship(ShipOrder),
    Cancel(CancelOrder),
    Edit(EditOrder),
    OverrideStatus(OverrideStatus),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub order_number: String,
    pub client_id: ClientId,
    pub line: OrderLine,
    pub client_reference: Option<String>,
    pub delivery: DeliveryDetails,
    pub preferred_location: Option<LocationCode>,
    pub status: OrderStatus,
    pub reservation: Option<Reservation>,
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReleased {
    pub order_id: OrderId,
    pub reservation: Reservation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderAllocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAllocated {
    pub order_id: OrderId,
    pub reservation: Reservation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPicked {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub order_id: OrderId,
    pub consumed: Reservation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub released: Option<Reservation>,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEdited {
    pub order_id: OrderId,
    pub delivery: DeliveryDetails,
    pub client_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusOverridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOverridden {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub reserved: Option<Reservation>,
    pub released: Option<Reservation>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    OrderReleased(OrderReleased),
    OrderAllocated(OrderAllocated),
    OrderPicked(OrderPicked),
    OrderShipped(OrderShipped),
    OrderCancelled(OrderCancelled),
    OrderEdited(OrderEdited),
    StatusOverridden(StatusOverridden),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "orders.order.created",
            OrderEvent::OrderReleased(_) => "orders.order.released",
            OrderEvent::OrderAllocated(_) => "orders.order.allocated",
            OrderEvent::OrderPicked(_) => "orders.order.picked",
            OrderEvent::OrderShipped(_) => "orders.order.shipped",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            OrderEvent::OrderEdited(_) => "orders.order.edited",
            OrderEvent::StatusOverridden(_) => "orders.order.status_overridden",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::OrderReleased(e) => e.occurred_at,
            OrderEvent::OrderAllocated(e) => e.occurred_at,
            OrderEvent::OrderPicked(e) => e.occurred_at,
            OrderEvent::OrderShipped(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderEdited(e) => e.occurred_at,
            OrderEvent::StatusOverridden(e) => e.occurred_at,
        }
    }
}

impl Aggregate for OutboundOrder {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.client_id = Some(e.client_id);
                self.line = Some(e.line.clone());
                self.client_reference = e.client_reference.clone();
                self.delivery = e.delivery.clone();
                self.preferred_location = e.preferred_location.clone();
                self.status = e.status;
                self.reservation = e.reservation;
                self.sequence = e.sequence;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderReleased(e) => {
                self.status = OrderStatus::Released;
                self.reservation = Some(e.reservation);
            }
            OrderEvent::OrderAllocated(e) => {
                self.status = OrderStatus::Allocated;
                self.reservation = Some(e.reservation);
            }
            OrderEvent::OrderPicked(_) => {
                self.status = OrderStatus::Picked;
            }
            OrderEvent::OrderShipped(e) => {
                self.status = OrderStatus::Shipped;
                self.reservation = None;
                self.shipped_at = Some(e.occurred_at);
            }
            OrderEvent::OrderCancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.reservation = None;
                self.cancel_reason = Some(e.reason.clone());
            }
            OrderEvent::OrderEdited(e) => {
                self.delivery = e.delivery.clone();
                self.client_reference = e.client_reference.clone();
            }
            OrderEvent::StatusOverridden(e) => {
                self.status = e.to;
                if e.released.is_some() {
                    self.reservation = None;
                }
                if let Some(r) = e.reserved {
                    self.reservation = Some(r);
                }
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::Create(cmd) => self.handle_create(cmd),
            OrderCommand::Release(cmd) => self.handle_release(cmd),
            OrderCommand::Allocate(cmd) => self.handle_allocate(cmd),
            OrderCommand::Pick(cmd) => self.handle_pick(cmd),
            OrderCommand::Ship(cmd) => self.handle_ship(cmd),
            OrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
            OrderCommand::Edit(cmd) => self.handle_edit(cmd),
            OrderCommand::OverrideStatus(cmd) => self.handle_override(cmd),
        }
    }
}

impl OutboundOrder {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("order {}", self.id)));
        }
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::already_terminal(format!(
                "order {} is {}",
                self.order_number, self.status
            )));
        }
        Ok(())
    }

    fn ensure_status(&self, allowed: &[OrderStatus], action: &str) -> Result<(), DomainError> {
        self.ensure_not_terminal()?;
        if !allowed.contains(&self.status) {
            let expected = allowed
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(DomainError::conflict(format!(
                "cannot {action} order {} in status {} (requires {expected})",
                self.order_number, self.status
            )));
        }
        Ok(())
    }

    fn ensure_full_reservation(&self, reservation: &Reservation) -> Result<(), DomainError> {
        if reservation.qty != self.qty_ordered() {
            return Err(DomainError::invariant(format!(
                "reservation of {} does not cover ordered quantity {}",
                reservation.qty,
                self.qty_ordered()
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        let order_number = cmd.order_number.trim();
        if order_number.is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if order_number.len() > MAX_ORDER_NUMBER_LEN {
            return Err(DomainError::validation(format!(
                "order number longer than {MAX_ORDER_NUMBER_LEN} characters"
            )));
        }
        if cmd.qty_ordered <= 0 {
            return Err(DomainError::validation("quantity ordered must be positive"));
        }
        cmd.delivery.validate()?;

        let status = OrderStatus::initial_for(cmd.qty_ordered, cmd.qty_available);
        match (status, cmd.reservation) {
            (OrderStatus::Released, Some(r)) if r.qty == cmd.qty_ordered => {}
            (OrderStatus::Released, _) => {
                return Err(DomainError::invariant(
                    "released order must start with a reservation covering the ordered quantity",
                ));
            }
            (_, Some(_)) => {
                return Err(DomainError::invariant(format!(
                    "order starting in {status} cannot hold a reservation"
                )));
            }
            (_, None) => {}
        }

        Ok(vec![OrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            order_number: order_number.to_string(),
            client_id: cmd.client_id,
            line: OrderLine {
                sku: cmd.sku.clone(),
                qty_ordered: cmd.qty_ordered,
            },
            client_reference: cmd.client_reference.clone(),
            delivery: cmd.delivery.clone(),
            preferred_location: cmd.preferred_location.clone(),
            status,
            reservation: cmd.reservation,
            sequence: cmd.sequence,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_status(&[OrderStatus::Hold, OrderStatus::Partial], "release")?;
        if self.reservation.is_some() {
            return Err(DomainError::invariant("order already holds a reservation"));
        }
        self.ensure_full_reservation(&cmd.reservation)?;

        Ok(vec![OrderEvent::OrderReleased(OrderReleased {
            order_id: self.id,
            reservation: cmd.reservation,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_allocate(&self, cmd: &AllocateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_status(
            &[OrderStatus::Hold, OrderStatus::Partial, OrderStatus::Released],
            "allocate",
        )?;

        let reservation = match (self.reservation, cmd.reservation) {
            (Some(held), None) => held,
            (None, Some(new)) => new,
            (Some(_), Some(_)) => {
                return Err(DomainError::invariant("order already holds a reservation"));
            }
            (None, None) => {
                return Err(DomainError::invariant(
                    "allocation requires a reservation covering the ordered quantity",
                ));
            }
        };
        self.ensure_full_reservation(&reservation)?;

        Ok(vec![OrderEvent::OrderAllocated(OrderAllocated {
            order_id: self.id,
            reservation,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pick(&self, cmd: &PickOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_status(&[OrderStatus::Allocated], "pick")?;

        Ok(vec![OrderEvent::OrderPicked(OrderPicked {
            order_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_status(&[OrderStatus::Picked], "ship")?;

        let consumed = self.reservation.ok_or_else(|| {
            DomainError::invariant(format!(
                "picked order {} holds no reservation",
                self.order_number
            ))
        })?;
        self.ensure_full_reservation(&consumed)?;

        Ok(vec![OrderEvent::OrderShipped(OrderShipped {
            order_id: self.id,
            consumed,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_not_terminal()?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason cannot be empty"));
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            order_id: self.id,
            released: self.reservation,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit(&self, cmd: &EditOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_not_terminal()?;
        cmd.expected_version.check(self.version)?;
        cmd.delivery.validate()?;

        Ok(vec![OrderEvent::OrderEdited(OrderEdited {
            order_id: self.id,
            delivery: cmd.delivery.clone(),
            client_reference: cmd.client_reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_override(&self, cmd: &OverrideStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_not_terminal()?;
        cmd.expected_version.check(self.version)?;

        if !cmd.target.is_overridable() {
            return Err(DomainError::validation(format!(
                "status {} cannot be set by override",
                cmd.target
            )));
        }
        if !self.status.is_overridable() {
            return Err(DomainError::conflict(format!(
                "order {} in status {} cannot be overridden",
                self.order_number, self.status
            )));
        }
        if cmd.target == self.status {
            return Ok(vec![]);
        }

        let (reserved, released) = if cmd.target.holds_reservation() {
            match (self.reservation, cmd.reserved) {
                (Some(_), None) if !cmd.released => (None, None),
                (None, Some(new)) if !cmd.released => {
                    self.ensure_full_reservation(&new)?;
                    (Some(new), None)
                }
                _ => {
                    return Err(DomainError::invariant(format!(
                        "forcing {} requires exactly one reservation covering the order",
                        cmd.target
                    )));
                }
            }
        } else {
            if cmd.reserved.is_some() {
                return Err(DomainError::invariant(format!(
                    "status {} cannot hold a reservation",
                    cmd.target
                )));
            }
            match self.reservation {
                Some(held) if cmd.released => (None, Some(held)),
                Some(_) => {
                    return Err(DomainError::invariant(format!(
                        "release inventory before forcing {} to {}",
                        self.status, cmd.target
                    )));
                }
                None => (None, None),
            }
        };

        Ok(vec![OrderEvent::StatusOverridden(StatusOverridden {
            order_id: self.id,
            from: self.status,
            to: cmd.target,
            reserved,
            released,
            occurred_at: cmd.occurred_at,
        })])
    }
}
