//! Inbound receiving domain module (advance shipping notices).
//!
//! Registers expected shipments and tracks per-line putaway outcomes. The
//! actual stock increase is performed by the inventory ledger; this aggregate
//! records which line landed in which record.

pub mod asn;

pub use asn::{
    Asn, AsnCommand, AsnCompleted, AsnCreated, AsnDeleted, AsnEvent, AsnHeld, AsnId, AsnLine,
    AsnReleased, AsnStatus, CompleteAsn, CreateAsn, DeleteAsn, HoldAsn, LineReceived,
    LineRejected, NewAsnLine, ReceiveLine, ReceivingStarted, RejectLine, ReleaseAsn,
    StartReceiving,
};
