//! Aerosure core: a consortium-governed flight-delay insurance ledger.
//!
//! This crate owns the whole decision surface: airline admission with a
//! voting threshold, flight and policy underwriting with funding
//! invariants, and quorum-gated oracle status resolution. The host
//! execution platform contributes only caller identities and value
//! custody; every operation here is serialized and all-or-nothing.

#![deny(unsafe_code)]

pub mod connectors;
pub mod entropy;
pub mod error;
pub mod events;
pub mod gate;
pub mod governance;
pub mod ledger;
pub mod oracle;
pub mod runtime;
pub mod types;
pub mod underwriting;

pub use connectors::{ConduitReceipt, ValueConduit};
pub use entropy::{EntropySource, HashEntropy, SeededEntropy};
pub use error::{AerosureError, AerosureResult};
pub use events::{EventJournal, EventRecord, LedgerEvent};
pub use gate::AccessGate;
pub use governance::{AdmissionOutcome, Governance};
pub use ledger::{Ledger, PAYOUT_DENOMINATOR};
pub use oracle::{OracleConsensus, OracleRegistration, ResponseOutcome, StatusRequest};
pub use runtime::{AerosureConfig, AerosureEngine};
pub use types::{
    AirlineRecord, FlightKey, FlightRecord, FlightStatus, Money, PolicyKey, PolicyRecord,
    Principal, RequestKey,
};
pub use underwriting::Underwriting;
