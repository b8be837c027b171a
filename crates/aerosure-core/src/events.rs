//! Append-only event journal for off-chain observers.
//!
//! Every accepted state transition lands here as a hash-chained record, so
//! an observer replaying the journal can detect any tampering with history.

use crate::error::{AerosureError, AerosureResult};
use crate::types::{FlightKey, FlightStatus, Money, PolicyKey, Principal, RequestKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain events emitted by the core, append-only, no acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    AirlineRegistered {
        airline: Principal,
        name: String,
    },
    AirlineFunded {
        airline: Principal,
        amount: Money,
    },
    FlightRegistered {
        airline: Principal,
        flight: String,
        scheduled_at: DateTime<Utc>,
        key: FlightKey,
    },
    InsuranceBuyed {
        client: Principal,
        airline: Principal,
        flight: String,
        premium: Money,
        key: PolicyKey,
    },
    OracleRequest {
        index: u8,
        airline: Principal,
        flight: String,
        scheduled_at: DateTime<Utc>,
        key: RequestKey,
    },
    OracleReport {
        airline: Principal,
        flight: String,
        scheduled_at: DateTime<Utc>,
        status: FlightStatus,
    },
    FlightStatusInfo {
        airline: Principal,
        flight: String,
        scheduled_at: DateTime<Utc>,
        status: FlightStatus,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::AirlineRegistered { .. } => "airline_registered",
            LedgerEvent::AirlineFunded { .. } => "airline_funded",
            LedgerEvent::FlightRegistered { .. } => "flight_registered",
            LedgerEvent::InsuranceBuyed { .. } => "insurance_buyed",
            LedgerEvent::OracleRequest { .. } => "oracle_request",
            LedgerEvent::OracleReport { .. } => "oracle_report",
            LedgerEvent::FlightStatusInfo { .. } => "flight_status_info",
        }
    }
}

/// Hash-chained journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub record_id: String,
    pub index: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: LedgerEvent,
    pub previous_hash: Option<String>,
    pub record_hash: String,
}

/// Append-only event journal with hash-chain proofs.
///
/// No in-place mutation APIs are exposed; a rejected operation rolls the
/// whole journal back with the rest of the transaction, so committed entries
/// only ever describe accepted transitions.
#[derive(Debug, Default, Clone)]
pub struct EventJournal {
    records: Vec<EventRecord>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append an event, chaining its hash to the previous record.
    pub fn append(&mut self, event: LedgerEvent) -> AerosureResult<&EventRecord> {
        let index = self.records.len() as u64;
        let recorded_at = Utc::now();
        let previous_hash = self.records.last().map(|r| r.record_hash.clone());
        let record_hash =
            compute_record_hash(index, recorded_at, &event, previous_hash.as_deref())?;

        self.records.push(EventRecord {
            record_id: Uuid::new_v4().to_string(),
            index,
            recorded_at,
            event,
            previous_hash,
            record_hash,
        });

        self.records
            .last()
            .ok_or_else(|| AerosureError::Internal("journal append lost its record".to_string()))
    }

    /// Verify the whole chain against recomputed hashes.
    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for record in &self.records {
            let expected = match compute_record_hash(
                record.index,
                record.recorded_at,
                &record.event,
                previous_hash.as_deref(),
            ) {
                Ok(hash) => hash,
                Err(_) => return false,
            };
            if record.record_hash != expected || record.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(record.record_hash.clone());
        }
        true
    }
}

fn compute_record_hash(
    index: u64,
    recorded_at: DateTime<Utc>,
    event: &LedgerEvent,
    previous_hash: Option<&str>,
) -> AerosureResult<String> {
    let material = serde_json::json!({
        "index": index,
        "recorded_at": recorded_at,
        "event": event,
        "previous_hash": previous_hash,
    });
    let bytes = serde_json::to_vec(&material)
        .map_err(|e| AerosureError::Internal(format!("journal serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
