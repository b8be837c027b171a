//! Oracle status-resolution protocol.
//!
//! Verification work is spread pseudo-randomly: each registered oracle holds
//! three distinct indices, and a status request is addressed to one index at
//! a time. A status is accepted only once three independent reporters agree
//! on the same code, at which point the request closes for good.

use crate::entropy::EntropySource;
use crate::error::{AerosureError, AerosureResult};
use crate::events::{EventJournal, LedgerEvent};
use crate::ledger::Ledger;
use crate::runtime::AerosureConfig;
use crate::types::{FlightKey, FlightStatus, Money, Principal, RequestKey};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// A registered oracle's assigned reporter indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRegistration {
    indices: Vec<u8>,
}

impl OracleRegistration {
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn is_assigned(&self, index: u8) -> bool {
        self.indices.contains(&index)
    }
}

/// Open or closed verification request for one (index, flight tuple) pair.
#[derive(Debug, Clone)]
pub struct StatusRequest {
    pub requester: Principal,
    pub airline: Principal,
    pub number: String,
    pub scheduled_at: DateTime<Utc>,
    pub is_open: bool,
    /// Reporter identities per status code, in arrival order.
    pub responses: BTreeMap<u8, Vec<Principal>>,
}

/// Result of a `submit_response` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Response recorded; quorum not yet reached for its bucket.
    Accepted { responses: usize },
    /// This response completed the quorum; the request is now closed and
    /// the status must be settled.
    QuorumReached { status: FlightStatus },
}

/// Oracle registry and request book.
#[derive(Debug, Clone, Default)]
pub struct OracleConsensus {
    oracles: HashMap<Principal, OracleRegistration>,
    requests: HashMap<RequestKey, StatusRequest>,
}

impl OracleConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the caller as an oracle, assigning three distinct indices
    /// via rejection sampling over the entropy source.
    pub fn register_oracle(
        &mut self,
        caller: &Principal,
        value: Money,
        ledger: &mut Ledger,
        entropy: &mut dyn EntropySource,
        config: &AerosureConfig,
    ) -> AerosureResult<Vec<u8>> {
        if self.oracles.contains_key(caller) {
            return Err(AerosureError::AlreadyExists(format!(
                "oracle registration for {caller}"
            )));
        }
        if value < config.oracle_fee {
            return Err(AerosureError::InsufficientFunds {
                required: config.oracle_fee,
                provided: value,
            });
        }

        let mut indices: Vec<u8> = Vec::with_capacity(config.indices_per_oracle);
        let mut attempts = 0usize;
        while indices.len() < config.indices_per_oracle {
            attempts += 1;
            if attempts > config.max_index_draw_attempts {
                return Err(AerosureError::Internal(
                    "entropy source failed to produce distinct indices".to_string(),
                ));
            }
            let drawn = entropy.draw(caller, config.index_range);
            if !indices.contains(&drawn) {
                indices.push(drawn);
            }
        }

        ledger.deposit_fee(value)?;
        self.oracles.insert(
            caller.clone(),
            OracleRegistration {
                indices: indices.clone(),
            },
        );
        info!(oracle = %caller, ?indices, "oracle registered");
        Ok(indices)
    }

    /// The caller's own assignment.
    pub fn registration(&self, caller: &Principal) -> AerosureResult<&OracleRegistration> {
        self.oracles
            .get(caller)
            .ok_or_else(|| AerosureError::NotFound(format!("oracle registration for {caller}")))
    }

    pub fn request(&self, key: &RequestKey) -> Option<&StatusRequest> {
        self.requests.get(key)
    }

    /// Open a verification request for a registered flight, addressed to a
    /// pseudo-random reporter index. Re-fetching the same tuple under the
    /// same index resets the request.
    pub fn fetch_flight_status(
        &mut self,
        caller: &Principal,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        ledger: &Ledger,
        entropy: &mut dyn EntropySource,
        journal: &mut EventJournal,
        config: &AerosureConfig,
    ) -> AerosureResult<(u8, RequestKey)> {
        let flight_key = FlightKey::derive(airline, number, scheduled_at);
        if ledger.flight(&flight_key).is_none() {
            return Err(AerosureError::NotFound(flight_key.to_string()));
        }

        let index = entropy.draw(caller, config.index_range);
        let key = RequestKey::derive(index, airline, number, scheduled_at);
        self.requests.insert(
            key.clone(),
            StatusRequest {
                requester: caller.clone(),
                airline: airline.clone(),
                number: number.to_string(),
                scheduled_at,
                is_open: true,
                responses: BTreeMap::new(),
            },
        );

        journal.append(LedgerEvent::OracleRequest {
            index,
            airline: airline.clone(),
            flight: number.to_string(),
            scheduled_at,
            key: key.clone(),
        })?;
        info!(requester = %caller, flight = number, index, "status request opened");
        Ok((index, key))
    }

    /// Record one oracle's observation. Closes the request and reports
    /// `QuorumReached` when the bucket hits the response quorum.
    ///
    /// A reporter may contribute to different status-code buckets of the
    /// same request; only a repeat within one bucket is rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_response(
        &mut self,
        caller: &Principal,
        index: u8,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        status: FlightStatus,
        journal: &mut EventJournal,
        config: &AerosureConfig,
    ) -> AerosureResult<ResponseOutcome> {
        if !status.is_terminal() {
            return Err(AerosureError::InvalidArgument(
                "unknown status is not reportable".to_string(),
            ));
        }
        let registration = self
            .oracles
            .get(caller)
            .ok_or_else(|| AerosureError::Forbidden("submit oracle responses".to_string()))?;
        if !registration.is_assigned(index) {
            return Err(AerosureError::StaleOrUnknownRequest(format!(
                "index {index} is not assigned to this oracle"
            )));
        }

        let key = RequestKey::derive(index, airline, number, scheduled_at);
        let request = self.requests.get_mut(&key).ok_or_else(|| {
            AerosureError::StaleOrUnknownRequest("no request for this flight tuple".to_string())
        })?;
        if !request.is_open {
            return Err(AerosureError::StaleOrUnknownRequest(
                "request already closed".to_string(),
            ));
        }

        let bucket = request.responses.entry(status.code()).or_default();
        if bucket.contains(caller) {
            warn!(oracle = %caller, flight = number, %status, "repeat report in one bucket");
            return Err(AerosureError::DuplicateVote);
        }
        bucket.push(caller.clone());
        let responses = bucket.len();

        journal.append(LedgerEvent::OracleReport {
            airline: airline.clone(),
            flight: number.to_string(),
            scheduled_at,
            status,
        })?;
        info!(oracle = %caller, flight = number, %status, responses, "oracle report recorded");

        if responses >= config.oracle_quorum {
            request.is_open = false;
            info!(flight = number, %status, "response quorum reached, request closed");
            return Ok(ResponseOutcome::QuorumReached { status });
        }
        Ok(ResponseOutcome::Accepted { responses })
    }
}
