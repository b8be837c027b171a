//! Aerosure engine: configuration, transaction boundary, public surface.
//!
//! Every public operation is serialized through one lock and applied to a
//! snapshot of the core state; the snapshot replaces the live state only on
//! success. A rejected call therefore leaves no partial writes anywhere,
//! journal included, which is the whole concurrency story: one logical
//! transaction at a time.

use crate::connectors::ValueConduit;
use crate::entropy::EntropySource;
use crate::error::{AerosureError, AerosureResult};
use crate::events::{EventJournal, EventRecord, LedgerEvent};
use crate::gate::AccessGate;
use crate::governance::{AdmissionOutcome, Governance};
use crate::ledger::Ledger;
use crate::oracle::{OracleConsensus, ResponseOutcome};
use crate::types::{
    AirlineRecord, FlightKey, FlightRecord, FlightStatus, Money, PolicyKey, PolicyRecord,
    Principal, RequestKey,
};
use crate::underwriting::Underwriting;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Protocol constants, fixed at engine construction.
#[derive(Debug, Clone)]
pub struct AerosureConfig {
    /// Consortium size at which admission switches from direct to voted.
    pub registration_threshold: u32,
    /// Percentage of the consortium whose votes admit a candidate.
    pub vote_percent: u64,
    /// Minimum airline funding fee, minor units.
    pub min_funding_fee: Money,
    /// Maximum per-policy premium, minor units.
    pub max_premium: Money,
    /// Oracle registration fee, minor units.
    pub oracle_fee: Money,
    /// Distinct matching reports required to accept a status.
    pub oracle_quorum: usize,
    /// Indices assigned to each oracle.
    pub indices_per_oracle: usize,
    /// Reporter indices are drawn from [0, index_range).
    pub index_range: u8,
    /// Bound on the distinct-index rejection loop.
    pub max_index_draw_attempts: usize,
}

impl Default for AerosureConfig {
    fn default() -> Self {
        Self {
            registration_threshold: 4,
            vote_percent: 50,
            // 10,000.00 in cents.
            min_funding_fee: 1_000_000,
            // 1,000.00 in cents.
            max_premium: 100_000,
            // 1,000.00 in cents.
            oracle_fee: 100_000,
            oracle_quorum: 3,
            indices_per_oracle: 3,
            index_range: 10,
            max_index_draw_attempts: 64,
        }
    }
}

/// Whole-core state moved as one unit through the transaction boundary.
#[derive(Debug, Clone)]
struct CoreState {
    gate: AccessGate,
    ledger: Ledger,
    governance: Governance,
    underwriting: Underwriting,
    oracle: OracleConsensus,
    journal: EventJournal,
}

/// The Aerosure engine: one serialized, all-or-nothing operation at a time.
pub struct AerosureEngine {
    state: Mutex<CoreState>,
    entropy: Mutex<Box<dyn EntropySource + Send>>,
    conduit: Arc<dyn ValueConduit + Send + Sync>,
    config: AerosureConfig,
}

impl AerosureEngine {
    /// Bootstrap the engine with its gate owner and founding airline.
    ///
    /// Admission requires a registered caller, so the consortium cannot
    /// admit its first member; the founding airline is created here through
    /// the same ledger primitive as every later admission.
    pub fn bootstrap(
        config: AerosureConfig,
        owner: Principal,
        founding_airline: Principal,
        founding_name: &str,
        entropy: Box<dyn EntropySource + Send>,
        conduit: Arc<dyn ValueConduit + Send + Sync>,
    ) -> AerosureResult<Self> {
        if owner.is_zero() {
            return Err(AerosureError::InvalidArgument(
                "owner principal is zero".to_string(),
            ));
        }
        if founding_airline.is_zero() {
            return Err(AerosureError::InvalidArgument(
                "founding airline principal is zero".to_string(),
            ));
        }

        let mut ledger = Ledger::new();
        let mut journal = EventJournal::new();
        ledger.create_airline(founding_airline.clone(), founding_name)?;
        journal.append(LedgerEvent::AirlineRegistered {
            airline: founding_airline.clone(),
            name: founding_name.to_string(),
        })?;
        info!(owner = %owner, founding = %founding_airline, "engine bootstrapped");

        Ok(Self {
            state: Mutex::new(CoreState {
                gate: AccessGate::new(owner),
                ledger,
                governance: Governance::new(),
                underwriting: Underwriting,
                oracle: OracleConsensus::new(),
                journal,
            }),
            entropy: Mutex::new(entropy),
            conduit,
            config,
        })
    }

    pub fn config(&self) -> &AerosureConfig {
        &self.config
    }

    // ---- gate surface ----

    pub fn is_operational(&self, caller: &Principal) -> AerosureResult<bool> {
        self.read(|state| state.gate.is_operational(caller))?
    }

    pub fn set_operating(&self, caller: &Principal, mode: bool) -> AerosureResult<()> {
        self.mutate(|state, _, _| state.gate.set_operating(caller, mode))
    }

    pub fn authorize_caller(
        &self,
        caller: &Principal,
        principal: Principal,
    ) -> AerosureResult<()> {
        self.mutate(|state, _, _| state.gate.authorize(caller, principal))
    }

    pub fn deauthorize_caller(
        &self,
        caller: &Principal,
        principal: &Principal,
    ) -> AerosureResult<()> {
        self.mutate(|state, _, _| state.gate.deauthorize(caller, principal))
    }

    // ---- governance surface ----

    pub fn register_airline(
        &self,
        caller: &Principal,
        candidate: Principal,
        name: &str,
    ) -> AerosureResult<AdmissionOutcome> {
        self.mutate(|state, _, config| {
            state.gate.ensure_operational()?;
            let CoreState {
                governance,
                ledger,
                journal,
                ..
            } = state;
            governance.register_airline(caller, candidate, name, ledger, journal, config)
        })
    }

    pub fn fund_airline(&self, caller: &Principal, value: Money) -> AerosureResult<()> {
        self.mutate(|state, _, config| {
            state.gate.ensure_operational()?;
            let CoreState {
                governance,
                ledger,
                journal,
                ..
            } = state;
            governance.fund_airline(caller, value, ledger, journal, config)
        })
    }

    // ---- underwriting surface ----

    pub fn register_flight(
        &self,
        caller: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
    ) -> AerosureResult<FlightKey> {
        self.mutate(|state, _, _| {
            state.gate.ensure_operational()?;
            let CoreState {
                underwriting,
                ledger,
                journal,
                ..
            } = state;
            underwriting.register_flight(caller, number, scheduled_at, ledger, journal)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn buy_insurance(
        &self,
        caller: &Principal,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        value: Money,
    ) -> AerosureResult<PolicyKey> {
        self.mutate(|state, _, config| {
            state.gate.ensure_operational()?;
            let CoreState {
                underwriting,
                ledger,
                journal,
                ..
            } = state;
            underwriting.buy_insurance(
                caller,
                airline,
                number,
                scheduled_at,
                value,
                ledger,
                journal,
                config,
            )
        })
    }

    pub fn withdraw_payout(
        &self,
        caller: &Principal,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
    ) -> AerosureResult<Money> {
        let conduit = Arc::clone(&self.conduit);
        self.mutate(move |state, _, _| {
            state.gate.ensure_operational()?;
            let CoreState {
                underwriting,
                ledger,
                ..
            } = state;
            underwriting.withdraw_payout(
                caller,
                airline,
                number,
                scheduled_at,
                ledger,
                conduit.as_ref(),
            )
        })
    }

    // ---- oracle surface ----

    pub fn register_oracle(&self, caller: &Principal, value: Money) -> AerosureResult<Vec<u8>> {
        self.mutate(|state, entropy, config| {
            state.gate.ensure_operational()?;
            let CoreState { oracle, ledger, .. } = state;
            oracle.register_oracle(caller, value, ledger, entropy, config)
        })
    }

    pub fn fetch_flight_status(
        &self,
        caller: &Principal,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
    ) -> AerosureResult<(u8, RequestKey)> {
        self.mutate(|state, entropy, config| {
            state.gate.ensure_operational()?;
            let CoreState {
                oracle,
                ledger,
                journal,
                ..
            } = state;
            oracle.fetch_flight_status(
                caller,
                airline,
                number,
                scheduled_at,
                ledger,
                entropy,
                journal,
                config,
            )
        })
    }

    /// Record an oracle response; on the quorum-completing response the
    /// settlement path runs inside the same transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_oracle_response(
        &self,
        caller: &Principal,
        index: u8,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        status: FlightStatus,
    ) -> AerosureResult<ResponseOutcome> {
        self.mutate(|state, _, config| {
            state.gate.ensure_operational()?;
            let CoreState {
                oracle,
                underwriting,
                ledger,
                journal,
                ..
            } = state;
            let outcome = oracle.submit_response(
                caller,
                index,
                airline,
                number,
                scheduled_at,
                status,
                journal,
                config,
            )?;
            if let ResponseOutcome::QuorumReached { status } = &outcome {
                underwriting.process_flight_status(
                    airline,
                    number,
                    scheduled_at,
                    *status,
                    ledger,
                    journal,
                )?;
            }
            Ok(outcome)
        })
    }

    // ---- query surface ----

    pub fn owner(&self) -> AerosureResult<Principal> {
        self.read(|state| state.gate.owner().clone())
    }

    pub fn airline(&self, principal: &Principal) -> AerosureResult<Option<AirlineRecord>> {
        self.read(|state| state.ledger.airline(principal).cloned())
    }

    pub fn flight(
        &self,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
    ) -> AerosureResult<Option<FlightRecord>> {
        let key = FlightKey::derive(airline, number, scheduled_at);
        self.read(|state| state.ledger.flight(&key).cloned())
    }

    pub fn flight_by_key(&self, key: &FlightKey) -> AerosureResult<Option<FlightRecord>> {
        self.read(|state| state.ledger.flight(key).cloned())
    }

    /// Derived key for a flight tuple, for callers that track flights by key.
    pub fn flight_key(
        &self,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
    ) -> FlightKey {
        FlightKey::derive(airline, number, scheduled_at)
    }

    pub fn policy_by_key(&self, key: &PolicyKey) -> AerosureResult<Option<PolicyRecord>> {
        self.read(|state| state.ledger.policy(key).cloned())
    }

    pub fn policy(
        &self,
        client: &Principal,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
    ) -> AerosureResult<Option<PolicyRecord>> {
        let flight_key = FlightKey::derive(airline, number, scheduled_at);
        let policy_key = PolicyKey::derive(client, &flight_key);
        self.read(|state| state.ledger.policy(&policy_key).cloned())
    }

    pub fn registered_flights(&self) -> AerosureResult<Vec<FlightKey>> {
        self.read(|state| state.ledger.flight_keys().to_vec())
    }

    pub fn policies_for_flight(&self, key: &FlightKey) -> AerosureResult<Vec<PolicyKey>> {
        self.read(|state| state.ledger.policies_for_flight(key).to_vec())
    }

    pub fn votes_for(&self, candidate: &Principal) -> AerosureResult<Vec<Principal>> {
        self.read(|state| state.governance.votes_for(candidate).to_vec())
    }

    pub fn oracle_indices(&self, caller: &Principal) -> AerosureResult<Vec<u8>> {
        self.read(|state| {
            state
                .oracle
                .registration(caller)
                .map(|r| r.indices().to_vec())
        })?
    }

    pub fn total_balance(&self) -> AerosureResult<Money> {
        self.read(|state| state.ledger.total_balance())
    }

    pub fn events(&self) -> AerosureResult<Vec<EventRecord>> {
        self.read(|state| state.journal.records().to_vec())
    }

    pub fn verify_journal(&self) -> AerosureResult<bool> {
        self.read(|state| state.journal.verify_chain())
    }

    // ---- transaction boundary ----

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut CoreState, &mut dyn EntropySource, &AerosureConfig) -> AerosureResult<T>,
    ) -> AerosureResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AerosureError::Internal("state lock poisoned".to_string()))?;
        let mut entropy = self
            .entropy
            .lock()
            .map_err(|_| AerosureError::Internal("entropy lock poisoned".to_string()))?;

        let mut tx = state.clone();
        let result = op(&mut tx, entropy.as_mut(), &self.config);
        if result.is_ok() {
            *state = tx;
        }
        result
    }

    fn read<T>(&self, f: impl FnOnce(&CoreState) -> T) -> AerosureResult<T> {
        let state = self
            .state
            .lock()
            .map_err(|_| AerosureError::Internal("state lock poisoned".to_string()))?;
        Ok(f(&state))
    }
}
