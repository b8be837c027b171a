//! Airline admission and funding.
//!
//! Admission is direct while the consortium is small. Once the registered
//! count reaches the threshold, each call records one vote and the candidate
//! is admitted when distinct voters reach half the current consortium
//! (integer floor division, so 5 airlines still need 2 votes).

use crate::error::{AerosureError, AerosureResult};
use crate::events::{EventJournal, LedgerEvent};
use crate::ledger::Ledger;
use crate::runtime::AerosureConfig;
use crate::types::{Money, Principal};
use std::collections::HashMap;
use tracing::{info, warn};

/// Result of a `register_airline` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Candidate admitted, directly or by reaching the vote threshold.
    Admitted,
    /// Vote recorded, threshold not yet met.
    VoteRecorded { votes: usize, required: usize },
}

/// Admission voting state. Vote sets are explicit component state, cleared
/// when the candidate is admitted.
#[derive(Debug, Clone, Default)]
pub struct Governance {
    votes: HashMap<Principal, Vec<Principal>>,
}

impl Governance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a candidate airline, or record the caller's vote toward it.
    pub fn register_airline(
        &mut self,
        caller: &Principal,
        candidate: Principal,
        name: &str,
        ledger: &mut Ledger,
        journal: &mut EventJournal,
        config: &AerosureConfig,
    ) -> AerosureResult<AdmissionOutcome> {
        if candidate.is_zero() {
            return Err(AerosureError::InvalidArgument(
                "candidate principal is zero".to_string(),
            ));
        }
        if !ledger.is_registered_airline(caller) {
            return Err(AerosureError::Forbidden(
                "register airlines".to_string(),
            ));
        }
        if ledger.is_registered_airline(&candidate) {
            return Err(AerosureError::AlreadyExists(format!(
                "airline {candidate}"
            )));
        }

        let registered = ledger.registered_airline_count();
        if registered < config.registration_threshold {
            admit(candidate, name, ledger, journal)?;
            return Ok(AdmissionOutcome::Admitted);
        }

        let ballot = self.votes.entry(candidate.clone()).or_default();
        if ballot.contains(caller) {
            warn!(caller = %caller, candidate = %candidate, "duplicate admission vote");
            return Err(AerosureError::DuplicateVote);
        }
        ballot.push(caller.clone());

        let votes = ballot.len();
        let required = (registered as u64 * config.vote_percent / 100) as usize;
        if votes >= required {
            self.votes.remove(&candidate);
            admit(candidate, name, ledger, journal)?;
            return Ok(AdmissionOutcome::Admitted);
        }

        info!(candidate = %candidate, votes, required, "admission vote recorded");
        Ok(AdmissionOutcome::VoteRecorded { votes, required })
    }

    /// Distinct voters recorded so far for a pending candidate.
    pub fn votes_for(&self, candidate: &Principal) -> &[Principal] {
        self.votes
            .get(candidate)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Move funding value from a registered airline into the ledger.
    pub fn fund_airline(
        &mut self,
        caller: &Principal,
        value: Money,
        ledger: &mut Ledger,
        journal: &mut EventJournal,
        config: &AerosureConfig,
    ) -> AerosureResult<()> {
        if !ledger.is_registered_airline(caller) {
            return Err(AerosureError::Forbidden(
                "fund the consortium pool".to_string(),
            ));
        }
        if value < config.min_funding_fee {
            return Err(AerosureError::InsufficientFunds {
                required: config.min_funding_fee,
                provided: value,
            });
        }

        ledger.mark_funded(caller, value)?;
        journal.append(LedgerEvent::AirlineFunded {
            airline: caller.clone(),
            amount: value,
        })?;
        info!(airline = %caller, amount = value, "airline funded");
        Ok(())
    }
}

fn admit(
    candidate: Principal,
    name: &str,
    ledger: &mut Ledger,
    journal: &mut EventJournal,
) -> AerosureResult<()> {
    ledger.create_airline(candidate.clone(), name)?;
    journal.append(LedgerEvent::AirlineRegistered {
        airline: candidate.clone(),
        name: name.to_string(),
    })?;
    info!(airline = %candidate, name, "airline admitted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        governance: Governance,
        ledger: Ledger,
        journal: EventJournal,
        config: AerosureConfig,
    }

    /// Ledger seeded with `n` admitted airlines named airline-1..airline-n.
    fn fixture(n: usize) -> Fixture {
        let mut ledger = Ledger::new();
        for i in 1..=n {
            ledger
                .create_airline(Principal::new(format!("airline-{i}")), format!("Airline {i}"))
                .unwrap();
        }
        Fixture {
            governance: Governance::new(),
            ledger,
            journal: EventJournal::new(),
            config: AerosureConfig::default(),
        }
    }

    #[test]
    fn admission_is_direct_below_threshold() {
        let mut fx = fixture(3);
        let caller = Principal::new("airline-1");
        let outcome = fx
            .governance
            .register_airline(
                &caller,
                Principal::new("airline-4"),
                "Airline 4",
                &mut fx.ledger,
                &mut fx.journal,
                &fx.config,
            )
            .unwrap();

        assert_eq!(outcome, AdmissionOutcome::Admitted);
        assert_eq!(fx.ledger.registered_airline_count(), 4);
        assert_eq!(fx.journal.records().len(), 1);
    }

    #[test]
    fn admission_requires_votes_at_threshold() {
        let mut fx = fixture(4);
        let candidate = Principal::new("airline-5");

        let first = fx
            .governance
            .register_airline(
                &Principal::new("airline-1"),
                candidate.clone(),
                "Airline 5",
                &mut fx.ledger,
                &mut fx.journal,
                &fx.config,
            )
            .unwrap();
        assert_eq!(
            first,
            AdmissionOutcome::VoteRecorded {
                votes: 1,
                required: 2
            }
        );
        assert!(!fx.ledger.is_registered_airline(&candidate));
        assert_eq!(fx.governance.votes_for(&candidate).len(), 1);

        let second = fx
            .governance
            .register_airline(
                &Principal::new("airline-2"),
                candidate.clone(),
                "Airline 5",
                &mut fx.ledger,
                &mut fx.journal,
                &fx.config,
            )
            .unwrap();
        assert_eq!(second, AdmissionOutcome::Admitted);
        assert!(fx.ledger.is_registered_airline(&candidate));
        // Vote set finalized on admission.
        assert!(fx.governance.votes_for(&candidate).is_empty());
    }

    #[test]
    fn five_member_consortium_still_needs_two_votes() {
        let mut fx = fixture(5);
        let candidate = Principal::new("airline-6");

        let first = fx
            .governance
            .register_airline(
                &Principal::new("airline-1"),
                candidate.clone(),
                "Airline 6",
                &mut fx.ledger,
                &mut fx.journal,
                &fx.config,
            )
            .unwrap();
        // floor(5 * 50 / 100) = 2
        assert_eq!(
            first,
            AdmissionOutcome::VoteRecorded {
                votes: 1,
                required: 2
            }
        );
    }

    #[test]
    fn duplicate_vote_is_rejected_and_not_counted() {
        let mut fx = fixture(4);
        let caller = Principal::new("airline-1");
        let candidate = Principal::new("airline-5");

        fx.governance
            .register_airline(
                &caller,
                candidate.clone(),
                "Airline 5",
                &mut fx.ledger,
                &mut fx.journal,
                &fx.config,
            )
            .unwrap();
        let dup = fx.governance.register_airline(
            &caller,
            candidate.clone(),
            "Airline 5",
            &mut fx.ledger,
            &mut fx.journal,
            &fx.config,
        );

        assert!(matches!(dup, Err(AerosureError::DuplicateVote)));
        assert_eq!(fx.governance.votes_for(&candidate).len(), 1);
    }

    #[test]
    fn only_registered_airlines_may_nominate() {
        let mut fx = fixture(2);
        let outsider = Principal::new("outsider");
        let result = fx.governance.register_airline(
            &outsider,
            Principal::new("airline-3"),
            "Airline 3",
            &mut fx.ledger,
            &mut fx.journal,
            &fx.config,
        );
        assert!(matches!(result, Err(AerosureError::Forbidden(_))));
    }

    #[test]
    fn zero_candidate_is_invalid() {
        let mut fx = fixture(1);
        let result = fx.governance.register_airline(
            &Principal::new("airline-1"),
            Principal::new("0x0"),
            "Nobody",
            &mut fx.ledger,
            &mut fx.journal,
            &fx.config,
        );
        assert!(matches!(result, Err(AerosureError::InvalidArgument(_))));
    }

    #[test]
    fn registered_candidate_is_rejected() {
        let mut fx = fixture(2);
        let result = fx.governance.register_airline(
            &Principal::new("airline-1"),
            Principal::new("airline-2"),
            "Airline 2",
            &mut fx.ledger,
            &mut fx.journal,
            &fx.config,
        );
        assert!(matches!(result, Err(AerosureError::AlreadyExists(_))));
    }

    #[test]
    fn funding_below_minimum_changes_nothing() {
        let mut fx = fixture(1);
        let caller = Principal::new("airline-1");
        let short = fx.config.min_funding_fee - 1;

        let result =
            fx.governance
                .fund_airline(&caller, short, &mut fx.ledger, &mut fx.journal, &fx.config);

        assert!(matches!(
            result,
            Err(AerosureError::InsufficientFunds { .. })
        ));
        assert_eq!(fx.ledger.airline(&caller).unwrap().balance, 0);
        assert!(!fx.ledger.airline(&caller).unwrap().is_funded);
        assert_eq!(fx.ledger.total_balance(), 0);
        assert!(fx.journal.is_empty());
    }

    #[test]
    fn funding_at_minimum_credits_airline_and_pool() {
        let mut fx = fixture(1);
        let caller = Principal::new("airline-1");
        let fee = fx.config.min_funding_fee;

        fx.governance
            .fund_airline(&caller, fee, &mut fx.ledger, &mut fx.journal, &fx.config)
            .unwrap();

        let airline = fx.ledger.airline(&caller).unwrap();
        assert!(airline.is_funded);
        assert_eq!(airline.balance, fee);
        assert_eq!(fx.ledger.total_balance(), fee);
        assert_eq!(fx.journal.records()[0].event.kind(), "airline_funded");
    }

    #[test]
    fn outsiders_cannot_fund() {
        let mut fx = fixture(1);
        let result = fx.governance.fund_airline(
            &Principal::new("outsider"),
            fx.config.min_funding_fee,
            &mut fx.ledger,
            &mut fx.journal,
            &fx.config,
        );
        assert!(matches!(result, Err(AerosureError::Forbidden(_))));
    }
}
