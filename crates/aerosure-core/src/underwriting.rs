//! Flight registration, policy purchase, settlement, and payout release.

use crate::connectors::ValueConduit;
use crate::error::{AerosureError, AerosureResult};
use crate::events::{EventJournal, LedgerEvent};
use crate::ledger::{Ledger, PAYOUT_DENOMINATOR};
use crate::runtime::AerosureConfig;
use crate::types::{
    FlightKey, FlightRecord, FlightStatus, Money, PolicyKey, PolicyRecord, Principal,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Settlement starts at half the premium and backs off to what the airline
/// can afford.
const PAYOUT_NUMERATOR_START: u64 = 5;

/// Underwriting operations. All state lives in the ledger; this component
/// holds the policy rules around it.
#[derive(Debug, Clone, Default)]
pub struct Underwriting;

impl Underwriting {
    /// Register a flight under the calling airline.
    pub fn register_flight(
        &self,
        caller: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        ledger: &mut Ledger,
        journal: &mut EventJournal,
    ) -> AerosureResult<FlightKey> {
        if !ledger.is_registered_airline(caller) {
            return Err(AerosureError::Forbidden("register flights".to_string()));
        }
        if number.trim().is_empty() {
            return Err(AerosureError::InvalidArgument(
                "flight number is empty".to_string(),
            ));
        }

        let key = FlightKey::derive(caller, number, scheduled_at);
        ledger.create_flight(
            key.clone(),
            FlightRecord {
                airline: caller.clone(),
                number: number.to_string(),
                is_registered: true,
                status: FlightStatus::Unknown,
                scheduled_at,
                updated_at: scheduled_at,
                policies: Vec::new(),
            },
        )?;

        journal.append(LedgerEvent::FlightRegistered {
            airline: caller.clone(),
            flight: number.to_string(),
            scheduled_at,
            key: key.clone(),
        })?;
        info!(airline = %caller, flight = number, "flight registered");
        Ok(key)
    }

    /// Buy a policy on a registered flight. The premium immediately becomes
    /// part of the underwriting airline's operating balance.
    pub fn buy_insurance(
        &self,
        caller: &Principal,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        value: Money,
        ledger: &mut Ledger,
        journal: &mut EventJournal,
        config: &AerosureConfig,
    ) -> AerosureResult<PolicyKey> {
        if value == 0 {
            return Err(AerosureError::InvalidArgument(
                "premium must be positive".to_string(),
            ));
        }
        if value > config.max_premium {
            return Err(AerosureError::ExceedsLimit {
                limit: config.max_premium,
                provided: value,
            });
        }

        let flight_key = FlightKey::derive(airline, number, scheduled_at);
        let underwriter = ledger
            .flight(&flight_key)
            .ok_or_else(|| AerosureError::NotFound(flight_key.to_string()))?
            .airline
            .clone();

        let policy_key = PolicyKey::derive(caller, &flight_key);
        ledger.create_policy(
            policy_key.clone(),
            PolicyRecord {
                client: caller.clone(),
                flight: flight_key.clone(),
                value,
                balance: 0,
                is_paid: false,
            },
        )?;
        ledger.receive_premium(&underwriter, value)?;

        journal.append(LedgerEvent::InsuranceBuyed {
            client: caller.clone(),
            airline: underwriter,
            flight: number.to_string(),
            premium: value,
            key: policy_key.clone(),
        })?;
        info!(client = %caller, flight = number, premium = value, "policy purchased");
        Ok(policy_key)
    }

    /// Settlement path, invoked only by oracle consensus once a status
    /// reaches quorum. Writes the terminal status exactly once; a flight
    /// that already settled is left untouched.
    pub fn process_flight_status(
        &self,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        status: FlightStatus,
        ledger: &mut Ledger,
        journal: &mut EventJournal,
    ) -> AerosureResult<()> {
        let key = FlightKey::derive(airline, number, scheduled_at);
        let flight = ledger
            .flight(&key)
            .ok_or_else(|| AerosureError::NotFound(key.to_string()))?;
        if flight.status.is_terminal() {
            debug!(flight = number, "flight already settled, status unchanged");
            return Ok(());
        }
        let underwriter = flight.airline.clone();

        if status == FlightStatus::LateAirline {
            let pool_total = ledger.paid_pool_total(&key);
            let available = ledger
                .airline(&underwriter)
                .map(|a| a.balance)
                .unwrap_or(0);
            let numerator = payout_numerator(pool_total, available);
            let credited = ledger.credit_insurees(&key, numerator)?;
            info!(
                flight = number,
                numerator, credited, "late-airline settlement credited"
            );
        }

        ledger.set_flight_status(&key, status, Utc::now())?;
        journal.append(LedgerEvent::FlightStatusInfo {
            airline: airline.clone(),
            flight: number.to_string(),
            scheduled_at,
            status,
        })?;
        Ok(())
    }

    /// Release a client's credited payout through the value conduit.
    pub fn withdraw_payout(
        &self,
        caller: &Principal,
        airline: &Principal,
        number: &str,
        scheduled_at: DateTime<Utc>,
        ledger: &mut Ledger,
        conduit: &dyn ValueConduit,
    ) -> AerosureResult<Money> {
        let flight_key = FlightKey::derive(airline, number, scheduled_at);
        let policy_key = PolicyKey::derive(caller, &flight_key);
        let policy = ledger
            .policy(&policy_key)
            .ok_or_else(|| AerosureError::NotFound(policy_key.to_string()))?;
        if policy.balance == 0 {
            return Err(AerosureError::NotFound(format!(
                "credited payout for {policy_key}"
            )));
        }

        let amount = ledger.release_payout(&policy_key)?;
        let receipt = conduit.release(caller, amount)?;
        info!(
            client = %caller,
            amount,
            transfer_id = %receipt.transfer_id,
            "payout released"
        );
        Ok(amount)
    }
}

/// Largest numerator m in [0, 5] such that the airline balance covers
/// `pool_total * m / 10`.
fn payout_numerator(pool_total: Money, airline_balance: Money) -> u64 {
    let mut numerator = PAYOUT_NUMERATOR_START;
    while numerator > 0
        && (airline_balance as u128)
            < pool_total as u128 * numerator as u128 / PAYOUT_DENOMINATOR as u128
    {
        numerator -= 1;
    }
    numerator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::ConduitReceipt;
    use chrono::TimeZone;
    use std::cell::RefCell;

    struct RecordingConduit {
        released: RefCell<Vec<(Principal, Money)>>,
    }

    impl RecordingConduit {
        fn new() -> Self {
            Self {
                released: RefCell::new(Vec::new()),
            }
        }
    }

    impl ValueConduit for RecordingConduit {
        fn release(&self, to: &Principal, amount: Money) -> AerosureResult<ConduitReceipt> {
            self.released.borrow_mut().push((to.clone(), amount));
            Ok(ConduitReceipt {
                transfer_id: format!("t-{}", self.released.borrow().len()),
                to: to.clone(),
                amount,
                released_at: Utc::now(),
            })
        }
    }

    struct Fixture {
        underwriting: Underwriting,
        ledger: Ledger,
        journal: EventJournal,
        config: AerosureConfig,
        airline: Principal,
        when: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        let airline = Principal::new("airline-1");
        let mut ledger = Ledger::new();
        ledger.create_airline(airline.clone(), "Aurora Air").unwrap();
        ledger.mark_funded(&airline, 1_000_000).unwrap();
        Fixture {
            underwriting: Underwriting,
            ledger,
            journal: EventJournal::new(),
            config: AerosureConfig::default(),
            airline,
            when: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    impl Fixture {
        fn register_flight(&mut self, number: &str) -> FlightKey {
            self.underwriting
                .register_flight(
                    &self.airline,
                    number,
                    self.when,
                    &mut self.ledger,
                    &mut self.journal,
                )
                .unwrap()
        }

        fn buy(&mut self, client: &str, number: &str, value: Money) -> AerosureResult<PolicyKey> {
            let airline = self.airline.clone();
            self.underwriting.buy_insurance(
                &Principal::new(client),
                &airline,
                number,
                self.when,
                value,
                &mut self.ledger,
                &mut self.journal,
                &self.config,
            )
        }
    }

    #[test]
    fn flight_registration_is_unique_per_tuple() {
        let mut fx = fixture();
        let key = fx.register_flight("LFT568");
        assert_eq!(fx.ledger.flight(&key).unwrap().status, FlightStatus::Unknown);

        let airline = fx.airline.clone();
        let dup = fx.underwriting.register_flight(
            &airline,
            "LFT568",
            fx.when,
            &mut fx.ledger,
            &mut fx.journal,
        );
        assert!(matches!(dup, Err(AerosureError::AlreadyExists(_))));
    }

    #[test]
    fn only_airlines_register_flights() {
        let mut fx = fixture();
        let result = fx.underwriting.register_flight(
            &Principal::new("client-1"),
            "LFT568",
            fx.when,
            &mut fx.ledger,
            &mut fx.journal,
        );
        assert!(matches!(result, Err(AerosureError::Forbidden(_))));
    }

    #[test]
    fn premium_bounds_are_enforced() {
        let mut fx = fixture();
        fx.register_flight("LFT568");

        let over = fx.config.max_premium + 1;
        assert!(matches!(
            fx.buy("client-1", "LFT568", over),
            Err(AerosureError::ExceedsLimit { .. })
        ));
        assert!(matches!(
            fx.buy("client-1", "LFT568", 0),
            Err(AerosureError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_flight_cannot_be_insured() {
        let mut fx = fixture();
        assert!(matches!(
            fx.buy("client-1", "LFT999", 10_000),
            Err(AerosureError::NotFound(_))
        ));
    }

    #[test]
    fn one_policy_per_client_and_flight() {
        let mut fx = fixture();
        fx.register_flight("LFT568");
        fx.buy("client-1", "LFT568", 10_000).unwrap();
        assert!(matches!(
            fx.buy("client-1", "LFT568", 10_000),
            Err(AerosureError::AlreadyExists(_))
        ));
    }

    #[test]
    fn premium_lands_in_airline_balance() {
        let mut fx = fixture();
        fx.register_flight("LFT568");
        fx.buy("client-1", "LFT568", 10_000).unwrap();

        let airline = fx.ledger.airline(&fx.airline).unwrap();
        assert_eq!(airline.balance, 1_010_000);
        assert_eq!(fx.ledger.total_balance(), 1_010_000);
    }

    #[test]
    fn late_airline_settlement_credits_half_the_premium() {
        let mut fx = fixture();
        let flight_key = fx.register_flight("LFT568");
        let policy_key = fx.buy("client-1", "LFT568", 10_000).unwrap();

        let airline = fx.airline.clone();
        fx.underwriting
            .process_flight_status(
                &airline,
                "LFT568",
                fx.when,
                FlightStatus::LateAirline,
                &mut fx.ledger,
                &mut fx.journal,
            )
            .unwrap();

        let policy = fx.ledger.policy(&policy_key).unwrap();
        assert!(policy.is_paid);
        assert_eq!(policy.balance, 5_000);
        assert_eq!(
            fx.ledger.flight(&flight_key).unwrap().status,
            FlightStatus::LateAirline
        );
    }

    #[test]
    fn on_time_settlement_credits_nothing() {
        let mut fx = fixture();
        let flight_key = fx.register_flight("LFT568");
        let policy_key = fx.buy("client-1", "LFT568", 10_000).unwrap();

        let airline = fx.airline.clone();
        fx.underwriting
            .process_flight_status(
                &airline,
                "LFT568",
                fx.when,
                FlightStatus::OnTime,
                &mut fx.ledger,
                &mut fx.journal,
            )
            .unwrap();

        let policy = fx.ledger.policy(&policy_key).unwrap();
        assert!(!policy.is_paid);
        assert_eq!(policy.balance, 0);
        assert_eq!(
            fx.ledger.flight(&flight_key).unwrap().status,
            FlightStatus::OnTime
        );
    }

    #[test]
    fn settlement_happens_exactly_once() {
        let mut fx = fixture();
        fx.register_flight("LFT568");
        let policy_key = fx.buy("client-1", "LFT568", 10_000).unwrap();
        let airline = fx.airline.clone();

        fx.underwriting
            .process_flight_status(
                &airline,
                "LFT568",
                fx.when,
                FlightStatus::LateAirline,
                &mut fx.ledger,
                &mut fx.journal,
            )
            .unwrap();
        let events_after_first = fx.journal.records().len();

        // A competing quorum landing later must not re-credit or rewrite.
        fx.underwriting
            .process_flight_status(
                &airline,
                "LFT568",
                fx.when,
                FlightStatus::OnTime,
                &mut fx.ledger,
                &mut fx.journal,
            )
            .unwrap();

        assert_eq!(fx.ledger.policy(&policy_key).unwrap().balance, 5_000);
        assert_eq!(fx.journal.records().len(), events_after_first);
    }

    #[test]
    fn payout_numerator_backs_off_to_affordable_fraction() {
        assert_eq!(payout_numerator(0, 0), 5);
        assert_eq!(payout_numerator(100_000, 60_000), 5);
        assert_eq!(payout_numerator(100_000, 20_000), 2);
        assert_eq!(payout_numerator(100_000, 0), 0);
    }

    #[test]
    fn withdrawal_releases_once() {
        let mut fx = fixture();
        fx.register_flight("LFT568");
        fx.buy("client-1", "LFT568", 10_000).unwrap();
        let airline = fx.airline.clone();
        fx.underwriting
            .process_flight_status(
                &airline,
                "LFT568",
                fx.when,
                FlightStatus::LateAirline,
                &mut fx.ledger,
                &mut fx.journal,
            )
            .unwrap();

        let conduit = RecordingConduit::new();
        let client = Principal::new("client-1");
        let amount = fx
            .underwriting
            .withdraw_payout(
                &client,
                &airline,
                "LFT568",
                fx.when,
                &mut fx.ledger,
                &conduit,
            )
            .unwrap();
        assert_eq!(amount, 5_000);
        assert_eq!(conduit.released.borrow().as_slice(), &[(client.clone(), 5_000)]);

        let again = fx.underwriting.withdraw_payout(
            &client,
            &airline,
            "LFT568",
            fx.when,
            &mut fx.ledger,
            &conduit,
        );
        assert!(matches!(again, Err(AerosureError::NotFound(_))));
    }
}
