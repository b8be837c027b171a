//! Canonical ledger state: airlines, flights, policies, aggregate balance.
//!
//! Pure state with narrow mutation primitives. Policy decisions (who may
//! call what, with how much value) live in governance and underwriting;
//! this module only enforces existence and conservation.

use crate::error::{AerosureError, AerosureResult};
use crate::types::{
    AirlineRecord, FlightKey, FlightRecord, FlightStatus, Money, PolicyKey, PolicyRecord,
    Principal,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Settlement credits are expressed in tenths of the premium.
pub const PAYOUT_DENOMINATOR: u64 = 10;

/// Owner of all entity maps and the aggregate balance.
///
/// `total_balance` tracks every unit of value the ledger has received minus
/// every unit released, so at all times it equals the sum of airline
/// operating balances, unreleased policy credits, and collected fees.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    airlines: HashMap<Principal, AirlineRecord>,
    flights: HashMap<FlightKey, FlightRecord>,
    flight_order: Vec<FlightKey>,
    policies: HashMap<PolicyKey, PolicyRecord>,
    registered_airlines: u32,
    total_balance: Money,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- airlines ----

    /// Create-airline primitive. Every admission path goes through here,
    /// which is what keeps the registered count authoritative.
    pub fn create_airline(
        &mut self,
        principal: Principal,
        name: impl Into<String>,
    ) -> AerosureResult<()> {
        if self.airlines.contains_key(&principal) {
            return Err(AerosureError::AlreadyExists(format!(
                "airline {principal}"
            )));
        }
        self.airlines.insert(
            principal.clone(),
            AirlineRecord {
                principal,
                name: name.into(),
                is_registered: true,
                is_funded: false,
                balance: 0,
            },
        );
        self.registered_airlines += 1;
        Ok(())
    }

    pub fn airline(&self, principal: &Principal) -> Option<&AirlineRecord> {
        self.airlines.get(principal)
    }

    pub fn is_registered_airline(&self, principal: &Principal) -> bool {
        self.airlines
            .get(principal)
            .map(|a| a.is_registered)
            .unwrap_or(false)
    }

    pub fn registered_airline_count(&self) -> u32 {
        self.registered_airlines
    }

    /// Move funding value into the airline's operating balance.
    pub fn mark_funded(&mut self, principal: &Principal, amount: Money) -> AerosureResult<()> {
        let airline = self
            .airlines
            .get_mut(principal)
            .ok_or_else(|| AerosureError::NotFound(format!("airline {principal}")))?;
        airline.balance = checked_add(airline.balance, amount)?;
        airline.is_funded = true;
        self.total_balance = checked_add(self.total_balance, amount)?;
        Ok(())
    }

    /// Move a policy premium into the underwriting airline's balance.
    pub fn receive_premium(&mut self, principal: &Principal, amount: Money) -> AerosureResult<()> {
        let airline = self
            .airlines
            .get_mut(principal)
            .ok_or_else(|| AerosureError::NotFound(format!("airline {principal}")))?;
        airline.balance = checked_add(airline.balance, amount)?;
        self.total_balance = checked_add(self.total_balance, amount)?;
        Ok(())
    }

    /// Absorb a flat fee (oracle registration) into the pool.
    pub fn deposit_fee(&mut self, amount: Money) -> AerosureResult<()> {
        self.total_balance = checked_add(self.total_balance, amount)?;
        Ok(())
    }

    // ---- flights ----

    pub fn create_flight(&mut self, key: FlightKey, record: FlightRecord) -> AerosureResult<()> {
        if self.flights.contains_key(&key) {
            return Err(AerosureError::AlreadyExists(key.to_string()));
        }
        self.flight_order.push(key.clone());
        self.flights.insert(key, record);
        Ok(())
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&FlightRecord> {
        self.flights.get(key)
    }

    /// Flight keys in registration order.
    pub fn flight_keys(&self) -> &[FlightKey] {
        &self.flight_order
    }

    pub fn set_flight_status(
        &mut self,
        key: &FlightKey,
        status: FlightStatus,
        updated_at: DateTime<Utc>,
    ) -> AerosureResult<()> {
        let flight = self
            .flights
            .get_mut(key)
            .ok_or_else(|| AerosureError::NotFound(key.to_string()))?;
        flight.status = status;
        flight.updated_at = updated_at;
        Ok(())
    }

    // ---- policies ----

    pub fn create_policy(&mut self, key: PolicyKey, record: PolicyRecord) -> AerosureResult<()> {
        if self.policies.contains_key(&key) {
            return Err(AerosureError::AlreadyExists(key.to_string()));
        }
        let flight = self
            .flights
            .get_mut(&record.flight)
            .ok_or_else(|| AerosureError::NotFound(record.flight.to_string()))?;
        flight.policies.push(key.clone());
        self.policies.insert(key, record);
        Ok(())
    }

    pub fn policy(&self, key: &PolicyKey) -> Option<&PolicyRecord> {
        self.policies.get(key)
    }

    pub fn policies_for_flight(&self, key: &FlightKey) -> &[PolicyKey] {
        self.flights
            .get(key)
            .map(|f| f.policies.as_slice())
            .unwrap_or(&[])
    }

    /// Sum of payout balances already credited on this flight's policies.
    pub fn paid_pool_total(&self, key: &FlightKey) -> Money {
        self.policies_for_flight(key)
            .iter()
            .filter_map(|k| self.policies.get(k))
            .filter(|p| p.is_paid)
            .map(|p| p.balance)
            .sum()
    }

    /// Credit-insurees primitive: mark every unpaid policy of the flight
    /// paid and move `value * numerator / 10` from the airline's balance to
    /// the policy balance. Each credit is capped by what the airline still
    /// holds, so the airline balance never underflows. Returns the total
    /// credited.
    pub fn credit_insurees(&mut self, key: &FlightKey, numerator: u64) -> AerosureResult<Money> {
        let (airline_id, policy_keys) = {
            let flight = self
                .flights
                .get(key)
                .ok_or_else(|| AerosureError::NotFound(key.to_string()))?;
            (flight.airline.clone(), flight.policies.clone())
        };

        let mut credited: Money = 0;
        for policy_key in policy_keys {
            let policy = self
                .policies
                .get_mut(&policy_key)
                .ok_or_else(|| AerosureError::Internal(format!("dangling {policy_key}")))?;
            if policy.is_paid {
                continue;
            }

            let entitlement =
                (policy.value as u128 * numerator as u128 / PAYOUT_DENOMINATOR as u128) as Money;
            let available = self
                .airlines
                .get(&airline_id)
                .map(|a| a.balance)
                .unwrap_or(0);
            let share = entitlement.min(available);

            policy.is_paid = true;
            policy.balance = checked_add(policy.balance, share)?;

            let airline = self
                .airlines
                .get_mut(&airline_id)
                .ok_or_else(|| AerosureError::Internal(format!("dangling airline {airline_id}")))?;
            airline.balance -= share;
            credited = checked_add(credited, share)?;
        }
        Ok(credited)
    }

    /// Zero a policy's payout balance and release it from the pool.
    pub fn release_payout(&mut self, key: &PolicyKey) -> AerosureResult<Money> {
        let policy = self
            .policies
            .get_mut(key)
            .ok_or_else(|| AerosureError::NotFound(key.to_string()))?;
        let amount = policy.balance;
        policy.balance = 0;
        self.total_balance = self.total_balance.checked_sub(amount).ok_or_else(|| {
            AerosureError::Internal("payout release exceeds ledger balance".to_string())
        })?;
        Ok(amount)
    }

    pub fn total_balance(&self) -> Money {
        self.total_balance
    }

    /// Sum of airline operating balances, used by conservation checks.
    pub fn airline_balance_total(&self) -> Money {
        self.airlines.values().map(|a| a.balance).sum()
    }
}

fn checked_add(a: Money, b: Money) -> AerosureResult<Money> {
    a.checked_add(b)
        .ok_or_else(|| AerosureError::Internal("balance overflow".to_string()))
}
