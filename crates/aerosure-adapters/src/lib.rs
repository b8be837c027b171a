//! Host-platform adapters for the Aerosure ledger.
//!
//! The core consumes two things from its execution platform: an outbound
//! value conduit and a reporter-index entropy source. These adapters are
//! the in-memory versions used for local simulation and tests.

#![deny(unsafe_code)]

use aerosure_core::{
    AerosureError, AerosureResult, ConduitReceipt, EntropySource, Money, Principal, ValueConduit,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// In-memory value conduit for deterministic local settlement simulation.
///
/// Released amounts accumulate per principal so tests can assert exactly
/// what left the ledger.
#[derive(Debug, Default)]
pub struct InMemoryConduit {
    released: Mutex<HashMap<Principal, Money>>,
}

impl InMemoryConduit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total value released to one principal so far.
    pub fn released_to(&self, principal: &Principal) -> Money {
        self.released
            .lock()
            .map(|m| m.get(principal).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_released(&self) -> Money {
        self.released
            .lock()
            .map(|m| m.values().sum())
            .unwrap_or(0)
    }
}

impl ValueConduit for InMemoryConduit {
    fn release(&self, to: &Principal, amount: Money) -> AerosureResult<ConduitReceipt> {
        let mut released = self
            .released
            .lock()
            .map_err(|_| AerosureError::Transfer("conduit ledger poisoned".to_string()))?;
        let entry = released.entry(to.clone()).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| AerosureError::Transfer("conduit balance overflow".to_string()))?;

        let transfer_id = Uuid::new_v4().to_string();
        debug!(to = %to, amount, transfer_id = %transfer_id, "value released");
        Ok(ConduitReceipt {
            transfer_id,
            to: to.clone(),
            amount,
            released_at: Utc::now(),
        })
    }
}

/// Conduit that refuses every transfer, for exercising abort paths.
#[derive(Debug, Default)]
pub struct OfflineConduit;

impl ValueConduit for OfflineConduit {
    fn release(&self, _to: &Principal, _amount: Money) -> AerosureResult<ConduitReceipt> {
        Err(AerosureError::Transfer("conduit offline".to_string()))
    }
}

/// Entropy source replaying a fixed sequence of draws, cycling at the end.
///
/// Gives simulations full control over oracle index assignment.
#[derive(Debug, Clone)]
pub struct SequenceEntropy {
    values: Vec<u8>,
    cursor: usize,
}

impl SequenceEntropy {
    pub fn new(values: impl Into<Vec<u8>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }
}

impl EntropySource for SequenceEntropy {
    fn draw(&mut self, _caller: &Principal, span: u8) -> u8 {
        if self.values.is_empty() {
            return 0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value % span.max(1)
    }
}
