//! Host-platform value transfer boundary.
//!
//! The core tracks balances; actual custody of native-currency value lives
//! with the execution platform. Inbound value arrives attached to calls, so
//! only the outbound direction needs a connector.

use crate::error::AerosureResult;
use crate::types::{Money, Principal};
use chrono::{DateTime, Utc};

/// Moves value out of the ledger to a principal.
pub trait ValueConduit {
    /// Release `amount` to `to`. A failure aborts the surrounding operation;
    /// the conduit must not retain partial effects on error.
    fn release(&self, to: &Principal, amount: Money) -> AerosureResult<ConduitReceipt>;
}

/// Proof of an executed outbound transfer.
#[derive(Debug, Clone)]
pub struct ConduitReceipt {
    pub transfer_id: String,
    pub to: Principal,
    pub amount: Money,
    pub released_at: DateTime<Utc>,
}
