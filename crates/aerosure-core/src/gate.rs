//! Access gate: process-wide operational flag and authorization registry.
//!
//! The gate fronts every other component. When it is closed, all mutating
//! operations fail with `Unavailable` and callers must re-issue after the
//! gate reopens; the core performs no retries of its own.

use crate::error::{AerosureError, AerosureResult};
use crate::types::Principal;
use std::collections::HashSet;
use tracing::{info, warn};

/// Operational flag plus the set of principals allowed to manage it.
#[derive(Debug, Clone)]
pub struct AccessGate {
    owner: Principal,
    operational: bool,
    authorized: HashSet<Principal>,
}

impl AccessGate {
    /// A fresh gate starts open, with only the owner able to manage it.
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            operational: true,
            authorized: HashSet::new(),
        }
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    /// Query the operational flag. Restricted to the owner and authorized
    /// principals; everyone else gets `Forbidden`.
    pub fn is_operational(&self, caller: &Principal) -> AerosureResult<bool> {
        self.ensure_manager(caller, "query the operational flag")?;
        Ok(self.operational)
    }

    /// Flip the operational flag. A no-op flip is rejected so that every
    /// accepted call reflects an actual transition.
    pub fn set_operating(&mut self, caller: &Principal, mode: bool) -> AerosureResult<()> {
        self.ensure_manager(caller, "change the operating mode")?;
        if self.operational == mode {
            return Err(AerosureError::InvalidArgument(
                "operating mode unchanged".to_string(),
            ));
        }
        self.operational = mode;
        if mode {
            info!(caller = %caller, "gate reopened");
        } else {
            warn!(caller = %caller, "gate closed, mutating operations suspended");
        }
        Ok(())
    }

    /// Grant gate-management rights to a principal. Owner only.
    pub fn authorize(&mut self, caller: &Principal, principal: Principal) -> AerosureResult<()> {
        self.ensure_owner(caller, "authorize principals")?;
        if principal.is_zero() {
            return Err(AerosureError::InvalidArgument(
                "cannot authorize the zero principal".to_string(),
            ));
        }
        info!(principal = %principal, "principal authorized");
        self.authorized.insert(principal);
        Ok(())
    }

    /// Revoke gate-management rights. Owner only.
    pub fn deauthorize(&mut self, caller: &Principal, principal: &Principal) -> AerosureResult<()> {
        self.ensure_owner(caller, "deauthorize principals")?;
        if !self.authorized.remove(principal) {
            return Err(AerosureError::NotFound(format!(
                "authorization for {principal}"
            )));
        }
        info!(principal = %principal, "principal deauthorized");
        Ok(())
    }

    pub fn is_authorized(&self, principal: &Principal) -> bool {
        *principal == self.owner || self.authorized.contains(principal)
    }

    /// Gate check used by every mutating operation in the other components.
    pub fn ensure_operational(&self) -> AerosureResult<()> {
        if self.operational {
            Ok(())
        } else {
            Err(AerosureError::Unavailable)
        }
    }

    fn ensure_owner(&self, caller: &Principal, action: &str) -> AerosureResult<()> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(AerosureError::Forbidden(action.to_string()))
        }
    }

    fn ensure_manager(&self, caller: &Principal, action: &str) -> AerosureResult<()> {
        if self.is_authorized(caller) {
            Ok(())
        } else {
            Err(AerosureError::Forbidden(action.to_string()))
        }
    }
}
