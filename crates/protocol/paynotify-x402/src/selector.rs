//! Choosing among the payment options a gateway advertises.

use paynotify_settle::{parse_amount, U256};
use tracing::debug;

use crate::types::PaymentRequirement;

/// Picks the payment option to pay from a challenge's `accepts` list.
pub trait RequirementSelector: Send + Sync {
    /// Return the option to pay, or `None` if none is acceptable.
    fn select<'a>(&self, accepts: &'a [PaymentRequirement]) -> Option<&'a PaymentRequirement>;
}

/// Takes the first advertised option as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAccepted;

impl RequirementSelector for FirstAccepted {
    fn select<'a>(&self, accepts: &'a [PaymentRequirement]) -> Option<&'a PaymentRequirement> {
        accepts.first()
    }
}

/// Takes the first option whose price is at most a spending cap.
///
/// Options with an unparseable amount are skipped.
#[derive(Debug, Clone, Copy)]
pub struct MaxAmount {
    cap_wei: U256,
}

impl MaxAmount {
    /// Cap given in wei.
    pub fn wei(cap_wei: impl Into<U256>) -> Self {
        Self {
            cap_wei: cap_wei.into(),
        }
    }

    /// Cap given as a decimal ether string.
    pub fn ether(cap: &str) -> paynotify_settle::SettleResult<Self> {
        Ok(Self {
            cap_wei: parse_amount(cap)?,
        })
    }
}

impl RequirementSelector for MaxAmount {
    fn select<'a>(&self, accepts: &'a [PaymentRequirement]) -> Option<&'a PaymentRequirement> {
        accepts.iter().find(|req| match parse_amount(&req.max_amount_required) {
            Ok(wei) => wei <= self.cap_wei,
            Err(e) => {
                debug!(amount = %req.max_amount_required, error = %e, "Skipping unparseable option");
                false
            }
        })
    }
}
