//! Ledger value types.

use ethers::types::{Address, U256};
use ethers::utils::parse_ether;
use serde::{Deserialize, Serialize};

use crate::error::{SettleError, SettleResult};

/// Decimal places in an ether amount.
const ETHER_DECIMALS: usize = 18;

/// Opaque proof that a payment was made (the transaction hash).
///
/// Produced by a [`Ledger`](crate::Ledger) once the transfer is confirmed and
/// presented to the gateway on the retried request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentProof(String);

impl PaymentProof {
    /// Wrap a transaction reference.
    pub fn new(tx_ref: impl Into<String>) -> Self {
        Self(tx_ref.into())
    }

    /// Get the proof as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PaymentProof {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Parse a decimal ether string (e.g. `"0.0001"`) into wei.
///
/// `ethers` truncates digits past the 18th and wraps negative values, so
/// both are refused before conversion.
pub fn parse_amount(amount: &str) -> SettleResult<U256> {
    let amount = amount.trim();
    if !amount.bytes().any(|b| b.is_ascii_digit()) || amount.starts_with(['-', '+']) {
        return Err(SettleError::invalid_amount(format!("{:?}", amount)));
    }
    if let Some((_, frac)) = amount.split_once('.') {
        if frac.len() > ETHER_DECIMALS {
            return Err(SettleError::invalid_amount(format!(
                "{} has more than {} decimal places",
                amount, ETHER_DECIMALS
            )));
        }
    }
    parse_ether(amount).map_err(|e| SettleError::invalid_amount(format!("{:?}: {}", amount, e)))
}

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(addr: &str) -> SettleResult<Address> {
    if !addr.starts_with("0x") && !addr.starts_with("0X") {
        return Err(SettleError::invalid_address(addr));
    }
    addr[2..]
        .parse::<Address>()
        .map_err(|_| SettleError::invalid_address(addr))
}
