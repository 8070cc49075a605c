//! Error types for the ledger boundary.

use thiserror::Error;

/// Result type alias for ledger operations.
pub type SettleResult<T> = Result<T, SettleError>;

/// Errors that can occur while paying through a ledger.
#[derive(Debug, Error)]
pub enum SettleError {
    /// Amount is not a valid non-negative decimal ether value.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Recipient or sender is not a 20-byte hex address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Signing failed or the node refused the raw transaction.
    #[error("broadcast failed: {0}")]
    Broadcast(String),

    /// Transaction was mined but reverted.
    #[error("payment transaction {tx_hash} failed on-chain")]
    TransactionFailed {
        /// Hash of the reverted transaction
        tx_hash: String,
    },

    /// Transaction was broadcast but not confirmed before the deadline.
    ///
    /// The payment may still land; its status is unknown.
    #[error("payment {tx_hash} not confirmed after {waited_secs}s; status unknown")]
    ConfirmationTimeout {
        /// Hash of the broadcast transaction
        tx_hash: String,
        /// Seconds spent waiting
        waited_secs: u64,
    },

    /// Network error (retryable).
    #[error("network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SettleError {
    /// Create a new InvalidAmount error.
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create a new InvalidAddress error.
    pub fn invalid_address(addr: impl Into<String>) -> Self {
        Self::InvalidAddress(addr.into())
    }

    /// Create a new Broadcast error.
    pub fn broadcast(msg: impl Into<String>) -> Self {
        Self::Broadcast(msg.into())
    }

    /// Create a new Network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error is retryable.
    ///
    /// Only read-side failures qualify; a broadcast is never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Check if the payment outcome is unknown.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. })
    }

    /// Transaction hash of a payment that reached the chain, if any.
    ///
    /// Set for reverted and unconfirmed transfers: gas (and possibly value)
    /// was spent even though no proof was produced.
    pub fn broadcast_tx(&self) -> Option<&str> {
        match self {
            Self::TransactionFailed { tx_hash } | Self::ConfirmationTimeout { tx_hash, .. } => {
                Some(tx_hash)
            }
            _ => None,
        }
    }
}

impl From<ethers::providers::ProviderError> for SettleError {
    fn from(e: ethers::providers::ProviderError) -> Self {
        Self::Network(e.to_string())
    }
}
