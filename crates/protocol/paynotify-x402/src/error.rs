//! Error types for the payment flow.

use paynotify_settle::{PaymentProof, SettleError};
use thiserror::Error;

/// Result type for notify operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors that can occur while delivering a paid notification.
///
/// Whether value has already moved is carried explicitly: see
/// [`NotifyError::spent_proof`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Transport-level failure talking to the gateway.
    #[error("{}", network_message(.message, .spent))]
    Network {
        /// Underlying transport error
        message: String,
        /// Proof of a payment made before the failure, if any
        spent: Option<PaymentProof>,
    },

    /// The gateway answered with something the protocol does not allow.
    #[error("{reason} (HTTP {status}): {body}")]
    Protocol {
        /// What was wrong
        reason: String,
        /// HTTP status received
        status: u16,
        /// Response body text
        body: String,
    },

    /// The ledger could not complete the payment.
    #[error("payment failed: {0}")]
    Payment(#[from] SettleError),

    /// The gateway rejected the delivery.
    #[error("{}", delivery_message(.status, .body, .spent))]
    Delivery {
        /// HTTP status received
        status: u16,
        /// Response body text
        body: String,
        /// Proof that was presented, if this client paid for it
        spent: Option<PaymentProof>,
    },

    /// Client could not be constructed.
    #[error("configuration error: {0}")]
    Config(String),
}

fn network_message(message: &str, spent: &Option<PaymentProof>) -> String {
    match spent {
        Some(proof) => format!(
            "network error after payment {} was already spent: {}",
            proof, message
        ),
        None => format!("network error: {}", message),
    }
}

fn delivery_message(status: &u16, body: &str, spent: &Option<PaymentProof>) -> String {
    match spent {
        Some(proof) => format!(
            "delivery failed after payment {} was already spent (HTTP {}): {}",
            proof, status, body
        ),
        None => format!("delivery failed (HTTP {}): {}", status, body),
    }
}

impl NotifyError {
    /// Create a Network error with no payment made.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network {
            message: msg.into(),
            spent: None,
        }
    }

    /// Create a Protocol error.
    pub fn protocol(reason: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
            status,
            body: body.into(),
        }
    }

    /// Proof of a payment that was made even though delivery failed.
    pub fn spent_proof(&self) -> Option<&PaymentProof> {
        match self {
            Self::Network { spent, .. } | Self::Delivery { spent, .. } => spent.as_ref(),
            _ => None,
        }
    }

    /// True when the payment outcome is unknown (confirmation timed out).
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Payment(e) if e.is_ambiguous())
    }

    /// True when value may have left the payer's account.
    ///
    /// A caller seeing this must not assume the failure was free.
    pub fn funds_at_risk(&self) -> bool {
        self.spent_proof().is_some()
            || matches!(self, Self::Payment(e) if e.broadcast_tx().is_some())
    }

    /// Returns a user-friendly suggestion for recovering from this error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::Network { spent: Some(_), .. } | Self::Delivery { spent: Some(_), .. } => {
                "Retry with the spent transaction hash as proof instead of paying again"
            }
            Self::Network { .. } => "Check connectivity to the gateway",
            Self::Protocol { .. } => "Check the gateway URL and that it speaks x402",
            Self::Payment(e) if e.is_ambiguous() => {
                "Check the transaction on a block explorer before retrying"
            }
            Self::Payment(_) => "Check the payer balance and ledger configuration",
            Self::Delivery { .. } => "Check the destination and gateway logs",
            Self::Config(_) => "Check the gateway configuration",
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        Self::network(e.to_string())
    }
}
