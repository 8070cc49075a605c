//! Ledger trait definition.

use async_trait::async_trait;

use crate::error::SettleResult;
use crate::types::PaymentProof;

/// A payment rail that can move value and prove it.
///
/// Implementations block until the transfer is confirmed (or the
/// confirmation wait gives up). A returned proof means value has moved and
/// cannot be taken back.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Pay `amount` (decimal ether string) to `recipient`.
    ///
    /// # Errors
    ///
    /// - [`SettleError::InvalidAmount`](crate::SettleError::InvalidAmount) /
    ///   [`SettleError::InvalidAddress`](crate::SettleError::InvalidAddress)
    ///   before anything is sent
    /// - [`SettleError::Broadcast`](crate::SettleError::Broadcast) when the
    ///   node refuses the transaction
    /// - [`SettleError::TransactionFailed`](crate::SettleError::TransactionFailed)
    ///   when it is mined but reverts
    /// - [`SettleError::ConfirmationTimeout`](crate::SettleError::ConfirmationTimeout)
    ///   when no receipt arrives in time
    async fn pay(&self, recipient: &str, amount: &str) -> SettleResult<PaymentProof>;
}
