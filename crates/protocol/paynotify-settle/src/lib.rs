//! Ledger boundary for paynotify.
//!
//! This crate is the payment rail the delivery client pays into. It turns a
//! payment instruction (`recipient`, decimal `amount`) into a confirmed
//! on-chain transfer and hands back a [`PaymentProof`] the gateway can verify.
//!
//! # Architecture
//!
//! ```text
//! paynotify-x402              paynotify-settle
//! ┌──────────────────┐       ┌──────────────────────────┐
//! │ PaymentFlowClient│ ────► │ Ledger (trait)           │
//! │  (402 → pay)     │       │   └─ JsonRpcLedger       │
//! └──────────────────┘       └────────────┬─────────────┘
//!                                         │ signed locally (ethers)
//!                                         │ eth_sendRawTransaction
//!                                         ▼
//!                            ┌──────────────────────────┐
//!                            │ EVM JSON-RPC node        │
//!                            └──────────────────────────┘
//! ```
//!
//! # Irreversibility
//!
//! A successful [`Ledger::pay`] moves value for good. There is no
//! compensating transaction. When the confirmation wait times out the
//! transfer may or may not have landed; that case is reported as
//! [`SettleError::ConfirmationTimeout`], which callers must treat as
//! ambiguous rather than as a plain failure.
//!
//! # Usage
//!
//! ```rust,no_run
//! use paynotify_settle::{JsonRpcLedger, Ledger, LedgerConfig};
//!
//! # async fn example() -> paynotify_settle::SettleResult<()> {
//! let config = LedgerConfig::base_sepolia(&std::env::var("PAYNOTIFY_WALLET_KEY").unwrap_or_default());
//! let ledger = JsonRpcLedger::new(config)?;
//! let proof = ledger
//!     .pay("0x1234567890123456789012345678901234567890", "0.00001")
//!     .await?;
//! println!("paid in {}", proof);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod jsonrpc;
mod retry;
mod traits;
pub mod types;

// Re-export main types
pub use config::{LedgerConfig, RetryConfig, DEFAULT_CHAIN_ID, DEFAULT_RPC_URL};
pub use error::{SettleError, SettleResult};
pub use jsonrpc::JsonRpcLedger;
pub use retry::RetryPolicy;
pub use traits::Ledger;
pub use types::{parse_address, parse_amount, PaymentProof};

pub use ethers::types::{Address, U256};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_display() {
        let proof = PaymentProof::new("0xabc123");
        assert_eq!(proof.as_str(), "0xabc123");
        assert_eq!(format!("{}", proof), "0xabc123");
    }
}
