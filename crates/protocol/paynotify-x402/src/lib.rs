//! x402 payment flow for paynotify.
//!
//! The gateway refuses to deliver a notification until it has been paid.
//! [`PaymentFlowClient`] hides that behind a single `notify` call: it sends
//! the request, pays through a [`Ledger`](paynotify_settle::Ledger) when the
//! gateway answers `402 Payment Required`, and resends with the proof.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   POST /notify          ┌──────────────┐
//! │ Payment     │ ──────────────────────→ │   Gateway    │
//! │ FlowClient  │ ←────────────────────── │              │
//! │             │  402 {x402.accepts}     │              │
//! │      │      │                         │              │
//! │  Ledger.pay │                         │              │
//! │      │      │  POST /notify           │              │
//! │      ▼      │  + x-agent-payment-tx   │              │
//! │             │ ──────────────────────→ │              │
//! │             │ ←────────────────────── │              │
//! └─────────────┘  200 result             └──────────────┘
//! ```
//!
//! # Components
//!
//! - **[`types`]**: wire types (challenge, requirement, request) and [`GatewayConfig`]
//! - **[`client`]**: [`PaymentFlowClient`] and the [`Notifier`] trait
//! - **[`selector`]**: choosing which advertised option to pay
//! - **[`error`]**: [`NotifyError`], which records whether funds were spent
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paynotify_settle::{JsonRpcLedger, LedgerConfig};
//! use paynotify_x402::{GatewayConfig, Notifier, PaymentFlowClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key = std::env::var("PAYNOTIFY_WALLET_KEY")?;
//! let ledger = JsonRpcLedger::new(LedgerConfig::base_sepolia(&key))?;
//! let client = PaymentFlowClient::new(GatewayConfig::new("http://localhost:3000"), Arc::new(ledger))?;
//!
//! let result = client.notify("123456789", "Whale alert: 500 ETH moved", None).await?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod selector;
pub mod types;

// Re-exports for convenience
pub use client::{Delivery, Notifier, PaymentFlowClient};
pub use error::{NotifyError, NotifyResult};
pub use selector::{FirstAccepted, MaxAmount, RequirementSelector};
pub use types::{
    DeliveryResult, GatewayConfig, NotificationRequest, PaymentChallenge, PaymentRequirement,
    PaymentTerms, DEFAULT_GATEWAY_URL, HEADER_PAYMENT_TX,
};
