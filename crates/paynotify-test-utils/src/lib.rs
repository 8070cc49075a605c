//! Shared test utilities for paynotify.
//!
//! - [`MockLedger`]: records payments, can fail or time out on demand
//! - [`StubNotifier`]: scripted [`Notifier`](paynotify_x402::Notifier) that tracks concurrency
//! - [`helpers`]: temporary databases and common fixtures

pub mod helpers;
pub mod mock_ledger;
pub mod stub_notifier;

pub use helpers::*;
pub use mock_ledger::MockLedger;
pub use stub_notifier::{StubFailure, StubNotifier, STUB_PAID_TX};
