//! Mock implementation of the `Ledger` trait for testing.

use async_trait::async_trait;
use paynotify_settle::{Ledger, PaymentProof, SettleError, SettleResult};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Confirm,
    Revert,
    Timeout,
}

struct MockLedgerInner {
    /// Every `pay` call as (recipient, amount).
    payments: Vec<(String, String)>,
    mode: Mode,
    /// Simulated confirmation latency.
    delay: Option<Duration>,
    /// Auto-incrementing transaction counter.
    tx_counter: u64,
}

/// A mock ledger that confirms instantly (or fails as configured).
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockLedger {
    inner: Arc<RwLock<MockLedgerInner>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Create a ledger that confirms every payment.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockLedgerInner {
                payments: Vec::new(),
                mode: Mode::Confirm,
                delay: None,
                tx_counter: 0,
            })),
        }
    }

    /// Make every payment revert on-chain.
    pub fn with_failure(self) -> Self {
        self.inner.write().unwrap().mode = Mode::Revert;
        self
    }

    /// Make every payment time out waiting for confirmation.
    pub fn with_timeout(self) -> Self {
        self.inner.write().unwrap().mode = Mode::Timeout;
        self
    }

    /// Wait this long before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.write().unwrap().delay = Some(delay);
        self
    }

    // =========================================================================
    // Assertion Helpers
    // =========================================================================

    /// All payments attempted, in order.
    pub fn payments(&self) -> Vec<(String, String)> {
        self.inner.read().unwrap().payments.clone()
    }

    /// Number of `pay` calls.
    pub fn pay_count(&self) -> usize {
        self.inner.read().unwrap().payments.len()
    }

    /// The proof the n-th (1-based) payment produced.
    pub fn proof_for(n: u64) -> PaymentProof {
        PaymentProof::new(format!("0xmocktx{:04}", n))
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn pay(&self, recipient: &str, amount: &str) -> SettleResult<PaymentProof> {
        let (mode, delay, n) = {
            let mut inner = self.inner.write().unwrap();
            inner.payments.push((recipient.to_string(), amount.to_string()));
            inner.tx_counter += 1;
            (inner.mode, inner.delay, inner.tx_counter)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let proof = Self::proof_for(n);
        match mode {
            Mode::Confirm => Ok(proof),
            Mode::Revert => Err(SettleError::TransactionFailed {
                tx_hash: proof.to_string(),
            }),
            Mode::Timeout => Err(SettleError::ConfirmationTimeout {
                tx_hash: proof.to_string(),
                waited_secs: 120,
            }),
        }
    }
}
