//! Scripted `Notifier` for worker and fan-out tests.

use async_trait::async_trait;
use paynotify_settle::{PaymentProof, SettleError};
use paynotify_x402::{Delivery, DeliveryResult, Notifier, NotifyError, NotifyResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// How a scripted delivery fails.
#[derive(Debug, Clone)]
pub enum StubFailure {
    /// Gateway rejected the paid request.
    Delivery {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },
    /// Gateway sent something unexpected.
    Protocol,
    /// Payment confirmation timed out.
    Unconfirmed,
}

impl StubFailure {
    fn to_error(&self) -> NotifyError {
        match self {
            Self::Delivery { status, body } => NotifyError::Delivery {
                status: *status,
                body: body.clone(),
                spent: Some(PaymentProof::new(STUB_PAID_TX)),
            },
            Self::Protocol => NotifyError::protocol("unexpected response", 500, "stub"),
            Self::Unconfirmed => NotifyError::Payment(SettleError::ConfirmationTimeout {
                tx_hash: "0xstubpending".into(),
                waited_secs: 120,
            }),
        }
    }
}

struct StubInner {
    calls: Vec<(String, String, Option<String>)>,
    response: DeliveryResult,
    failures: HashMap<String, StubFailure>,
    default_failure: Option<StubFailure>,
    delay: Option<Duration>,
    /// Whether deliveries without a proof pay first.
    charges: bool,
    payments: usize,
}

/// Proof reported for every payment the stub makes.
pub const STUB_PAID_TX: &str = "0xstubpaid";

/// Notifier that answers from a script and records what it was asked.
#[derive(Clone)]
pub struct StubNotifier {
    inner: Arc<RwLock<StubInner>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for StubNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StubNotifier {
    /// Create a notifier that answers `{"ok": true}`.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StubInner {
                calls: Vec::new(),
                response: serde_json::json!({"ok": true}),
                failures: HashMap::new(),
                default_failure: None,
                delay: None,
                charges: false,
                payments: 0,
            })),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer successes with `response`.
    pub fn with_response(self, response: DeliveryResult) -> Self {
        self.inner.write().unwrap().response = response;
        self
    }

    /// Fail every delivery.
    pub fn with_failure(self, failure: StubFailure) -> Self {
        self.inner.write().unwrap().default_failure = Some(failure);
        self
    }

    /// Fail deliveries to one destination.
    pub fn failing_for(self, destination: &str, failure: StubFailure) -> Self {
        self.inner
            .write()
            .unwrap()
            .failures
            .insert(destination.to_string(), failure);
        self
    }

    /// Pay before every delivery that arrives without a proof.
    ///
    /// Successful paid deliveries report [`STUB_PAID_TX`] as their proof.
    pub fn charging(self) -> Self {
        self.inner.write().unwrap().charges = true;
        self
    }

    /// Take this long per delivery.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.write().unwrap().delay = Some(delay);
        self
    }

    // =========================================================================
    // Assertion Helpers
    // =========================================================================

    /// Every call as (destination, message, proof).
    pub fn calls(&self) -> Vec<(String, String, Option<String>)> {
        self.inner.read().unwrap().calls.clone()
    }

    /// Number of calls.
    pub fn call_count(&self) -> usize {
        self.inner.read().unwrap().calls.len()
    }

    /// Number of payments made (charging mode only).
    pub fn payment_count(&self) -> usize {
        self.inner.read().unwrap().payments
    }

    /// Highest number of deliveries observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn notify(
        &self,
        destination: &str,
        message: &str,
        proof: Option<&PaymentProof>,
    ) -> NotifyResult<DeliveryResult> {
        self.notify_paid(destination, message, proof)
            .await
            .map(|delivery| delivery.result)
    }

    async fn notify_paid(
        &self,
        destination: &str,
        message: &str,
        proof: Option<&PaymentProof>,
    ) -> NotifyResult<Delivery> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let (delay, paid, outcome) = {
            let mut inner = self.inner.write().unwrap();
            inner.calls.push((
                destination.to_string(),
                message.to_string(),
                proof.map(|p| p.to_string()),
            ));
            let paid = inner.charges && proof.is_none();
            if paid {
                inner.payments += 1;
            }
            let failure = inner
                .failures
                .get(destination)
                .or(inner.default_failure.as_ref())
                .cloned();
            (
                inner.delay,
                paid,
                failure.ok_or_else(|| inner.response.clone()),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(failure) => Err(failure.to_error()),
            Err(result) => Ok(Delivery {
                result,
                proof: if paid {
                    Some(PaymentProof::new(STUB_PAID_TX))
                } else {
                    proof.cloned()
                },
            }),
        }
    }
}
