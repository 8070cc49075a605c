//! Sending one message to many destinations.

use std::sync::Arc;

use paynotify_x402::{DeliveryResult, Notifier};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{OpsError, OpsResult};

/// Outcome for one destination.
#[derive(Debug)]
pub struct FanOutOutcome {
    /// Where the message was sent.
    pub destination: String,
    /// Gateway response or error.
    pub result: OpsResult<DeliveryResult>,
}

impl FanOutOutcome {
    /// True if the delivery succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Deliver `message` to every destination, at most `max_concurrent` at a
/// time. Each delivery pays independently.
///
/// Returns one outcome per destination, in input order. A cap of 0 is
/// treated as 1.
pub async fn fan_out(
    notifier: Arc<dyn Notifier>,
    destinations: Vec<String>,
    message: &str,
    max_concurrent: usize,
) -> Vec<FanOutOutcome> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let message: Arc<str> = Arc::from(message);
    let mut tasks = JoinSet::new();

    for (index, destination) in destinations.iter().enumerate() {
        let notifier = Arc::clone(&notifier);
        let semaphore = Arc::clone(&semaphore);
        let message = Arc::clone(&message);
        let destination = destination.clone();
        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => notifier
                    .notify(&destination, &message, None)
                    .await
                    .map_err(OpsError::from),
                Err(_) => Err(OpsError::TaskFailed("fan-out semaphore closed".into())),
            };
            (index, result)
        });
    }

    let mut results: Vec<Option<OpsResult<DeliveryResult>>> =
        destinations.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                if let Err(e) = &result {
                    warn!(destination = %destinations[index], error = %e, "Fan-out delivery failed");
                }
                results[index] = Some(result);
            }
            Err(e) => warn!(error = %e, "Fan-out task did not complete"),
        }
    }

    let outcomes: Vec<FanOutOutcome> = destinations
        .into_iter()
        .zip(results)
        .map(|(destination, result)| {
            let result = result.unwrap_or_else(|| {
                Err(OpsError::TaskFailed(format!("delivery to {} aborted", destination)))
            });
            FanOutOutcome {
                destination,
                result,
            }
        })
        .collect();

    let delivered = outcomes.iter().filter(|o| o.is_ok()).count();
    info!(delivered, total = outcomes.len(), "Fan-out complete");
    outcomes
}

/// Run [`fan_out`] on a background task.
///
/// Dropping the handle detaches the task: deliveries continue but the
/// outcomes are discarded.
pub fn spawn_fan_out(
    notifier: Arc<dyn Notifier>,
    destinations: Vec<String>,
    message: String,
    max_concurrent: usize,
) -> JoinHandle<Vec<FanOutOutcome>> {
    debug!(count = destinations.len(), "Spawning fan-out");
    tokio::spawn(async move { fan_out(notifier, destinations, &message, max_concurrent).await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paynotify_test_utils::{StubFailure, StubNotifier};
    use std::time::Duration;

    fn destinations(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chat-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_cap_is_respected() {
        let notifier = StubNotifier::new().with_delay(Duration::from_millis(20));
        let outcomes = fan_out(Arc::new(notifier.clone()), destinations(10), "hi", 3).await;

        assert_eq!(outcomes.len(), 10);
        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert_eq!(notifier.call_count(), 10);
        assert!(notifier.peak_concurrency() <= 3);
    }

    #[tokio::test]
    async fn test_outcomes_in_input_order_with_failures() {
        let notifier = StubNotifier::new().failing_for("chat-2", StubFailure::Protocol);
        let outcomes = fan_out(Arc::new(notifier), destinations(4), "hi", 2).await;

        let names: Vec<&str> = outcomes.iter().map(|o| o.destination.as_str()).collect();
        assert_eq!(names, vec!["chat-0", "chat-1", "chat-2", "chat-3"]);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[2].result, Err(OpsError::Notify(_))));
        assert!(outcomes[3].is_ok());
    }

    #[tokio::test]
    async fn test_zero_cap_still_delivers() {
        let notifier = StubNotifier::new();
        let outcomes = fan_out(Arc::new(notifier.clone()), destinations(2), "hi", 0).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(notifier.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_empty_destinations() {
        let outcomes = fan_out(Arc::new(StubNotifier::new()), Vec::new(), "hi", 4).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_fan_out_returns_outcomes() {
        let notifier = StubNotifier::new();
        let handle = spawn_fan_out(Arc::new(notifier.clone()), destinations(3), "hi".into(), 2);
        let outcomes = handle.await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(notifier.calls()[0].1, "hi");
    }
}
