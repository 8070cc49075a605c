//! Service wiring for CLI commands.

use std::sync::Arc;
use std::time::Duration;

use paynotify_ops::{DurableQueue, InProcessQueue, QueueBackend};
use paynotify_settle::{JsonRpcLedger, Ledger};
use paynotify_store::{Database, JobStore, SubscriberStore};
use paynotify_x402::{MaxAmount, PaymentFlowClient};
use tracing::info;

use crate::config::{CliConfig, QueueKind};
use crate::error::{CliError, CliResult};

/// Create the ledger described by `config.ledger`.
///
/// The wallet key can also come from `PAYNOTIFY_WALLET_KEY`.
pub fn build_ledger(config: &CliConfig) -> CliResult<Arc<dyn Ledger>> {
    let ledger = JsonRpcLedger::new(config.ledger_config()?)
        .map_err(|e| CliError::config(format!("ledger: {}", e)))?;

    info!(
        rpc_url = %ledger.config().rpc_url,
        chain_id = ledger.config().chain_id,
        from = %format!("{:#x}", ledger.address()),
        "Initializing ledger"
    );
    Ok(Arc::new(ledger))
}

/// Create a payment flow client for the configured gateway and ledger.
pub fn build_client(config: &CliConfig, ledger: Arc<dyn Ledger>) -> CliResult<PaymentFlowClient> {
    let mut client = PaymentFlowClient::new(config.gateway.clone(), ledger)?;
    if let Some(cap) = &config.worker.max_payment {
        let selector = MaxAmount::ether(cap)
            .map_err(|e| CliError::config(format!("worker.max_payment {:?}: {}", cap, e)))?;
        client = client.with_selector(Arc::new(selector));
    }
    Ok(client)
}

/// Open stores shared by the service commands.
pub struct ServiceContext {
    /// Effective configuration.
    pub config: CliConfig,
    /// Open database.
    pub db: Database,
    /// Job records.
    pub jobs: Arc<dyn JobStore>,
    /// Subscriber directory.
    pub subscribers: Arc<dyn SubscriberStore>,
}

impl ServiceContext {
    /// Open the database named by `config`.
    pub fn open(config: CliConfig) -> CliResult<Self> {
        let db = Database::open(config.store_config())?;
        Ok(Self::from_database(config, db))
    }

    /// Wrap an already-open database.
    pub fn from_database(config: CliConfig, db: Database) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(db.jobs.clone());
        let subscribers: Arc<dyn SubscriberStore> = Arc::new(db.subscribers.clone());
        Self {
            config,
            db,
            jobs,
            subscribers,
        }
    }

    /// The durable SQLite queue.
    pub fn durable_queue(&self) -> DurableQueue {
        DurableQueue::new(
            self.db.queue.clone(),
            Duration::from_secs(self.config.queue.visibility_timeout_secs),
            Duration::from_millis(self.config.queue.idle_poll_interval_ms),
        )
    }

    /// The queue backend selected by `queue.backend`.
    pub fn queue(&self) -> Arc<dyn QueueBackend> {
        match self.config.queue.backend {
            QueueKind::InProcess => Arc::new(InProcessQueue::new()),
            QueueKind::Durable => Arc::new(self.durable_queue()),
        }
    }
}
