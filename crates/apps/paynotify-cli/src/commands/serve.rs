//! Run the job API, and the worker pool unless told not to.

use std::sync::Arc;

use paynotify_ops::{DeliveryGuarantee, Enqueuer, OpsError, PoolStats, Worker, WorkerPool};
use tracing::info;

use crate::api::{self, ApiState};
use crate::config::CliConfig;
use crate::context::{build_client, build_ledger, ServiceContext};
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Render, StoppedOutput};
use crate::signals;

/// Execute the serve command.
///
/// Blocks until SIGINT or SIGTERM, then stops accepting requests and lets
/// in-flight jobs finish.
pub async fn serve(config: CliConfig, format: OutputFormat, no_workers: bool) -> CliResult<String> {
    let ctx = ServiceContext::open(config)?;
    let queue = ctx.queue();

    if no_workers && queue.guarantee() == DeliveryGuarantee::AtMostOnce {
        return Err(CliError::config(
            "--no-workers needs queue.backend = \"durable\": \
             in-process work is only visible to this process",
        ));
    }

    // Build the worker before binding so a bad ledger config fails fast.
    let pool = if no_workers {
        None
    } else {
        let ledger = build_ledger(&ctx.config)?;
        let client = build_client(&ctx.config, ledger)?;
        let worker = Worker::new(ctx.jobs.clone(), Arc::new(client));
        Some(WorkerPool::new(
            worker,
            queue.clone(),
            &ctx.config.worker_config(),
        ))
    };

    let enqueuer = Enqueuer::new(ctx.jobs.clone(), ctx.subscribers.clone(), queue.clone());
    let state = ApiState::new(
        ctx.jobs.clone(),
        ctx.subscribers.clone(),
        enqueuer,
        ctx.config.api.api_key.clone(),
    );

    let listen = ctx.config.api.listen_addr()?;
    let shutdown = signals::shutdown_signal();
    let (_, server) = api::bind(
        state,
        ctx.config.api.static_dir.clone(),
        listen,
        signals::wait_for(shutdown.clone()),
    )
    .map_err(|e| CliError::api(format!("cannot listen on {}: {}", listen, e)))?;

    let pool = pool.map(|pool| pool.spawn(shutdown.clone()));
    info!(
        workers = pool.is_some(),
        guarantee = ?queue.guarantee(),
        "Service started"
    );

    server.await;
    queue.close();

    let stats = match pool {
        Some(handle) => handle
            .await
            .map_err(|e| CliError::Ops(OpsError::TaskFailed(e.to_string())))??,
        None => PoolStats::default(),
    };

    Ok(StoppedOutput {
        service: "serve",
        completed: stats.completed,
        skipped: stats.skipped,
        errors: stats.errors,
    }
    .render(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_no_workers_needs_durable_queue() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = CliConfig::default();
        config.storage.data_dir = Some(temp_dir.path().to_path_buf());
        config.queue.backend = QueueKind::InProcess;

        let err = serve(config, OutputFormat::Human, true).await.unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[tokio::test]
    async fn test_workers_need_wallet_key() {
        if std::env::var("PAYNOTIFY_WALLET_KEY").is_ok() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let mut config = CliConfig::default();
        config.storage.data_dir = Some(temp_dir.path().to_path_buf());

        let err = serve(config, OutputFormat::Human, false).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
