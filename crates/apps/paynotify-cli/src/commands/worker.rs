//! Run workers against the durable queue without the API.

use std::sync::Arc;

use paynotify_ops::{OpsError, Worker, WorkerPool};
use tracing::info;

use crate::config::{CliConfig, QueueKind};
use crate::context::{build_client, build_ledger, ServiceContext};
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Render, StoppedOutput};
use crate::signals;

/// Execute the worker command.
pub async fn worker(
    config: CliConfig,
    format: OutputFormat,
    concurrency: Option<usize>,
) -> CliResult<String> {
    if config.queue.backend != QueueKind::Durable {
        return Err(CliError::config(
            "'paynotify worker' reads the durable queue; set queue.backend = \"durable\"",
        ));
    }

    let ctx = ServiceContext::open(config)?;
    let ledger = build_ledger(&ctx.config)?;
    let client = build_client(&ctx.config, ledger)?;

    let mut worker_config = ctx.config.worker_config();
    if let Some(n) = concurrency {
        worker_config = worker_config.with_concurrency(n);
    }

    let queue = ctx.durable_queue();
    match queue.depth() {
        Ok(depth) => info!(depth, concurrency = worker_config.concurrency, "Worker starting"),
        Err(e) => info!(error = %e, "Worker starting, queue depth unknown"),
    }

    let worker = Worker::new(ctx.jobs.clone(), Arc::new(client));
    let stats = WorkerPool::new(worker, Arc::new(queue), &worker_config)
        .spawn(signals::shutdown_signal())
        .await
        .map_err(|e| CliError::Ops(OpsError::TaskFailed(e.to_string())))??;

    Ok(StoppedOutput {
        service: "worker",
        completed: stats.completed,
        skipped: stats.skipped,
        errors: stats.errors,
    }
    .render(format))
}
