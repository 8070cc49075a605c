//! Deliver a message right away.

use std::sync::Arc;

use paynotify_ops::{fan_out, FanOutOutcome, OpsError};
use paynotify_settle::PaymentProof;
use paynotify_x402::Notifier;

use crate::config::CliConfig;
use crate::context::{build_client, build_ledger};
use crate::error::{CliError, CliResult};
use crate::output::{DeliveryLine, NotifyOutput, OutputFormat, Render};

/// Execute the notify command.
///
/// A single destination propagates its error. With several, the command
/// fails if any delivery failed and the error carries the full summary.
pub async fn notify(
    config: CliConfig,
    format: OutputFormat,
    destinations: Vec<String>,
    message: &str,
    proof: Option<String>,
) -> CliResult<String> {
    if message.trim().is_empty() {
        return Err(CliError::user("message must not be empty"));
    }
    if proof.is_some() && destinations.len() != 1 {
        return Err(CliError::user(
            "--proof pays for one delivery; give exactly one destination",
        ));
    }

    let ledger = build_ledger(&config)?;
    let notifier: Arc<dyn Notifier> = Arc::new(build_client(&config, ledger)?);
    let proof = proof.map(PaymentProof::new);

    let output = deliver(
        notifier,
        destinations,
        message,
        proof.as_ref(),
        config.worker.max_fan_out,
    )
    .await?;

    summarize(&output, format)
}

/// Render the summary; any failed delivery turns it into the error's output.
fn summarize(output: &NotifyOutput, format: OutputFormat) -> CliResult<String> {
    let rendered = output.render(format);
    let failed = output.failures();
    if failed > 0 {
        return Err(CliError::PartialFailure {
            message: format!("{} of {} deliveries failed", failed, output.deliveries.len()),
            output: rendered,
        });
    }
    Ok(rendered)
}

/// Send to one destination directly, or to several through [`fan_out`].
pub async fn deliver(
    notifier: Arc<dyn Notifier>,
    destinations: Vec<String>,
    message: &str,
    proof: Option<&PaymentProof>,
    max_fan_out: usize,
) -> CliResult<NotifyOutput> {
    if let [destination] = destinations.as_slice() {
        let result = notifier.notify(destination, message, proof).await?;
        return Ok(NotifyOutput {
            deliveries: vec![DeliveryLine {
                destination: destination.clone(),
                ok: true,
                result: Some(result),
                error: None,
                spent_tx: None,
            }],
        });
    }

    let outcomes = fan_out(notifier, destinations, message, max_fan_out).await;
    Ok(NotifyOutput {
        deliveries: outcomes.into_iter().map(delivery_line).collect(),
    })
}

fn delivery_line(outcome: FanOutOutcome) -> DeliveryLine {
    match outcome.result {
        Ok(result) => DeliveryLine {
            destination: outcome.destination,
            ok: true,
            result: Some(result),
            error: None,
            spent_tx: None,
        },
        Err(e) => DeliveryLine {
            destination: outcome.destination,
            ok: false,
            result: None,
            spent_tx: spent_tx(&e),
            error: Some(e.to_string()),
        },
    }
}

fn spent_tx(err: &OpsError) -> Option<String> {
    match err {
        OpsError::Notify(e) => e.spent_proof().map(ToString::to_string),
        _ => None,
    }
}
