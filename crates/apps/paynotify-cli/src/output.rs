//! Output formatting for command results.

use colored::Colorize;
use paynotify_store::{JobRecord, JobStatus, Subscription};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Coloured, aligned text.
    #[default]
    Human,
    /// Pretty-printed JSON.
    Json,
}

/// A command result that can be printed in either format.
pub trait Render: Serialize {
    /// Human-readable rendering.
    fn render_human(&self) -> String;

    /// Render in the requested format.
    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => self.render_human(),
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {}\"}}", e)),
        }
    }
}

fn colored_status(status: JobStatus) -> String {
    let text = status.as_str();
    match status {
        JobStatus::Queued => text.dimmed().to_string(),
        JobStatus::Running => text.cyan().to_string(),
        JobStatus::Finished => text.green().bold().to_string(),
        JobStatus::Failed => text.red().bold().to_string(),
        JobStatus::Unconfirmed => text.yellow().bold().to_string(),
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// A job record.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct JobOutput(pub JobRecord);

impl Render for JobOutput {
    fn render_human(&self) -> String {
        let job = &self.0;
        let mut lines = vec![
            format!("{} {}", "Job".bold(), job.job_id),
            format!("  Status:  {}", colored_status(job.status)),
            format!("  User:    {}", job.user_id),
            format!("  Created: {}", job.created_at.to_rfc3339()),
            format!("  Updated: {}", job.updated_at.to_rfc3339()),
        ];
        if let Some(result) = &job.result {
            lines.push(format!("  Result:  {}", result));
        }
        if let Some(error) = &job.error {
            lines.push(format!("  Error:   {}", error.red()));
        }
        if let Some(tx) = &job.payment_tx {
            lines.push(format!("  Paid in: {}", tx));
        }
        if job.status == JobStatus::Unconfirmed {
            lines.push(
                "  Payment was broadcast but not confirmed; check the transaction before retrying."
                    .yellow()
                    .to_string(),
            );
        }
        lines.join("\n")
    }
}

/// One status change seen while polling.
#[derive(Debug, Serialize)]
pub struct PollUpdate<'a> {
    /// Job id.
    pub job_id: &'a str,
    /// Status observed.
    pub status: JobStatus,
}

impl Render for PollUpdate<'_> {
    fn render_human(&self) -> String {
        format!("{} → {}", self.job_id, colored_status(self.status))
    }

    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => self.render_human(),
            // One object per line so the stream stays parseable.
            OutputFormat::Json => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Result of queueing a job.
#[derive(Debug, Serialize)]
pub struct EnqueueOutput {
    /// New job id.
    pub job_id: String,
}

impl Render for EnqueueOutput {
    fn render_human(&self) -> String {
        format!(
            "{} {}\nFollow it with: paynotify poll {}",
            "Queued job".green(),
            self.job_id,
            self.job_id
        )
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Outcome for one destination of `notify`.
#[derive(Debug, Serialize)]
pub struct DeliveryLine {
    /// Destination.
    pub destination: String,
    /// Whether the gateway accepted the message.
    pub ok: bool,
    /// Gateway response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payment already spent on a failed delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent_tx: Option<String>,
}

/// Result of `notify`.
#[derive(Debug, Serialize)]
pub struct NotifyOutput {
    /// One line per destination, in the order given.
    pub deliveries: Vec<DeliveryLine>,
}

impl NotifyOutput {
    /// Number of failed deliveries.
    pub fn failures(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.ok).count()
    }
}

impl Render for NotifyOutput {
    fn render_human(&self) -> String {
        let mut lines = Vec::new();
        for d in &self.deliveries {
            if d.ok {
                let result = d.result.as_ref().map(|r| r.to_string()).unwrap_or_default();
                lines.push(format!("{} {}  {}", "✓".green(), d.destination, result.dimmed()));
            } else {
                lines.push(format!(
                    "{} {}  {}",
                    "✗".red(),
                    d.destination,
                    d.error.as_deref().unwrap_or("failed")
                ));
                if let Some(tx) = &d.spent_tx {
                    lines.push(format!("    paid in {}", tx).yellow().to_string());
                }
            }
        }
        let sent = self.deliveries.len() - self.failures();
        lines.push(format!("{}/{} delivered", sent, self.deliveries.len()));
        lines.join("\n")
    }
}

// =============================================================================
// Subscribers
// =============================================================================

/// A single subscription.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct SubscriptionOutput(pub Subscription);

impl Render for SubscriptionOutput {
    fn render_human(&self) -> String {
        format!(
            "{} {} → {}",
            "Subscribed".green(),
            self.0.user_id.bold(),
            self.0.destination
        )
    }
}

/// Result of `unsubscribe`.
#[derive(Debug, Serialize)]
pub struct UnsubscribeOutput {
    /// Subscriber id.
    pub user_id: String,
    /// Whether a subscription existed.
    pub removed: bool,
}

impl Render for UnsubscribeOutput {
    fn render_human(&self) -> String {
        if self.removed {
            format!("Unsubscribed {}", self.user_id.bold())
        } else {
            format!("{} was not subscribed", self.user_id)
        }
    }
}

/// All subscriptions.
#[derive(Debug, Serialize)]
pub struct UsersOutput {
    /// Subscriptions, oldest first.
    pub users: Vec<Subscription>,
}

impl Render for UsersOutput {
    fn render_human(&self) -> String {
        if self.users.is_empty() {
            return "No subscribers.".dimmed().to_string();
        }
        let width = self
            .users
            .iter()
            .map(|s| s.user_id.len())
            .max()
            .unwrap_or(0);
        let mut lines = vec![format!("{} ({})", "Subscribers".bold(), self.users.len())];
        for s in &self.users {
            lines.push(format!(
                "  {:width$}  {}  {}",
                s.user_id,
                s.destination,
                s.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                width = width
            ));
        }
        lines.join("\n")
    }
}

// =============================================================================
// Info
// =============================================================================

/// Gateway statistics for a wallet.
#[derive(Debug, Serialize)]
pub struct StatsOutput {
    /// Wallet queried.
    pub address: String,
    /// Gateway response, passed through.
    pub stats: Value,
}

impl Render for StatsOutput {
    fn render_human(&self) -> String {
        let mut lines = vec![format!("{} {}", "Wallet".bold(), self.address)];
        match &self.stats {
            Value::Object(map) => {
                for (key, value) in map {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    lines.push(format!("  {}: {}", key, value));
                }
            }
            other => lines.push(format!("  {}", other)),
        }
        lines.join("\n")
    }
}

/// Summary printed when a long-running command stops.
#[derive(Debug, Serialize)]
pub struct StoppedOutput {
    /// What stopped.
    pub service: &'static str,
    /// Jobs completed.
    pub completed: u64,
    /// Redeliveries skipped.
    pub skipped: u64,
    /// Items left unacknowledged.
    pub errors: u64,
}

impl Render for StoppedOutput {
    fn render_human(&self) -> String {
        format!(
            "{} stopped: {} completed, {} skipped, {} errors",
            self.service, self.completed, self.skipped, self.errors
        )
    }
}

/// Format an error for stderr: `Error [CODE]: message` plus a hint.
pub fn format_error(err: &CliError) -> String {
    let mut out = format!(
        "{} {}",
        format!("Error [{}]:", err.code()).red().bold(),
        err
    );
    if let Some(hint) = err.suggestion() {
        out.push_str(&format!("\n{} {}", "Hint:".yellow(), hint));
    }
    out
}
