//! Subscriber management against the local database.

use crate::config::CliConfig;
use crate::context::ServiceContext;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Render, SubscriptionOutput, UnsubscribeOutput, UsersOutput};

/// Execute the subscribe command.
pub async fn subscribe(
    config: CliConfig,
    format: OutputFormat,
    user_id: &str,
    destination: &str,
) -> CliResult<String> {
    if user_id.trim().is_empty() || destination.trim().is_empty() {
        return Err(CliError::user("user id and destination must not be empty"));
    }
    let ctx = ServiceContext::open(config)?;
    let subscription = ctx.subscribers.subscribe(user_id, destination).await?;
    Ok(SubscriptionOutput(subscription).render(format))
}

/// Execute the unsubscribe command.
pub async fn unsubscribe(config: CliConfig, format: OutputFormat, user_id: &str) -> CliResult<String> {
    let ctx = ServiceContext::open(config)?;
    let removed = ctx.subscribers.unsubscribe(user_id).await?;
    Ok(UnsubscribeOutput {
        user_id: user_id.to_string(),
        removed,
    }
    .render(format))
}

/// Execute the users command.
pub async fn users(config: CliConfig, format: OutputFormat) -> CliResult<String> {
    let ctx = ServiceContext::open(config)?;
    let users = ctx.subscribers.list().await?;
    Ok(UsersOutput { users }.render(format))
}
