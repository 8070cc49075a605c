//! Queue a message through the job API.

use std::sync::Arc;

use crate::commands::poll::follow;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{EnqueueOutput, JobOutput, OutputFormat, PollUpdate, Render};
use crate::remote::ApiClient;

/// Execute the enqueue command.
///
/// With `wait`, follows the job like `paynotify poll` and prints the final
/// record instead of the job id.
pub async fn enqueue(
    config: CliConfig,
    format: OutputFormat,
    user_id: &str,
    message: &str,
    wait: bool,
) -> CliResult<String> {
    if user_id.trim().is_empty() || message.trim().is_empty() {
        return Err(CliError::user("user id and message must not be empty"));
    }

    let client = Arc::new(ApiClient::new(
        config.api.base_url(),
        config.api.api_key.clone(),
    )?);
    let job_id = client.enqueue(user_id, message).await?;

    if !wait {
        return Ok(EnqueueOutput {
            job_id: job_id.to_string(),
        }
        .render(format));
    }

    let record = follow(client, job_id, config.poll_config(), |record| {
        let update = PollUpdate {
            job_id: record.job_id.as_str(),
            status: record.status,
        };
        println!("{}", update.render(format));
    })
    .await?;
    Ok(JobOutput(record).render(format))
}
