//! Follow a job until it reaches a terminal status.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use paynotify_ops::{JobPoller, PollConfig, PollError};
use paynotify_store::{JobId, JobReader, JobRecord};

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::{JobOutput, OutputFormat, PollUpdate, Render};
use crate::remote::ApiClient;

/// Execute the poll command.
pub async fn poll(
    config: CliConfig,
    format: OutputFormat,
    job_id: &str,
    timeout: Option<u64>,
) -> CliResult<String> {
    let client = Arc::new(ApiClient::new(
        config.api.base_url(),
        config.api.api_key.clone(),
    )?);

    let mut poll_config = config.poll_config();
    if let Some(secs) = timeout {
        poll_config.timeout = Duration::from_secs(secs);
    }

    let record = follow(client, JobId::new(job_id), poll_config, |record| {
        let update = PollUpdate {
            job_id: record.job_id.as_str(),
            status: record.status,
        };
        println!("{}", update.render(format));
    })
    .await?;

    Ok(JobOutput(record).render(format))
}

/// Poll `job_id` through `reader`, calling `on_change` for every status
/// change, and return the terminal record.
pub async fn follow<R, F>(
    reader: Arc<R>,
    job_id: JobId,
    poll: PollConfig,
    mut on_change: F,
) -> CliResult<JobRecord>
where
    R: JobReader + ?Sized,
    F: FnMut(&JobRecord),
{
    let stream = JobPoller::new(reader, job_id, poll.interval, poll.timeout).into_stream();
    futures::pin_mut!(stream);

    while let Some(update) = stream.next().await {
        let record = update?;
        on_change(&record);
        if record.is_terminal() {
            return Ok(record);
        }
    }
    Err(PollError::Ended.into())
}
