//! HTTP client for a running job API.

use std::time::Duration;

use async_trait::async_trait;
use paynotify_store::{JobId, JobReader, JobRecord, StoreError, StoreResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::api::{EnqueueRequest, HEADER_API_KEY};
use crate::error::{CliError, CliResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct EnqueueReply {
    job_id: JobId,
}

#[derive(Deserialize)]
struct ErrorReply {
    message: String,
}

/// Talks to `paynotify serve`.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> CliResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CliError::config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(HEADER_API_KEY, key),
            None => request,
        }
    }

    /// Queue `message` for `user_id`.
    pub async fn enqueue(&self, user_id: &str, message: &str) -> CliResult<JobId> {
        let url = format!("{}/enqueue", self.base_url);
        debug!(%url, user_id, "Enqueueing through API");

        let body = EnqueueRequest {
            user_id: user_id.to_string(),
            message: message.to_string(),
        };
        let response = self
            .authorized(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| CliError::api(format!("POST {}: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            let reply: EnqueueReply = response
                .json()
                .await
                .map_err(|e| CliError::api(format!("bad enqueue reply: {}", e)))?;
            return Ok(reply.job_id);
        }

        let message = error_message(response).await;
        if status == StatusCode::NOT_FOUND {
            Err(CliError::NotFound(message))
        } else if status.is_client_error() && status != StatusCode::UNAUTHORIZED {
            Err(CliError::user(message))
        } else {
            Err(CliError::api(format!("HTTP {}: {}", status.as_u16(), message)))
        }
    }

    /// Fetch a job record.
    pub async fn get_job(&self, job_id: &JobId) -> StoreResult<JobRecord> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::unavailable(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        if status.is_server_error() {
            return Err(StoreError::unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_message(response).await
            )));
        }
        if !status.is_success() {
            return Err(StoreError::invalid_data(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_message(response).await
            )));
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::invalid_data(format!("bad job record: {}", e)))
    }
}

#[async_trait]
impl JobReader for ApiClient {
    async fn read_job(&self, job_id: &JobId) -> StoreResult<JobRecord> {
        self.get_job(job_id).await
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorReply>(&text) {
        Ok(reply) => reply.message,
        Err(_) => text,
    }
}
