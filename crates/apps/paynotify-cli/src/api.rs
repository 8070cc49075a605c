//! HTTP job API served by `paynotify serve`.
//!
//! | Route                    | Body                          | Reply                 |
//! |--------------------------|-------------------------------|-----------------------|
//! | `POST /enqueue`          | `{user_id, message}`          | `{job_id}`            |
//! | `POST /jobs/{id}/update` | `{status, result?, error?}`   | `{ok: true}`          |
//! | `GET /jobs/{id}`         |                               | job record            |
//! | `POST /subscribe`        | `{user_id, destination}`      | subscription          |
//! | `POST /unsubscribe`      | `{user_id}`                   | `{user_id, removed}`  |
//! | `GET /users`             |                               | `[subscription]`      |
//! | `GET /health`            |                               | `{status: "ok"}`      |
//!
//! When an API key is configured every route but `/health` needs a matching
//! `x-api-key` header. Errors are `{code, error, message}`.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use paynotify_ops::{Enqueuer, OpsError};
use paynotify_store::{JobId, JobStore, JobUpdate, StoreError, SubscriberStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Header carrying the shared API key.
pub const HEADER_API_KEY: &str = "x-api-key";

const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Error body returned by every failing route.
#[derive(Serialize, Debug, Clone)]
pub struct APIError {
    /// HTTP status code.
    pub code: u16,
    /// Status reason.
    pub error: String,
    /// What went wrong.
    pub message: String,
}

impl APIError {
    /// Create an error with the given status.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_u16(),
            error: code.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl warp::reject::Reject for APIError {}

impl From<OpsError> for APIError {
    fn from(err: OpsError) -> Self {
        let code = match &err {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            OpsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OpsError::Queue(_) | OpsError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        APIError::new(code, err.to_string())
    }
}

impl From<StoreError> for APIError {
    fn from(err: StoreError) -> Self {
        let code = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        APIError::new(code, err.to_string())
    }
}

fn reject(err: impl Into<APIError>) -> Rejection {
    warp::reject::custom(err.into())
}

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    jobs: Arc<dyn JobStore>,
    subscribers: Arc<dyn SubscriberStore>,
    enqueuer: Enqueuer,
    api_key: Option<Arc<str>>,
}

impl ApiState {
    /// Create handler state.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        subscribers: Arc<dyn SubscriberStore>,
        enqueuer: Enqueuer,
        api_key: Option<String>,
    ) -> Self {
        Self {
            jobs,
            subscribers,
            enqueuer,
            api_key: api_key.map(Arc::from),
        }
    }
}

// =============================================================================
// Request bodies
// =============================================================================

/// `POST /enqueue` body.
#[derive(Debug, Deserialize, Serialize)]
pub struct EnqueueRequest {
    /// Subscriber id.
    pub user_id: String,
    /// Message text.
    pub message: String,
}

/// `POST /subscribe` body.
#[derive(Debug, Deserialize, Serialize)]
pub struct SubscribeRequest {
    /// Subscriber id.
    pub user_id: String,
    /// Destination chat id.
    #[serde(alias = "chat_id")]
    pub destination: String,
}

/// `POST /unsubscribe` body.
#[derive(Debug, Deserialize, Serialize)]
pub struct UnsubscribeRequest {
    /// Subscriber id.
    pub user_id: String,
}

// =============================================================================
// Routes
// =============================================================================

fn with_state(state: ApiState) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn with_api_key(expected: Option<Arc<str>>) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>(HEADER_API_KEY)
        .and_then(move |provided: Option<String>| {
            let expected = expected.clone();
            async move {
                match expected {
                    None => Ok(()),
                    Some(key) if provided.as_deref() == Some(&*key) => Ok(()),
                    Some(_) => Err(reject(APIError::new(
                        StatusCode::UNAUTHORIZED,
                        "missing or invalid x-api-key header",
                    ))),
                }
            }
        })
        .untuple_one()
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn api_routes(state: ApiState) -> BoxedFilter<(Box<dyn Reply>,)> {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"status": "ok"})));

    let enqueue = warp::path!("enqueue")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(enqueue_handler);

    let update_job = warp::path!("jobs" / String / "update")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(update_job_handler);

    let get_job = warp::path!("jobs" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_job_handler);

    let subscribe = warp::path!("subscribe")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(subscribe_handler);

    let unsubscribe = warp::path!("unsubscribe")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(unsubscribe_handler);

    let users = warp::path!("users")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(users_handler);

    let protected = with_api_key(state.api_key.clone()).and(
        enqueue
            .or(update_job)
            .or(get_job)
            .or(subscribe)
            .or(unsubscribe)
            .or(users),
    );

    health
        .or(protected)
        .with(warp::trace::request())
        .map(|reply| Box::new(reply) as Box<dyn Reply>)
        .boxed()
}

/// All routes, with optional static files at `/`, and JSON errors.
pub fn routes(
    state: ApiState,
    static_dir: Option<PathBuf>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let api = api_routes(state);
    let all = match static_dir {
        Some(dir) => api
            .or(warp::fs::dir(dir).map(|file| Box::new(file) as Box<dyn Reply>))
            .unify()
            .boxed(),
        None => api,
    };
    all.recover(handle_rejection)
}

/// Bind the API to `address`. The returned future serves until `shutdown`
/// resolves.
pub fn bind(
    state: ApiState,
    static_dir: Option<PathBuf>,
    address: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), warp::Error> {
    let (bound, server) = warp::serve(routes(state, static_dir))
        .try_bind_with_graceful_shutdown(address, shutdown)?;
    info!(address = %bound, "Job API listening");
    Ok((bound, async move {
        server.await;
        info!("Job API stopped");
    }))
}

// =============================================================================
// Handlers
// =============================================================================

async fn enqueue_handler(state: ApiState, body: EnqueueRequest) -> Result<impl Reply, Rejection> {
    let job_id = state
        .enqueuer
        .enqueue(&body.user_id, &body.message)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&json!({ "job_id": job_id })))
}

async fn update_job_handler(
    id: String,
    state: ApiState,
    update: JobUpdate,
) -> Result<impl Reply, Rejection> {
    let job_id = JobId::new(id);
    update
        .check_fields()
        .map_err(|e| reject(APIError::new(StatusCode::BAD_REQUEST, e.to_string())))?;

    match state.jobs.get(&job_id).await {
        Ok(current) if !current.status.can_transition_to(update.status) => {
            // Applied anyway: external writers own their ordering.
            warn!(
                job_id = %job_id,
                from = %current.status,
                to = %update.status,
                "Job update moves status backwards"
            );
        }
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            debug!(job_id = %job_id, "Update for unknown job creates it");
        }
        Err(e) => return Err(reject(e)),
    }

    state
        .jobs
        .apply_update(&job_id, update)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&json!({ "ok": true })))
}

async fn get_job_handler(id: String, state: ApiState) -> Result<impl Reply, Rejection> {
    let record = state.jobs.get(&JobId::new(id)).await.map_err(reject)?;
    Ok(warp::reply::json(&record))
}

async fn subscribe_handler(
    state: ApiState,
    body: SubscribeRequest,
) -> Result<impl Reply, Rejection> {
    if body.user_id.trim().is_empty() || body.destination.trim().is_empty() {
        return Err(reject(APIError::new(
            StatusCode::BAD_REQUEST,
            "user_id and destination are required",
        )));
    }
    let subscription = state
        .subscribers
        .subscribe(&body.user_id, &body.destination)
        .await
        .map_err(reject)?;
    info!(user_id = %subscription.user_id, "Subscriber registered");
    Ok(warp::reply::json(&subscription))
}

async fn unsubscribe_handler(
    state: ApiState,
    body: UnsubscribeRequest,
) -> Result<impl Reply, Rejection> {
    let removed = state
        .subscribers
        .unsubscribe(&body.user_id)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(
        &json!({ "user_id": body.user_id, "removed": removed }),
    ))
}

async fn users_handler(state: ApiState) -> Result<impl Reply, Rejection> {
    let users = state.subscribers.list().await.map_err(reject)?;
    Ok(warp::reply::json(&users))
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let api_error = if let Some(api_error) = err.find::<APIError>() {
        api_error.clone()
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        APIError::new(StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        APIError::new(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
    } else if err.is_not_found() {
        APIError::new(StatusCode::NOT_FOUND, "no such route")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        APIError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else {
        warn!(rejection = ?err, "Unhandled rejection");
        APIError::new(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
    };

    let status = api_error.status();
    Ok(warp::reply::with_status(warp::reply::json(&api_error), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paynotify_ops::InProcessQueue;
    use paynotify_store::{JobStatus, MemoryJobStore, MemorySubscriberStore};
    use serde_json::Value;

    struct Fixture {
        jobs: Arc<MemoryJobStore>,
        subscribers: Arc<MemorySubscriberStore>,
        state: ApiState,
    }

    fn fixture(api_key: Option<&str>) -> Fixture {
        fixture_with_queue(api_key, InProcessQueue::new())
    }

    fn fixture_with_queue(api_key: Option<&str>, queue: InProcessQueue) -> Fixture {
        let jobs = Arc::new(MemoryJobStore::new());
        let subscribers = Arc::new(MemorySubscriberStore::new());
        let enqueuer = Enqueuer::new(jobs.clone(), subscribers.clone(), Arc::new(queue));
        let state = ApiState::new(
            jobs.clone(),
            subscribers.clone(),
            enqueuer,
            api_key.map(String::from),
        );
        Fixture {
            jobs,
            subscribers,
            state,
        }
    }

    fn body(resp: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture(Some("secret"));
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes(f.state, None))
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(body(&resp)["status"], "ok");
    }

    #[tokio::test]
    async fn test_enqueue_then_get() {
        let f = fixture(None);
        f.subscribers.subscribe("alice", "1001").await.unwrap();
        let filter = routes(f.state, None);

        let resp = warp::test::request()
            .method("POST")
            .path("/enqueue")
            .json(&json!({"user_id": "alice", "message": "hi"}))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 200);
        let job_id = body(&resp)["job_id"].as_str().unwrap().to_string();

        let resp = warp::test::request()
            .method("GET")
            .path(&format!("/jobs/{}", job_id))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 200);
        let record = body(&resp);
        assert_eq!(record["status"], "queued");
        assert_eq!(record["user_id"], "alice");
        assert_eq!(record["error"], Value::Null);
    }

    #[tokio::test]
    async fn test_enqueue_unknown_user_is_404() {
        let f = fixture(None);
        let resp = warp::test::request()
            .method("POST")
            .path("/enqueue")
            .json(&json!({"user_id": "ghost", "message": "hi"}))
            .reply(&routes(f.state, None))
            .await;

        assert_eq!(resp.status(), 404);
        let err = body(&resp);
        assert_eq!(err["code"], 404);
        assert_eq!(err["error"], "Not Found");
        assert!(err["message"].as_str().unwrap().contains("ghost"));
        assert!(f.jobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_enqueue_to_full_queue_is_503() {
        let f = fixture_with_queue(None, InProcessQueue::with_capacity(1));
        f.subscribers.subscribe("alice", "1001").await.unwrap();
        let filter = routes(f.state, None);

        let statuses = {
            let mut statuses = Vec::new();
            for _ in 0..2 {
                let resp = warp::test::request()
                    .method("POST")
                    .path("/enqueue")
                    .json(&json!({"user_id": "alice", "message": "hi"}))
                    .reply(&filter)
                    .await;
                statuses.push(resp.status().as_u16());
            }
            statuses
        };
        assert_eq!(statuses, vec![200, 503]);
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_404() {
        let f = fixture(None);
        let resp = warp::test::request()
            .method("GET")
            .path("/jobs/nope")
            .reply(&routes(f.state, None))
            .await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_update_applies_even_backwards() {
        let f = fixture(None);
        let job_id = JobId::new("job-1");
        f.jobs
            .apply_update(&job_id, JobUpdate::finished(json!({"ok": true})))
            .await
            .unwrap();

        let resp = warp::test::request()
            .method("POST")
            .path("/jobs/job-1/update")
            .json(&json!({"status": "running"}))
            .reply(&routes(f.state, None))
            .await;

        assert_eq!(resp.status(), 200);
        assert_eq!(body(&resp), json!({"ok": true}));
        let record = f.jobs.get(&job_id).await.unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.result, None);
    }

    #[tokio::test]
    async fn test_update_fields_must_match_status() {
        let f = fixture(None);
        let job_id = JobId::new("job-1");
        f.jobs.apply_update(&job_id, JobUpdate::running()).await.unwrap();
        let filter = routes(f.state, None);

        for bad in [
            json!({"status": "failed", "result": {"ok": true}}),
            json!({"status": "running", "result": "early"}),
            json!({"status": "finished", "error": "boom"}),
            json!({"status": "queued", "error": "boom"}),
        ] {
            let resp = warp::test::request()
                .method("POST")
                .path("/jobs/job-1/update")
                .json(&bad)
                .reply(&filter)
                .await;
            assert_eq!(resp.status(), 400, "{} should be rejected", bad);
        }

        let record = f.jobs.get(&job_id).await.unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.result, None);
        assert_eq!(record.error, None);

        let resp = warp::test::request()
            .method("POST")
            .path("/jobs/job-1/update")
            .json(&json!({"status": "unconfirmed", "error": "receipt pending"}))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_update_with_bad_status_is_400() {
        let f = fixture(None);
        let resp = warp::test::request()
            .method("POST")
            .path("/jobs/job-1/update")
            .json(&json!({"status": "exploded"}))
            .reply(&routes(f.state, None))
            .await;
        assert_eq!(resp.status(), 400);
        assert_eq!(body(&resp)["code"], 400);
    }

    #[tokio::test]
    async fn test_subscriber_crud() {
        let f = fixture(None);
        let filter = routes(f.state, None);

        let resp = warp::test::request()
            .method("POST")
            .path("/subscribe")
            .json(&json!({"user_id": "alice", "chat_id": "1001"}))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(body(&resp)["destination"], "1001");

        let resp = warp::test::request()
            .method("GET")
            .path("/users")
            .reply(&filter)
            .await;
        assert_eq!(body(&resp).as_array().unwrap().len(), 1);

        let resp = warp::test::request()
            .method("POST")
            .path("/unsubscribe")
            .json(&json!({"user_id": "alice"}))
            .reply(&filter)
            .await;
        assert_eq!(body(&resp)["removed"], true);
        assert_eq!(f.subscribers.resolve("alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let f = fixture(Some("secret"));
        let filter = routes(f.state, None);

        let resp = warp::test::request()
            .method("GET")
            .path("/users")
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 401);
        assert_eq!(body(&resp)["code"], 401);

        let resp = warp::test::request()
            .method("GET")
            .path("/users")
            .header(HEADER_API_KEY, "wrong")
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 401);

        let resp = warp::test::request()
            .method("GET")
            .path("/users")
            .header(HEADER_API_KEY, "secret")
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let f = fixture(None);
        let resp = warp::test::request()
            .method("GET")
            .path("/nowhere")
            .reply(&routes(f.state, None))
            .await;
        assert_eq!(resp.status(), 404);
        assert_eq!(body(&resp)["code"], 404);
    }

    #[tokio::test]
    async fn test_static_dir_served() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>paynotify</h1>").unwrap();
        let f = fixture(Some("secret"));

        let resp = warp::test::request()
            .method("GET")
            .path("/index.html")
            .reply(&routes(f.state, Some(dir.path().to_path_buf())))
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body().as_ref(), b"<h1>paynotify</h1>");
    }
}
