//! CLI error types.

use thiserror::Error;

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error enum wrapping all crate errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline error.
    #[error("{0}")]
    Ops(#[from] paynotify_ops::OpsError),

    /// Delivery error.
    #[error("{0}")]
    Notify(#[from] paynotify_x402::NotifyError),

    /// Ledger error.
    #[error("{0}")]
    Settle(#[from] paynotify_settle::SettleError),

    /// Store error.
    #[error("{0}")]
    Store(#[from] paynotify_store::StoreError),

    /// Polling ended without a terminal status.
    #[error("{0}")]
    Poll(#[from] paynotify_ops::PollError),

    /// Job API request failed.
    #[error("API error: {0}")]
    Api(String),

    /// IO error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// User-facing error with actionable message.
    #[error("{0}")]
    User(String),

    /// Job or subscriber not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Some deliveries of a fan-out failed.
    ///
    /// `output` is the rendered per-destination summary, printed to stdout
    /// ahead of the error.
    #[error("{message}")]
    PartialFailure {
        /// What failed
        message: String,
        /// Rendered summary of every delivery
        output: String,
    },
}

impl CliError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a user-facing error.
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    /// Create an API error.
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Output the command produced before failing, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::PartialFailure { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors: 1
            Self::User(_) | Self::PartialFailure { .. } => 1,
            // Not found: 2
            Self::NotFound(_) => 2,
            Self::Ops(e) if e.is_not_found() => 2,
            Self::Store(e) if e.is_not_found() => 2,
            // Config errors: 3
            Self::Config(_) | Self::Toml(_) => 3,
            // Payment/delivery errors: 4
            Self::Notify(_) | Self::Settle(_) => 4,
            // API/network errors: 5
            Self::Api(_) => 5,
            // Store errors: 6
            Self::Store(_) => 6,
            // Polling timed out: 7
            Self::Poll(_) => 7,
            // Pipeline errors: 8
            Self::Ops(_) => 8,
            // IO errors: 9
            Self::Io(_) => 9,
            // JSON/format errors: 10
            Self::Json(_) => 10,
        }
    }

    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Toml(_) => "CONFIG",
            Self::Ops(e) if e.is_not_found() => "NOT_FOUND",
            Self::Store(e) if e.is_not_found() => "NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Notify(e) if e.funds_at_risk() => "PAYMENT_UNCONFIRMED",
            Self::Notify(_) => "DELIVERY",
            Self::Settle(_) => "PAYMENT",
            Self::Poll(_) => "POLL",
            Self::Api(_) => "API",
            Self::Store(_) => "STORE",
            Self::Ops(_) => "PIPELINE",
            Self::Io(_) => "IO",
            Self::Json(_) => "FORMAT",
            Self::User(_) => "USAGE",
            Self::PartialFailure { .. } => "PARTIAL",
        }
    }

    /// Recovery hint, if there is a useful one.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Config(_) | Self::Toml(_) => {
                Some("Check paynotify.toml, or run 'paynotify config' to print the defaults.")
            }
            Self::Ops(e) => Some(e.suggestion()),
            Self::Notify(e) => Some(e.suggestion()),
            Self::Api(_) => Some("Is 'paynotify serve' running at the configured api.url?"),
            Self::Poll(_) => Some("The job may still finish. Poll again later with 'paynotify poll <job_id>'."),
            Self::Store(_) => Some("Check the data directory, or set PAYNOTIFY_DATA_DIR."),
            _ => None,
        }
    }
}
