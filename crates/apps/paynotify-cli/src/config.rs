//! CLI configuration.

use paynotify_ops::{PollConfig, WorkerConfig};
use paynotify_settle::LedgerConfig;
use paynotify_store::StoreConfig;
use paynotify_x402::GatewayConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CliError, CliResult};

/// Expand environment variables in a string.
/// Supports `${VAR_NAME}` syntax; unset variables are left as written.
fn expand_env_vars(input: &str) -> CliResult<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| CliError::config(format!("invalid expansion pattern: {}", e)))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string())
}

/// CLI configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Notification gateway.
    pub gateway: GatewayConfig,
    /// Payment ledger (JSON-RPC node).
    pub ledger: LedgerConfig,
    /// Database location.
    pub storage: StorageSection,
    /// Work queue backend.
    pub queue: QueueSection,
    /// Job API server.
    pub api: ApiSection,
    /// Worker pool and polling.
    pub worker: WorkerSection,
}

impl CliConfig {
    /// Load configuration from a file, or defaults if it does not exist.
    ///
    /// `${VAR}` references in URLs and the API key are expanded from the
    /// environment. The wallet key is expanded later, by
    /// [`CliConfig::ledger_config`], so it never lands in a saved file.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> CliResult<Self> {
        let mut config: Self = toml::from_str(contents)?;

        config.gateway.url = expand_env_vars(&config.gateway.url)?;
        config.ledger.rpc_url = expand_env_vars(&config.ledger.rpc_url)?;
        if let Some(key) = config.api.api_key.take() {
            let key = expand_env_vars(&key)?;
            // An unset variable must not become a literal key.
            config.api.api_key = (!key.is_empty() && !key.starts_with("${")).then_some(key);
        }

        Ok(config)
    }

    /// Ledger settings with the wallet key resolved.
    ///
    /// The key comes from `ledger.private_key` (with `${VAR}` expansion) or,
    /// when that is empty, from `PAYNOTIFY_WALLET_KEY`.
    pub fn ledger_config(&self) -> CliResult<LedgerConfig> {
        let mut ledger = self.ledger.clone();
        ledger.private_key = if ledger.private_key.is_empty() {
            std::env::var("PAYNOTIFY_WALLET_KEY").unwrap_or_default()
        } else {
            expand_env_vars(&ledger.private_key)?
        };
        if ledger.private_key.is_empty() || ledger.private_key.starts_with("${") {
            return Err(CliError::config(
                "no wallet key: set ledger.private_key in paynotify.toml or PAYNOTIFY_WALLET_KEY",
            ));
        }
        Ok(ledger)
    }

    /// Load configuration from the default location.
    pub fn load_default() -> CliResult<Self> {
        Self::load(&default_config_path())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Store location for this configuration.
    pub fn store_config(&self) -> StoreConfig {
        let base_dir = self
            .storage
            .data_dir
            .clone()
            .unwrap_or_else(default_base_dir);
        let mut config = StoreConfig::new(base_dir);
        if let Some(path) = &self.storage.database {
            config = config.with_database_path(path);
        }
        config
    }

    /// Worker pool settings.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_concurrency(self.worker.concurrency)
            .with_visibility_timeout(Duration::from_secs(self.queue.visibility_timeout_secs))
            .with_idle_poll_interval(Duration::from_millis(self.queue.idle_poll_interval_ms))
    }

    /// Client-side polling settings.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.worker.poll_interval_ms.max(1)),
            timeout: Duration::from_secs(self.worker.poll_timeout_secs),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Base data directory (default: platform data dir or `PAYNOTIFY_DATA_DIR`).
    pub data_dir: Option<PathBuf>,
    /// Database file (default: `<data_dir>/paynotify.db`).
    pub database: Option<PathBuf>,
}

/// Which queue backend carries work to the workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// In-process channel; `serve` runs the workers itself.
    #[default]
    InProcess,
    /// SQLite work queue; workers may run in separate processes.
    Durable,
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    /// Backend kind.
    pub backend: QueueKind,
    /// Seconds a claimed durable item stays hidden.
    pub visibility_timeout_secs: u64,
    /// Milliseconds between polls of an empty durable queue.
    pub idle_poll_interval_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            backend: QueueKind::default(),
            visibility_timeout_secs: worker.visibility_timeout.as_secs(),
            idle_poll_interval_ms: worker.idle_poll_interval.as_millis() as u64,
        }
    }
}

/// Job API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Address `serve` listens on.
    pub listen: String,
    /// URL clients use to reach the API (default: `http://<listen>`).
    pub url: Option<String>,
    /// Shared secret required in `x-api-key` when set.
    pub api_key: Option<String>,
    /// Directory served at `/` for a dashboard, if any.
    pub static_dir: Option<PathBuf>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            url: None,
            api_key: None,
            static_dir: None,
        }
    }
}

impl ApiSection {
    /// Parsed listen address.
    pub fn listen_addr(&self) -> CliResult<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| CliError::config(format!("api.listen {:?}: {}", self.listen, e)))
    }

    /// Base URL for API clients.
    pub fn base_url(&self) -> String {
        match &self.url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.listen),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Jobs processed at once.
    pub concurrency: usize,
    /// Deliveries in flight during `notify` fan-out.
    pub max_fan_out: usize,
    /// Refuse payment options above this many ether.
    pub max_payment: Option<String>,
    /// Milliseconds between job polls.
    pub poll_interval_ms: u64,
    /// Seconds before a poll gives up.
    pub poll_timeout_secs: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        let poll = PollConfig::default();
        Self {
            concurrency: WorkerConfig::default().concurrency,
            max_fan_out: 5,
            max_payment: None,
            poll_interval_ms: poll.interval.as_millis() as u64,
            poll_timeout_secs: poll.timeout.as_secs(),
        }
    }
}

/// Get the default base directory for paynotify data.
pub fn default_base_dir() -> PathBuf {
    paynotify_store::default_data_dir()
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    default_base_dir().join("paynotify.toml")
}
