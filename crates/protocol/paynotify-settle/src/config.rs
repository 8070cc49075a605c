//! Configuration for the JSON-RPC ledger.

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SettleError, SettleResult};

/// Default RPC endpoint (Base Sepolia).
pub const DEFAULT_RPC_URL: &str = "https://sepolia.base.org";

/// Default chain id (Base Sepolia).
pub const DEFAULT_CHAIN_ID: u64 = 84532;

/// Configuration for [`JsonRpcLedger`](crate::JsonRpcLedger).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint the signed transactions are sent to
    pub rpc_url: String,

    /// EIP-155 chain id the signer commits to
    pub chain_id: u64,

    /// Hex private key of the paying account
    #[serde(skip_serializing_if = "String::is_empty")]
    pub private_key: String,

    /// How long `pay` waits for a receipt before giving up
    #[serde(with = "duration_ms", rename = "confirmation_timeout_ms")]
    pub confirmation_timeout: Duration,

    /// Interval between receipt polls
    #[serde(with = "duration_ms", rename = "poll_interval_ms")]
    pub poll_interval: Duration,

    /// Retry policy for nonce and gas price reads
    pub retry: RetryConfig,
}

impl LedgerConfig {
    /// Create a configuration for Base Sepolia paying with `private_key`.
    pub fn base_sepolia(private_key: &str) -> Self {
        Self {
            private_key: private_key.to_string(),
            ..Self::default()
        }
    }

    /// Build the local signer for the configured key and chain.
    pub fn signer(&self) -> SettleResult<LocalWallet> {
        let key = self.private_key.trim();
        let key = key
            .strip_prefix("0x")
            .or_else(|| key.strip_prefix("0X"))
            .unwrap_or(key);
        if key.is_empty() {
            return Err(SettleError::config("private_key must be set"));
        }
        let wallet: LocalWallet = key
            .parse()
            .map_err(|_| SettleError::config("private_key is not a valid secp256k1 key"))?;
        Ok(wallet.with_chain_id(self.chain_id))
    }

    /// Address of the paying account.
    pub fn payer_address(&self) -> SettleResult<Address> {
        Ok(self.signer()?.address())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SettleResult<()> {
        if self.rpc_url.is_empty() {
            return Err(SettleError::config("rpc_url must not be empty"));
        }
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(SettleError::config(format!(
                "rpc_url must be an http(s) URL: {}",
                self.rpc_url
            )));
        }
        self.signer()?;
        if self.poll_interval.is_zero() {
            return Err(SettleError::config("poll_interval_ms must be greater than 0"));
        }
        if self.confirmation_timeout < self.poll_interval {
            return Err(SettleError::config(
                "confirmation_timeout_ms must be at least poll_interval_ms",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SettleError::config("retry.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("private_key", &"<redacted>")
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            private_key: String::new(),
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base delay between retries
    #[serde(with = "duration_ms", rename = "base_delay_ms")]
    pub base_delay: Duration,
    /// Maximum delay between retries
    #[serde(with = "duration_ms", rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Durations as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (first Hardhat/Anvil account).
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const PAYER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.chain_id, 84532);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_signer_derives_payer() {
        let config = LedgerConfig::base_sepolia(KEY);
        assert_eq!(format!("{:#x}", config.payer_address().unwrap()), PAYER);
        assert_eq!(config.signer().unwrap().chain_id(), DEFAULT_CHAIN_ID);

        // Prefix is optional
        let bare = LedgerConfig::base_sepolia(&KEY[2..]);
        assert_eq!(format!("{:#x}", bare.payer_address().unwrap()), PAYER);
    }

    #[test]
    fn test_validate() {
        assert!(LedgerConfig::base_sepolia(KEY).validate().is_ok());

        // Default has no key
        assert!(matches!(
            LedgerConfig::default().validate(),
            Err(SettleError::Config(_))
        ));
        assert!(LedgerConfig::base_sepolia("0xnotakey").validate().is_err());

        let mut config = LedgerConfig::base_sepolia(KEY);
        config.rpc_url = "ftp://node".into();
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::base_sepolia(KEY);
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::base_sepolia(KEY);
        config.confirmation_timeout = Duration::from_millis(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", LedgerConfig::base_sepolia(KEY));
        assert!(!rendered.contains(&KEY[2..]));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serde_millis() {
        let config = LedgerConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["confirmation_timeout_ms"], 120_000);
        assert_eq!(json["retry"]["base_delay_ms"], 500);
        assert!(json.get("private_key").is_none());

        let parsed: LedgerConfig =
            serde_json::from_str(r#"{"private_key":"${PAYNOTIFY_WALLET_KEY}","poll_interval_ms":250}"#)
                .unwrap();
        assert_eq!(parsed.poll_interval, Duration::from_millis(250));
        assert_eq!(parsed.private_key, "${PAYNOTIFY_WALLET_KEY}");
        assert_eq!(parsed.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(parsed.retry.max_attempts, 3);
    }
}
