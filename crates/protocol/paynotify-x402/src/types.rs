//! x402 wire types for the notify gateway.
//!
//! The gateway speaks a small dialect of x402: a `402` body carries an
//! `x402.accepts` list of payment options, and the client proves payment by
//! resending the request with the transaction hash in a header.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP header carrying the payment proof (client → gateway).
pub const HEADER_PAYMENT_TX: &str = "x-agent-payment-tx";

/// Default gateway URL.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3000";

/// Successful delivery payload returned by the gateway. Opaque to the client.
pub type DeliveryResult = serde_json::Value;

// =============================================================================
// Challenge (402 Response)
// =============================================================================

/// Body of a `402 Payment Required` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentChallenge {
    /// Human-readable reason, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable payment terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402: Option<PaymentTerms>,
}

impl PaymentChallenge {
    /// The advertised payment options, in gateway order.
    pub fn accepts(&self) -> &[PaymentRequirement] {
        self.x402
            .as_ref()
            .map(|terms| terms.accepts.as_slice())
            .unwrap_or(&[])
    }
}

/// The `x402` object of a challenge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentTerms {
    /// Protocol version advertised by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Accepted payment options.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirement>,
}

/// One accepted payment option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    /// Address to pay.
    pub pay_to: String,

    /// Amount to pay, as a decimal string in the asset's major unit.
    pub max_amount_required: String,

    /// Payment scheme (e.g. "exact").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    /// Network name (e.g. "base-sepolia").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Asset symbol (e.g. "ETH").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

impl PaymentRequirement {
    /// Create a requirement with only the mandatory fields.
    pub fn new(pay_to: impl Into<String>, max_amount_required: impl Into<String>) -> Self {
        Self {
            pay_to: pay_to.into(),
            max_amount_required: max_amount_required.into(),
            scheme: None,
            network: None,
            asset: None,
        }
    }
}

// =============================================================================
// Request
// =============================================================================

/// Payload delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Where to deliver (e.g. a chat id).
    #[serde(alias = "chat_id")]
    pub destination: String,

    /// Message body.
    pub message: String,
}

impl NotificationRequest {
    /// Create a new request.
    pub fn new(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the gateway.
    pub url: String,

    /// Per-request HTTP timeout.
    #[serde(with = "duration_ms", rename = "request_timeout_ms")]
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Create a config for the given base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
