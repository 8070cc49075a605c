//! Client side of the x402 notify exchange.
//!
//! One [`PaymentFlowClient::notify`] call is at most two HTTP round trips
//! with one on-chain payment in between:
//!
//! ```text
//! POST /notify ─► 200 ──────────────────────────────► result
//!              └► 402 {x402.accepts} ─► Ledger::pay ─► POST /notify + proof ─► 200 ─► result
//!              └► other ─► Protocol error
//! ```
//!
//! Once `pay` returns, value has moved. Every failure after that point
//! carries the proof so the caller can retry delivery without paying again.

use std::sync::Arc;

use async_trait::async_trait;
use paynotify_settle::{Ledger, PaymentProof};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::error::{NotifyError, NotifyResult};
use crate::selector::{FirstAccepted, RequirementSelector};
use crate::types::{
    DeliveryResult, GatewayConfig, NotificationRequest, PaymentChallenge, HEADER_PAYMENT_TX,
};

/// A delivered notification and the payment it was sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Gateway response body
    pub result: DeliveryResult,
    /// Proof the request carried: freshly paid or supplied by the caller
    pub proof: Option<PaymentProof>,
}

/// Something that can deliver a notification.
///
/// [`PaymentFlowClient`] is the real implementation; the worker and fan-out
/// only depend on this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `destination`, paying if required.
    ///
    /// With `proof` set, the request is sent once with that proof and no
    /// payment is attempted.
    async fn notify(
        &self,
        destination: &str,
        message: &str,
        proof: Option<&PaymentProof>,
    ) -> NotifyResult<DeliveryResult>;

    /// Like [`notify`](Self::notify), but also reports the proof used.
    ///
    /// Callers that persist progress use this to record a payment before
    /// anything else can fail.
    async fn notify_paid(
        &self,
        destination: &str,
        message: &str,
        proof: Option<&PaymentProof>,
    ) -> NotifyResult<Delivery> {
        let result = self.notify(destination, message, proof).await?;
        Ok(Delivery {
            result,
            proof: proof.cloned(),
        })
    }
}

/// Executes the 402 challenge-response flow against one gateway.
#[derive(Clone)]
pub struct PaymentFlowClient {
    http: Client,
    config: GatewayConfig,
    ledger: Arc<dyn Ledger>,
    selector: Arc<dyn RequirementSelector>,
}

/// Status and raw body of a gateway response.
struct GatewayReply {
    status: StatusCode,
    body: String,
}

impl PaymentFlowClient {
    /// Create a client that pays through `ledger`.
    pub fn new(config: GatewayConfig, ledger: Arc<dyn Ledger>) -> NotifyResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            ledger,
            selector: Arc::new(FirstAccepted),
        })
    }

    /// Replace the payment option selector.
    pub fn with_selector(mut self, selector: Arc<dyn RequirementSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Get the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Fetch delivery statistics the gateway keeps for `address`.
    ///
    /// The body is passed through untouched.
    pub async fn stats(&self, address: &str) -> NotifyResult<serde_json::Value> {
        let url = format!("{}/stats/{}", self.config.base_url(), address);
        debug!(url = %url, "Fetching gateway stats");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(NotifyError::protocol(
                "unexpected response",
                status.as_u16(),
                body,
            ));
        }
        serde_json::from_str(&body)
            .map_err(|_| NotifyError::protocol("stats response is not JSON", status.as_u16(), body))
    }

    async fn post(
        &self,
        request: &NotificationRequest,
        proof: Option<&PaymentProof>,
    ) -> Result<GatewayReply, reqwest::Error> {
        let url = format!("{}/notify", self.config.base_url());
        let mut builder = self.http.post(&url).json(request);
        if let Some(proof) = proof {
            builder = builder.header(HEADER_PAYMENT_TX, proof.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(GatewayReply { status, body })
    }

    /// Deliver with a proof the caller already holds.
    async fn deliver_with_proof(
        &self,
        request: &NotificationRequest,
        proof: &PaymentProof,
    ) -> NotifyResult<DeliveryResult> {
        debug!(tx = %proof, "Delivering with supplied proof");
        let reply = self.post(request, Some(proof)).await?;
        if reply.status == StatusCode::OK {
            return Ok(parse_result(&reply.body));
        }
        Err(NotifyError::Delivery {
            status: reply.status.as_u16(),
            body: reply.body,
            spent: None,
        })
    }

    /// Retry after paying. Every failure here carries the spent proof.
    async fn deliver_after_payment(
        &self,
        request: &NotificationRequest,
        proof: PaymentProof,
    ) -> NotifyResult<Delivery> {
        let reply = match self.post(request, Some(&proof)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(tx = %proof, error = %e, "Gateway unreachable after payment");
                return Err(NotifyError::Network {
                    message: e.to_string(),
                    spent: Some(proof),
                });
            }
        };

        if reply.status == StatusCode::OK {
            info!(tx = %proof, destination = %request.destination, "Notification delivered");
            return Ok(Delivery {
                result: parse_result(&reply.body),
                proof: Some(proof),
            });
        }

        warn!(
            tx = %proof,
            status = reply.status.as_u16(),
            "Gateway rejected delivery after payment"
        );
        Err(NotifyError::Delivery {
            status: reply.status.as_u16(),
            body: reply.body,
            spent: Some(proof),
        })
    }
}

#[async_trait]
impl Notifier for PaymentFlowClient {
    async fn notify(
        &self,
        destination: &str,
        message: &str,
        proof: Option<&PaymentProof>,
    ) -> NotifyResult<DeliveryResult> {
        self.notify_paid(destination, message, proof)
            .await
            .map(|delivery| delivery.result)
    }

    async fn notify_paid(
        &self,
        destination: &str,
        message: &str,
        proof: Option<&PaymentProof>,
    ) -> NotifyResult<Delivery> {
        let request = NotificationRequest::new(destination, message);

        if let Some(proof) = proof {
            let result = self.deliver_with_proof(&request, proof).await?;
            return Ok(Delivery {
                result,
                proof: Some(proof.clone()),
            });
        }

        debug!(destination, "Sending notification");
        let reply = self.post(&request, None).await?;

        match reply.status {
            StatusCode::OK => {
                return Ok(Delivery {
                    result: parse_result(&reply.body),
                    proof: None,
                })
            }
            StatusCode::PAYMENT_REQUIRED => {}
            other => {
                return Err(NotifyError::protocol(
                    "unexpected response",
                    other.as_u16(),
                    reply.body,
                ))
            }
        }

        let status = reply.status.as_u16();
        let challenge: PaymentChallenge = match serde_json::from_str(&reply.body) {
            Ok(challenge) => challenge,
            Err(_) => {
                return Err(NotifyError::protocol(
                    "no acceptable payment method",
                    status,
                    reply.body,
                ))
            }
        };

        let requirement = match self.selector.select(challenge.accepts()) {
            Some(req) => req,
            None => {
                return Err(NotifyError::protocol(
                    "no acceptable payment method",
                    status,
                    reply.body,
                ))
            }
        };

        info!(
            pay_to = %requirement.pay_to,
            amount = %requirement.max_amount_required,
            "Payment required"
        );
        let proof = self
            .ledger
            .pay(&requirement.pay_to, &requirement.max_amount_required)
            .await?;

        self.deliver_after_payment(&request, proof).await
    }
}

/// Success bodies are JSON; anything else is kept as a string.
fn parse_result(body: &str) -> DeliveryResult {
    serde_json::from_str(body).unwrap_or_else(|_| DeliveryResult::String(body.to_string()))
}
