//! Ledger backed by an Ethereum-style JSON-RPC node.
//!
//! Transfers are signed in-process with the configured key and submitted
//! with `eth_sendRawTransaction`, so any public endpoint can carry them.

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionReceipt, TransactionRequest, U256, U64};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::{SettleError, SettleResult};
use crate::retry::RetryPolicy;
use crate::traits::Ledger;
use crate::types::{parse_address, parse_amount, PaymentProof};

/// Gas limit of a plain value transfer.
const TRANSFER_GAS: u64 = 21_000;

/// Gas price used when the node cannot quote one (1 gwei).
const FALLBACK_GAS_PRICE: u64 = 1_000_000_000;

/// Ledger that pays through a JSON-RPC node.
pub struct JsonRpcLedger {
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
    config: LedgerConfig,
    retry_policy: RetryPolicy,
}

impl JsonRpcLedger {
    /// Create a new ledger client.
    ///
    /// Validates the configuration and loads the signer; no request is made
    /// until the first payment.
    pub fn new(config: LedgerConfig) -> SettleResult<Self> {
        config.validate()?;

        let wallet = config.signer()?;
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| SettleError::config(format!("invalid rpc_url {}: {}", config.rpc_url, e)))?
            .interval(config.poll_interval);

        Ok(Self {
            client: SignerMiddleware::new(provider, wallet),
            retry_policy: RetryPolicy::from_config(&config.retry),
            config,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Address the payments are sent from.
    pub fn address(&self) -> Address {
        self.client.signer().address()
    }

    async fn next_nonce(&self) -> SettleResult<U256> {
        let from = self.address();
        self.retry_policy
            .execute(|| async move {
                self.client
                    .inner()
                    .get_transaction_count(from, None)
                    .await
                    .map_err(SettleError::from)
            })
            .await
    }

    async fn gas_price(&self) -> U256 {
        let quoted = self
            .retry_policy
            .execute(|| async move {
                self.client
                    .inner()
                    .get_gas_price()
                    .await
                    .map_err(SettleError::from)
            })
            .await;

        quoted.unwrap_or_else(|e| {
            warn!(error = %e, "Gas price unavailable, using 1 gwei");
            U256::from(FALLBACK_GAS_PRICE)
        })
    }

    fn unconfirmed(&self, tx_hash: String, started: Instant) -> SettleError {
        SettleError::ConfirmationTimeout {
            tx_hash,
            waited_secs: started.elapsed().as_secs(),
        }
    }
}

/// Turn a mined receipt into a proof, or report the revert.
fn settle_receipt(tx_hash: String, receipt: &TransactionReceipt) -> SettleResult<PaymentProof> {
    // Receipts without a status field predate EIP-658 and mean mined.
    if receipt.status == Some(U64::zero()) {
        return Err(SettleError::TransactionFailed { tx_hash });
    }
    info!(tx_hash = %tx_hash, block = ?receipt.block_number, "Payment confirmed");
    Ok(PaymentProof::new(tx_hash))
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn pay(&self, recipient: &str, amount: &str) -> SettleResult<PaymentProof> {
        let to = parse_address(recipient)?;
        let value = parse_amount(amount)?;

        let nonce = self.next_nonce().await?;
        let gas_price = self.gas_price().await;
        let tx = TransactionRequest::new()
            .from(self.address())
            .to(to)
            .value(value)
            .gas(TRANSFER_GAS)
            .gas_price(gas_price)
            .nonce(nonce)
            .chain_id(self.config.chain_id);

        info!(
            recipient,
            amount,
            wei = %value,
            nonce = %nonce,
            chain_id = self.config.chain_id,
            "Sending payment"
        );

        // Never retried: a second send could pay twice.
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| SettleError::broadcast(e.to_string()))?;
        let tx_hash = format!("{:#x}", pending.tx_hash());
        debug!(tx_hash = %tx_hash, "Payment broadcast, awaiting receipt");

        let started = Instant::now();
        match timeout(self.config.confirmation_timeout, pending.confirmations(1)).await {
            Ok(Ok(Some(receipt))) => settle_receipt(tx_hash, &receipt),
            Ok(Ok(None)) => {
                warn!(tx_hash = %tx_hash, "Transaction not found after broadcast");
                Err(self.unconfirmed(tx_hash, started))
            }
            Ok(Err(e)) => {
                warn!(tx_hash = %tx_hash, error = %e, "Confirmation wait failed");
                Err(self.unconfirmed(tx_hash, started))
            }
            Err(_) => Err(self.unconfirmed(tx_hash, started)),
        }
    }
}
