//! JsonRpcLedger against a stubbed JSON-RPC node.

use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};
use paynotify_settle::{JsonRpcLedger, Ledger, LedgerConfig, RetryConfig, SettleError};
use serde_json::{json, Value};

// First Hardhat/Anvil development account.
const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const PAYER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const RECIPIENT: &str = "0x1234567890123456789012345678901234567890";
const TX: &str = "0x9f2c000000000000000000000000000000000000000000000000000000000001";
const BLOCK_HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000bb";

fn ledger_for(url: &str, confirmation_timeout: Duration) -> JsonRpcLedger {
    JsonRpcLedger::new(LedgerConfig {
        rpc_url: url.to_string(),
        chain_id: 84532,
        private_key: KEY.to_string(),
        confirmation_timeout,
        poll_interval: Duration::from_millis(20),
        retry: RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
        },
    })
    .unwrap()
}

fn rpc_result(result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string()
}

fn rpc(server: &mut ServerGuard, method: &str, result: Value) -> Mock {
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": method})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(result))
}

/// Node answers for everything before and around the broadcast.
async fn account_state(server: &mut ServerGuard) {
    rpc(server, "eth_getTransactionCount", json!("0x7")).create_async().await;
    rpc(server, "eth_gasPrice", json!("0x3b9aca00")).create_async().await;
    rpc(server, "eth_blockNumber", json!("0x2a")).create_async().await;
}

fn mined_tx() -> Value {
    json!({
        "hash": TX,
        "nonce": "0x7",
        "blockHash": BLOCK_HASH,
        "blockNumber": "0x2a",
        "transactionIndex": "0x0",
        "from": PAYER,
        "to": RECIPIENT,
        "value": "0x5af3107a4000",
        "gasPrice": "0x3b9aca00",
        "gas": "0x5208",
        "input": "0x",
        "v": "0x1",
        "r": "0x1",
        "s": "0x1",
        "type": "0x0"
    })
}

fn receipt(status: &str) -> Value {
    json!({
        "transactionHash": TX,
        "transactionIndex": "0x0",
        "blockHash": BLOCK_HASH,
        "blockNumber": "0x2a",
        "from": PAYER,
        "to": RECIPIENT,
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "status": status,
        "type": "0x0",
        "effectiveGasPrice": "0x3b9aca00"
    })
}

#[tokio::test]
async fn test_pay_signs_locally_and_returns_tx_hash() {
    let mut server = Server::new_async().await;
    account_state(&mut server).await;

    let unsigned = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_sendTransaction"})))
        .expect(0)
        .create_async()
        .await;
    let raw = rpc(&mut server, "eth_sendRawTransaction", json!(TX))
        .expect(1)
        .create_async()
        .await;
    rpc(&mut server, "eth_getTransactionByHash", mined_tx()).create_async().await;
    rpc(&mut server, "eth_getTransactionReceipt", receipt("0x1")).create_async().await;

    let ledger = ledger_for(&server.url(), Duration::from_secs(5));
    let proof = ledger.pay(RECIPIENT, "0.0001").await.unwrap();

    assert_eq!(proof.as_str(), TX);
    raw.assert_async().await;
    unsigned.assert_async().await;
}

#[tokio::test]
async fn test_reverted_transaction_fails() {
    let mut server = Server::new_async().await;
    account_state(&mut server).await;
    rpc(&mut server, "eth_sendRawTransaction", json!(TX)).create_async().await;
    rpc(&mut server, "eth_getTransactionByHash", mined_tx()).create_async().await;
    rpc(&mut server, "eth_getTransactionReceipt", receipt("0x0")).create_async().await;

    let ledger = ledger_for(&server.url(), Duration::from_secs(5));
    let err = ledger.pay(RECIPIENT, "0.0001").await.unwrap_err();

    assert!(matches!(err, SettleError::TransactionFailed { ref tx_hash } if tx_hash == TX));
    assert!(!err.is_ambiguous());
}

#[tokio::test]
async fn test_missing_receipt_times_out_ambiguously() {
    let mut server = Server::new_async().await;
    account_state(&mut server).await;
    let raw = rpc(&mut server, "eth_sendRawTransaction", json!(TX))
        .expect(1)
        .create_async()
        .await;
    rpc(&mut server, "eth_getTransactionByHash", mined_tx()).create_async().await;
    rpc(&mut server, "eth_getTransactionReceipt", Value::Null).create_async().await;

    let ledger = ledger_for(&server.url(), Duration::from_millis(300));
    let err = ledger.pay(RECIPIENT, "0.0001").await.unwrap_err();

    assert!(err.is_ambiguous());
    assert_eq!(err.broadcast_tx(), Some(TX));
    raw.assert_async().await;
}

#[tokio::test]
async fn test_broadcast_rejection_is_not_retried() {
    let mut server = Server::new_async().await;
    account_state(&mut server).await;

    let send = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_sendRawTransaction"})))
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "insufficient funds for gas * price + value"}
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let receipt = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_getTransactionReceipt"})))
        .expect(0)
        .create_async()
        .await;

    let ledger = ledger_for(&server.url(), Duration::from_secs(1));
    let err = ledger.pay(RECIPIENT, "1").await.unwrap_err();

    assert!(matches!(err, SettleError::Broadcast(ref m) if m.contains("insufficient funds")));
    assert!(err.broadcast_tx().is_none());
    send.assert_async().await;
    receipt.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_nonce_read_sends_nothing() {
    let mut server = Server::new_async().await;

    let nonce = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_getTransactionCount"})))
        .with_status(503)
        .with_body("upstream unavailable")
        .expect(2)
        .create_async()
        .await;
    let raw = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_sendRawTransaction"})))
        .expect(0)
        .create_async()
        .await;

    let ledger = ledger_for(&server.url(), Duration::from_secs(1));
    let err = ledger.pay(RECIPIENT, "0.5").await.unwrap_err();

    assert!(matches!(err, SettleError::Network(_)));
    assert!(err.broadcast_tx().is_none());
    nonce.assert_async().await;
    raw.assert_async().await;
}

#[tokio::test]
async fn test_gas_price_falls_back_when_unquoted() {
    let mut server = Server::new_async().await;
    rpc(&mut server, "eth_getTransactionCount", json!("0x0")).create_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_gasPrice"})))
        .with_status(503)
        .create_async()
        .await;
    let raw = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_sendRawTransaction"})))
        .with_body(
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "nonce too low"}})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let ledger = ledger_for(&server.url(), Duration::from_secs(1));
    let err = ledger.pay(RECIPIENT, "0.0001").await.unwrap_err();

    // The transfer was still signed and offered to the node.
    assert!(matches!(err, SettleError::Broadcast(ref m) if m.contains("nonce too low")));
    raw.assert_async().await;
}
