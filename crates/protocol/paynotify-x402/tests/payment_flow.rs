//! PaymentFlowClient against a stubbed gateway.

use std::sync::Arc;

use mockito::{Matcher, Server, ServerGuard};
use paynotify_settle::PaymentProof;
use paynotify_test_utils::{challenge_body, single_challenge, MockLedger};
use paynotify_x402::{
    GatewayConfig, MaxAmount, Notifier, NotifyError, PaymentFlowClient, PaymentRequirement,
    HEADER_PAYMENT_TX,
};
use serde_json::json;

fn client(server: &ServerGuard, ledger: &MockLedger) -> PaymentFlowClient {
    PaymentFlowClient::new(GatewayConfig::new(server.url()), Arc::new(ledger.clone())).unwrap()
}

#[tokio::test]
async fn test_free_delivery_never_pays() {
    let mut server = Server::new_async().await;
    let notify = server
        .mock("POST", "/notify")
        .match_body(Matcher::Json(json!({"destination": "1001", "message": "hi"})))
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let result = client(&server, &ledger)
        .notify("1001", "hi", None)
        .await
        .unwrap();

    assert_eq!(result, json!({"success": true}));
    assert_eq!(ledger.pay_count(), 0);
    notify.assert_async().await;
}

#[tokio::test]
async fn test_challenge_pays_once_and_retries_with_proof() {
    let mut server = Server::new_async().await;
    let challenge = server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Missing)
        .with_status(402)
        .with_body(json!({"x402": {"accepts": [{"payTo": "0xAAA", "maxAmountRequired": "0.0001"}]}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let paid = server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, MockLedger::proof_for(1).as_str())
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let result = client(&server, &ledger)
        .notify("1001", "hi", None)
        .await
        .unwrap();

    assert_eq!(result, json!({"ok": true}));
    assert_eq!(
        ledger.payments(),
        vec![("0xAAA".to_string(), "0.0001".to_string())]
    );
    challenge.assert_async().await;
    paid.assert_async().await;
}

#[tokio::test]
async fn test_notify_paid_reports_fresh_proof() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Missing)
        .with_status(402)
        .with_body(single_challenge("0xAAA", "0.0001").to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, MockLedger::proof_for(1).as_str())
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let client = client(&server, &ledger);
    let delivery = client.notify_paid("1001", "hi", None).await.unwrap();
    assert_eq!(delivery.result, json!({"ok": true}));
    assert_eq!(delivery.proof, Some(MockLedger::proof_for(1)));

    // A supplied proof is echoed back and nothing is paid.
    let delivery = client
        .notify_paid("1001", "hi", Some(&MockLedger::proof_for(1)))
        .await
        .unwrap();
    assert_eq!(delivery.proof, Some(MockLedger::proof_for(1)));
    assert_eq!(ledger.pay_count(), 1);
}

#[tokio::test]
async fn test_empty_accepts_is_protocol_error_before_payment() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .with_status(402)
        .with_body(challenge_body(&[]).to_string())
        .expect(1)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let err = client(&server, &ledger)
        .notify("1001", "hi", None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, NotifyError::Protocol { ref reason, status: 402, .. } if reason == "no acceptable payment method")
    );
    assert_eq!(ledger.pay_count(), 0);
}

#[tokio::test]
async fn test_non_json_challenge_is_protocol_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .with_status(402)
        .with_body("pay up")
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let err = client(&server, &ledger)
        .notify("1001", "hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Protocol { .. }));
    assert!(err.to_string().contains("pay up"));
    assert_eq!(ledger.pay_count(), 0);
}

#[tokio::test]
async fn test_unexpected_status_is_protocol_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .with_status(400)
        .with_body(r#"{"error":"Missing chat_id or message"}"#)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let err = client(&server, &ledger)
        .notify("", "hi", None)
        .await
        .unwrap_err();

    match err {
        NotifyError::Protocol {
            reason,
            status,
            body,
        } => {
            assert_eq!(reason, "unexpected response");
            assert_eq!(status, 400);
            assert!(body.contains("Missing chat_id"));
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_supplied_proof_sends_once_without_paying() {
    let mut server = Server::new_async().await;
    let notify = server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, "0xFAKE_TX")
        .with_status(200)
        .with_body(r#"{"success":true,"txHash":"0xFAKE_TX"}"#)
        .expect(1)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let proof = PaymentProof::new("0xFAKE_TX");
    let result = client(&server, &ledger)
        .notify("1001", "hi", Some(&proof))
        .await
        .unwrap();

    assert_eq!(result["txHash"], "0xFAKE_TX");
    assert_eq!(ledger.pay_count(), 0);
    notify.assert_async().await;
}

#[tokio::test]
async fn test_supplied_proof_rejected_is_delivery_error_without_spend() {
    let mut server = Server::new_async().await;
    let notify = server
        .mock("POST", "/notify")
        .with_status(402)
        .with_body(r#"{"error":"Transaction not found on network"}"#)
        .expect(1)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let proof = PaymentProof::new("0xFAKE_TX");
    let err = client(&server, &ledger)
        .notify("1001", "hi", Some(&proof))
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Delivery { status: 402, .. }));
    assert!(err.spent_proof().is_none());
    assert_eq!(ledger.pay_count(), 0);
    notify.assert_async().await;
}

#[tokio::test]
async fn test_rejection_after_payment_reports_spent_proof() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Missing)
        .with_status(402)
        .with_body(single_challenge("0xAAA", "0.0001").to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Regex("^0x".to_string()))
        .with_status(500)
        .with_body(r#"{"error":"Telegram delivery failed"}"#)
        .expect(1)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let err = client(&server, &ledger)
        .notify("1001", "hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Delivery { status: 500, .. }));
    assert_eq!(err.spent_proof(), Some(&MockLedger::proof_for(1)));
    assert!(err.to_string().contains("already spent"));
    assert_eq!(ledger.pay_count(), 1);
}

#[tokio::test]
async fn test_ledger_timeout_is_ambiguous_and_not_retried() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Missing)
        .with_status(402)
        .with_body(single_challenge("0xAAA", "0.0001").to_string())
        .create_async()
        .await;
    let retry = server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Regex("^0x".to_string()))
        .expect(0)
        .create_async()
        .await;

    let ledger = MockLedger::new().with_timeout();
    let err = client(&server, &ledger)
        .notify("1001", "hi", None)
        .await
        .unwrap_err();

    assert!(err.is_ambiguous());
    assert!(err.funds_at_risk());
    retry.assert_async().await;
}

#[tokio::test]
async fn test_reverted_payment_is_payment_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .with_status(402)
        .with_body(single_challenge("0xAAA", "0.0001").to_string())
        .create_async()
        .await;

    let ledger = MockLedger::new().with_failure();
    let err = client(&server, &ledger)
        .notify("1001", "hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Payment(_)));
    assert!(!err.is_ambiguous());
}

#[tokio::test]
async fn test_selector_picks_affordable_option() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Missing)
        .with_status(402)
        .with_body(
            challenge_body(&[
                PaymentRequirement::new("0xEXPENSIVE", "1.5"),
                PaymentRequirement::new("0xCHEAP", "0.00001"),
            ])
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/notify")
        .match_header(HEADER_PAYMENT_TX, Matcher::Regex("^0x".to_string()))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let ledger = MockLedger::new();
    let client = client(&server, &ledger)
        .with_selector(Arc::new(MaxAmount::ether("0.001").unwrap()));
    client.notify("1001", "hi", None).await.unwrap();

    assert_eq!(ledger.payments()[0].0, "0xCHEAP");
}

#[tokio::test]
async fn test_gateway_unreachable_is_network_error() {
    let ledger = MockLedger::new();
    let client =
        PaymentFlowClient::new(GatewayConfig::new("http://127.0.0.1:9"), Arc::new(ledger.clone()))
            .unwrap();

    let err = client.notify("1001", "hi", None).await.unwrap_err();
    assert!(matches!(err, NotifyError::Network { spent: None, .. }));
    assert_eq!(ledger.pay_count(), 0);
}

#[tokio::test]
async fn test_stats_passthrough() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/stats/0xabc")
        .with_status(200)
        .with_body(r#"{"wallet":"0xabc","notifications":3}"#)
        .create_async()
        .await;

    let client = client(&server, &MockLedger::new());
    let stats = client.stats("0xabc").await.unwrap();
    assert_eq!(stats, json!({"wallet": "0xabc", "notifications": 3}));
}
