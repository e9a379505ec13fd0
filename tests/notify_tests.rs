//! Webhook notification tests

use contract_flow::engine::ContractEngine;
use contract_flow::models::{ContractStatus, Role, Terms};
use contract_flow::notify::{
    Notification, NotificationDispatcher, NotificationKind, WebhookDispatcher,
};
use contract_flow::permissions::StaticPermissionTable;
use contract_flow::store;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notification() -> Notification {
    Notification {
        recipient_id: Uuid::new_v4(),
        kind: NotificationKind::ContractRejected,
        title: "Contract rejected".to_string(),
        message: "MSA (version 1) was rejected during finance review".to_string(),
        contract_id: Uuid::new_v4(),
    }
}

/// Wait for spawned deliveries to reach the mock server
async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    for _ in 0..100 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn test_deliver_posts_json() {
    let mock_server = MockServer::start().await;
    let n = notification();

    Mock::given(method("POST"))
        .and(path("/hooks/contracts"))
        .and(body_partial_json(serde_json::json!({
            "type": "contract_rejected",
            "recipient_id": n.recipient_id,
            "contract_id": n.contract_id,
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dispatcher = WebhookDispatcher::new(format!("{}/hooks/contracts", mock_server.uri()));
    let result = dispatcher.deliver(&n).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_deliver_reports_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/contracts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let dispatcher = WebhookDispatcher::new(format!("{}/hooks/contracts", mock_server.uri()));
    let err = dispatcher.deliver(&notification()).await.unwrap_err();
    assert_eq!(err.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn test_notify_is_fire_and_forget() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let dispatcher = WebhookDispatcher::new(mock_server.uri());
    dispatcher.notify(notification());

    let received = wait_for_requests(&mock_server, 1).await;
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["title"], "Contract rejected");
}

#[tokio::test]
async fn test_failed_delivery_does_not_block_transition() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let pool = store::open("sqlite::memory:", 1).await.unwrap();
    let engine = ContractEngine::new(
        pool,
        Arc::new(StaticPermissionTable),
        Arc::new(WebhookDispatcher::new(mock_server.uri())),
    );
    let directory = engine.directory();
    let legal = directory.register("Lena", Role::Legal).await.unwrap().actor();
    let finance = directory.register("Fay", Role::Finance).await.unwrap();
    let client = directory.register("Acme", Role::Client).await.unwrap();

    let (contract, _) = engine
        .create_contract(&legal, client.id, Terms::new("MSA"))
        .await
        .unwrap();
    let v = engine.submit(contract.id, &legal).await.unwrap();
    assert_eq!(v.status, ContractStatus::PendingFinance);

    let received = wait_for_requests(&mock_server, 1).await;
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["type"], "contract_submitted");
    assert_eq!(body["recipient_id"], finance.id.to_string());

    let stored = engine.store().get_current_version(contract.id).await.unwrap();
    assert_eq!(stored.status, ContractStatus::PendingFinance);
}
