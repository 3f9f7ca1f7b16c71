// End-to-end delivery over loopback HTTP
// A local axum receiver records what the dispatcher sends

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use wefeed_dispatch::webhooks::{
    DeliveryClient, DeliveryOutcome, Dispatcher, DispatcherConfig, HttpDeliveryClient,
    InMemoryRegistry, NewSubscription, SubscriptionStore, TransportError,
};

type Received = Arc<Mutex<Vec<Value>>>;

async fn record(State(received): State<Received>, Json(body): Json<Value>) -> StatusCode {
    received.lock().await.push(body);
    StatusCode::OK
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

/// Spawn a receiver on an ephemeral port and return its base URL
async fn spawn_receiver(received: Received) -> String {
    let app = Router::new()
        .route("/hook", post(record))
        .route("/broken", post(broken))
        .route("/slow", post(slow))
        .with_state(received);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A loopback URL nothing is listening on
async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/hook", addr)
}

#[tokio::test]
async fn test_http_client_posts_json() {
    let received: Received = Arc::default();
    let base = spawn_receiver(received.clone()).await;
    let client = HttpDeliveryClient::new();

    let response = client
        .post(&format!("{}/hook", base), &json!({"event": "created"}), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(received.lock().await.as_slice(), &[json!({"event": "created"})]);
}

#[tokio::test]
async fn test_http_client_reports_connection_failure() {
    let client = HttpDeliveryClient::new();
    let url = closed_port_url().await;

    let err = client
        .post(&url, &json!({}), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Connect(_) | TransportError::Request(_)));
}

#[tokio::test]
async fn test_http_client_times_out() {
    let base = spawn_receiver(Arc::default()).await;
    let client = HttpDeliveryClient::new();

    let err = client
        .post(&format!("{}/slow", base), &json!({}), Duration::from_millis(200))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Timeout(200));
}

#[tokio::test]
async fn test_dispatch_reports_failure_and_success_in_order() {
    let received: Received = Arc::default();
    let base = spawn_receiver(received.clone()).await;
    let unreachable = closed_port_url().await;

    let registry = Arc::new(InMemoryRegistry::new());
    let x = registry.create(NewSubscription::new(unreachable.clone())).await.unwrap();
    let y = registry
        .create(NewSubscription::new(format!("{}/hook", base)))
        .await
        .unwrap();
    let z = registry
        .create(NewSubscription::new(format!("{}/broken", base)))
        .await
        .unwrap();

    let dispatcher = Dispatcher::new(
        registry,
        Arc::new(HttpDeliveryClient::new()),
        DispatcherConfig::default(),
    );
    let payload = json!({"event": "created", "model": "project", "id": 7});
    let report = dispatcher.dispatch(&payload).await.unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report.results[0].subscription_id, x.id);
    assert!(matches!(report.results[0].outcome, DeliveryOutcome::Failed { .. }));
    assert_eq!(report.results[1].subscription_id, y.id);
    assert_eq!(report.results[1].outcome, DeliveryOutcome::Delivered { status_code: 200 });
    // Error statuses are still a received response
    assert_eq!(report.results[2].subscription_id, z.id);
    assert_eq!(report.results[2].outcome, DeliveryOutcome::Delivered { status_code: 500 });

    assert_eq!(received.lock().await.as_slice(), &[payload]);
}

#[tokio::test]
async fn test_concurrent_dispatch_over_http() {
    let received: Received = Arc::default();
    let base = spawn_receiver(received.clone()).await;

    let registry = Arc::new(InMemoryRegistry::new());
    let mut ids = Vec::new();
    for _ in 0..6 {
        let sub = registry
            .create(NewSubscription::new(format!("{}/hook", base)))
            .await
            .unwrap();
        ids.push(sub.id);
    }

    let config = DispatcherConfig {
        concurrency: 3,
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(registry, Arc::new(HttpDeliveryClient::new()), config);
    let report = dispatcher.dispatch(&json!({"n": 1})).await.unwrap();

    let reported: Vec<_> = report.results.iter().map(|r| r.subscription_id).collect();
    assert_eq!(reported, ids);
    assert_eq!(report.delivered(), 6);
    assert_eq!(received.lock().await.len(), 6);
}
