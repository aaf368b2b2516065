//! End-to-end shutdown behavior over real sockets.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use user_service::ShutdownOutcome;

mod common;

#[tokio::test]
async fn serves_user_traffic_while_running() {
    let service = common::start_service(common::fast_shutdown_config()).await;
    let client = reqwest::Client::new();

    let health = client.get(service.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK.as_u16());

    let created = client
        .post(service.url("/v1/users"))
        .json(&serde_json::json!({ "name": "ada", "email": "ada@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED.as_u16());

    let listed = client.get(service.url("/v1/users")).send().await.unwrap();
    let users: Vec<serde_json::Value> = listed.json().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["name"], "ada");
}

#[tokio::test]
async fn draining_rejects_new_requests_but_answers_probes() {
    let service = common::start_service(common::fast_shutdown_config()).await;
    let client = reqwest::Client::new();

    // One request stays in flight so the service sits in Draining.
    let in_flight = service.requests.enter();
    service.trigger().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(service.shutdown.is_shutting_down());

    let rejected = client.get(service.url("/v1/users")).send().await.unwrap();
    assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE.as_u16());
    assert_eq!(rejected.headers().get("retry-after").unwrap(), "5");
    assert_eq!(rejected.headers().get("connection").unwrap(), "close");
    let body: serde_json::Value = rejected.json().await.unwrap();
    assert_eq!(body["ok"], false);

    // Liveness keeps answering during the drain; readiness flips.
    let health = client.get(service.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK.as_u16());
    let ready = client.get(service.url("/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE.as_u16());

    // Rejections never entered the counter.
    assert_eq!(service.requests.current(), 1);

    in_flight.settle();
    let outcome = service.outcome.await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn idle_service_shuts_down_cleanly_and_releases_resources() {
    let service = common::start_service(common::fast_shutdown_config()).await;

    let start = Instant::now();
    service.trigger().await;
    let outcome = service.outcome.await.unwrap();

    assert_eq!(outcome, ShutdownOutcome::Clean);
    // Idle drain returns immediately; no deadline should be consumed.
    assert!(start.elapsed() < Duration::from_secs(2));
    // Dependent resource released during Closing.
    assert!(service.store.ping().is_err());
    // Listener is gone: new connections are refused.
    assert!(tokio::net::TcpStream::connect(service.addr).await.is_err());
}

#[tokio::test]
async fn drain_waits_for_in_flight_work() {
    let service = common::start_service(common::fast_shutdown_config()).await;

    let in_flight = service.requests.enter();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        in_flight.settle();
    });

    let start = Instant::now();
    service.trigger().await;
    let outcome = service.outcome.await.unwrap();

    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn stuck_request_cannot_block_shutdown() {
    let service = common::start_service(common::fast_shutdown_config()).await;

    // Never settled: the drain deadline (2s) must cut the wait short.
    let _stuck = service.requests.enter();

    let start = Instant::now();
    service.trigger().await;
    let outcome = service.outcome.await.unwrap();

    assert_eq!(outcome, ShutdownOutcome::Clean);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(4));
}

#[tokio::test]
async fn repeated_trigger_escalates_to_forced_exit() {
    let service = common::start_service(common::fast_shutdown_config()).await;

    let _stuck = service.requests.enter();
    service.trigger().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    service.trigger().await;

    let outcome = service.outcome.await.unwrap();
    assert_eq!(
        outcome,
        ShutdownOutcome::Forced { active_requests: 1 }
    );
    assert_ne!(outcome.exit_code(), 0);
}
