//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use user_service::config::{ServiceConfig, ShutdownConfig};
use user_service::http::{AppState, HttpServer};
use user_service::lifecycle::{
    ConnectionRegistry, Orchestrator, RequestCounter, Shutdown, TerminationSignal,
};
use user_service::store::Store;
use user_service::ShutdownOutcome;

/// A fully wired service instance on an ephemeral port.
pub struct TestService {
    pub addr: SocketAddr,
    pub triggers: mpsc::Sender<TerminationSignal>,
    pub shutdown: Shutdown,
    pub requests: RequestCounter,
    pub store: Arc<Store>,
    /// Resolves to the orchestrator's outcome once shutdown finishes.
    pub outcome: JoinHandle<ShutdownOutcome>,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn trigger(&self) {
        self.triggers
            .send(TerminationSignal::Terminate)
            .await
            .expect("orchestrator gone");
    }
}

/// Start the service exactly as `main` wires it, minus the OS signal task.
/// Triggers are injected through the returned channel instead.
pub async fn start_service(shutdown_config: ShutdownConfig) -> TestService {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.shutdown = shutdown_config;

    let store = Arc::new(Store::connect());
    let shutdown = Shutdown::new();
    let requests = RequestCounter::new();
    let registry = ConnectionRegistry::new();

    let state = AppState {
        shutdown: shutdown.clone(),
        requests: requests.clone(),
        store: Arc::clone(&store),
        retry_after_secs: config.shutdown.retry_after_secs,
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let (closed_tx, closed_rx) = oneshot::channel();
    let server = HttpServer::new(state, registry.clone(), &config);
    tokio::spawn(async move {
        let _ = server.run(listener, closed_tx).await;
    });

    let (trigger_tx, trigger_rx) = mpsc::channel(4);
    let orchestrator = Orchestrator::new(
        shutdown.clone(),
        requests.clone(),
        registry,
        Arc::clone(&store),
        config.shutdown,
    );
    let outcome = tokio::spawn(orchestrator.run(trigger_rx, closed_rx));

    TestService {
        addr,
        triggers: trigger_tx,
        shutdown,
        requests,
        store,
        outcome,
    }
}

/// Shutdown settings sized for fast tests.
pub fn fast_shutdown_config() -> ShutdownConfig {
    ShutdownConfig {
        drain_timeout_secs: 2,
        drain_poll_ms: 50,
        overall_deadline_secs: 5,
        listener_grace_ms: 500,
        retry_after_secs: 5,
    }
}
