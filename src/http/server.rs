//! HTTP server setup and the connection-serving loop.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, request ID, gate, tracker, timeout)
//! - Accept connections and register each with the connection registry
//! - Serve each connection through the hyper auto builder so shutdown can
//!   nudge or destroy it individually
//! - Stop accepting and ack listener close when the orchestrator says so
//!
//! # Design Decisions
//! - Manual accept loop instead of `axum::serve`: the registry needs a
//!   handle on every live connection, which the bundled server hides
//! - The listener keeps accepting during Draining (the gate rejects new
//!   requests); it closes at Closing, per the shutdown state table

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::middleware::{admission_gate, request_id, track_requests};
use crate::lifecycle::{
    ConnectionRegistry, ConnectionSignals, RequestCounter, Shutdown, ShutdownState,
};
use crate::store::Store;

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Shutdown,
    pub requests: RequestCounter,
    pub store: Arc<Store>,
    /// `Retry-After` hint (seconds) for requests rejected during shutdown.
    pub retry_after_secs: u64,
}

/// HTTP server for the user service.
pub struct HttpServer {
    router: Router,
    shutdown: Shutdown,
    registry: ConnectionRegistry,
}

impl HttpServer {
    /// Create a new HTTP server with the given state and configuration.
    pub fn new(state: AppState, registry: ConnectionRegistry, config: &ServiceConfig) -> Self {
        let shutdown = state.shutdown.clone();
        let router = Self::build_router(state, config);
        Self {
            router,
            shutdown,
            registry,
        }
    }

    /// Build the Axum router with all middleware layers.
    pub(crate) fn build_router(state: AppState, config: &ServiceConfig) -> Router {
        // Probes live outside the admission gate so orchestration tooling
        // can still observe the process while it drains.
        let probes = Router::new()
            .route("/health", get(handlers::health))
            .route("/ready", get(handlers::readiness))
            .with_state(state.clone());

        let api = Router::new()
            .route(
                "/v1/users",
                get(handlers::list_users).post(handlers::create_user),
            )
            // Unmatched paths take the same gate and tracker as real routes.
            .fallback(handlers::not_found)
            .layer(TimeoutLayer::new(config.listener.request_timeout()))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                track_requests,
            ))
            // Outermost of the api stack: runs before the tracker, so a
            // rejected request never enters the counter.
            .layer(middleware::from_fn_with_state(state.clone(), admission_gate))
            .with_state(state);

        Router::new()
            .merge(probes)
            .merge(api)
            .layer(middleware::from_fn(request_id))
            .layer(TraceLayer::new_for_http())
    }

    /// Accept and serve connections until the orchestrator reaches Closing,
    /// then drop the listener and ack on `closed_tx`.
    pub async fn run(
        self,
        listener: TcpListener,
        closed_tx: oneshot::Sender<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server started");

        let mut state_rx = self.shutdown.subscribe();
        let service = TowerToHyperService::new(self.router.clone());

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let (id, signals, registration) = self.registry.register();
                            tracing::debug!(
                                connection_id = %id,
                                peer_addr = %peer_addr,
                                "Connection accepted"
                            );
                            let service = service.clone();
                            tokio::spawn(async move {
                                serve_connection(stream, service, signals).await;
                                drop(registration);
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }
                // The inner async block drops the non-Send watch guard before
                // yielding, keeping the run future `Send` for `tokio::spawn`.
                _ = async {
                    let _ = state_rx.wait_for(|s| *s >= ShutdownState::Closing).await;
                } => break,
            }
        }

        drop(listener);
        tracing::info!(address = %addr, "Listener closed");
        let _ = closed_tx.send(());
        Ok(())
    }
}

/// Serve one connection, honoring the registry's close signals.
async fn serve_connection(
    stream: TcpStream,
    service: TowerToHyperService<Router>,
    mut signals: ConnectionSignals,
) {
    let io = TokioIo::new(stream);
    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, service);
    let mut conn = std::pin::pin!(conn);
    let mut draining = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "Connection ended with error");
                }
                break;
            }
            // Graceful nudge: finish the current exchange, then close.
            // Stops idle keep-alive connections from lingering.
            _ = signals.graceful.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
            // Forced destroy: dropping the connection tears the socket down
            // and surfaces a disconnect to whatever is mid-request on it.
            _ = signals.forced.changed() => break,
        }
    }
}
