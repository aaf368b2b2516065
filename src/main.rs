//! Service binary: wiring and process exit.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use user_service::config::{self, ServiceConfig};
use user_service::http::{AppState, HttpServer};
use user_service::lifecycle::{
    signals, ConnectionRegistry, Orchestrator, RequestCounter, Shutdown,
};
use user_service::observability::logging;
use user_service::store::Store;

#[derive(Debug, Parser)]
#[command(name = "user-service", about = "HTTP user service that drains in-flight requests on shutdown")]
struct Args {
    /// Path to a TOML config file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listener port (also honors the PORT environment variable).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ServiceConfig::default(),
    };
    let port_override = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()));
    if let Some(port) = port_override {
        config.listener.set_port(port);
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        overall_deadline_secs = config.shutdown.overall_deadline_secs,
        "Configuration loaded"
    );

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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (closed_tx, closed_rx) = oneshot::channel();
    let server = HttpServer::new(state, registry.clone(), &config);
    tokio::spawn(async move {
        if let Err(e) = server.run(listener, closed_tx).await {
            tracing::error!(error = %e, "HTTP server failed");
        }
    });

    let (trigger_tx, trigger_rx) = mpsc::channel(4);
    let _signal_task = signals::spawn_listener(trigger_tx);

    let orchestrator = Orchestrator::new(shutdown, requests, registry, store, config.shutdown);
    let outcome = orchestrator.run(trigger_rx, closed_rx).await;
    std::process::exit(outcome.exit_code());
}
