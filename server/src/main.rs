mod config;
mod error;
mod routes;
mod state;
mod telemetry;

use crate::config::Config;
use crate::state::AppState;
use joblib::{FinalizeClient, JobRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    // flushes the error log when dropped
    let _guard = telemetry::init(&cfg)?;

    let reporter = FinalizeClient::new(&cfg.finalize_server, cfg.finalize_timeout)?;
    info!(endpoint = %reporter.endpoint(), "finalize notifications enabled");
    let registry = JobRegistry::new(cfg.paths(), cfg.launch(), Arc::new(reporter))?;
    let state = Arc::new(AppState { registry });

    let app = routes::build(state);
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, runner = %cfg.runner_program, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C handler");
        }
    };

    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
