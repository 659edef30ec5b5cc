//! HTTP server wiring.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{SimulatorConfig, DASHBOARD_PATH};
use crate::error::SimulatorError;
use crate::ws::{ws_handler, SimulatorState};

/// Builds the router: the dashboard WebSocket plus `/health`.
pub fn build_router(state: SimulatorState) -> Router {
    Router::new()
        .route(DASHBOARD_PATH, get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<SimulatorState>) -> Json<Value> {
    let channels = state.channels.channels().await;
    Json(json!({
        "status": "ok",
        "channels": channels,
        "metrics": state.metrics.snapshot(),
    }))
}

/// Binds the configured address and serves until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the address cannot be
/// bound, or the server fails.
pub async fn serve(config: SimulatorConfig) -> Result<(), SimulatorError> {
    config.validate()?;

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| SimulatorError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(
        "Simulator listening on ws://{}{} (tick {:?})",
        addr, DASHBOARD_PATH, config.tick_interval
    );

    let router = build_router(SimulatorState::new(&config));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Simulator shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
