//! Pulseboard simulator binary.
//!
//! Serves generated dashboard data over WebSocket.

use pulseboard_simulator::{serve, SimulatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pulseboard_simulator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = SimulatorConfig::from_env()?;

    tracing::info!(
        "Starting Pulseboard simulator on {}:{}",
        config.host,
        config.port
    );

    serve(config).await?;

    Ok(())
}
