//! Simulator error types.

/// Errors raised by the simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address.
        addr: String,
        /// Cause.
        source: std::io::Error,
    },

    /// Server failure.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
