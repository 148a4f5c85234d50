//! Error types for motion-fusion

use thiserror::Error;

/// Main error type for motion-fusion
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Pacing error: {0}")]
    Pacing(#[from] PacingError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Network mocap transport errors.
///
/// Cloneable so a single failure can be reported through the connect signal
/// and logged by the session task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to bind to {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Failed to send handshake to {addr}: {message}")]
    Send { addr: String, message: String },

    #[error("Receive error: {0}")]
    Receive(String),

    #[error("Session closed before any data arrived")]
    Closed,
}

/// Inference pacing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacingError {
    #[error("Inference request {0} is still outstanding")]
    Busy(u64),

    #[error("Inference result channel closed")]
    ResultsClosed,
}

/// Fusion engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Fusion engine has stopped")]
    Stopped,
}

/// Result type alias for motion-fusion operations
pub type Result<T> = std::result::Result<T, FusionError>;
