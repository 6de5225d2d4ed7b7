use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxpilotError {
    #[error("No page captured yet. Wait for the current page to finish loading.")]
    NotReady,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Interpreter error: {0}")]
    InterpreterError(String),

    #[error("Bridge error: {0}")]
    BridgeError(String),

    #[error("Extension not connected. Open the browser with the voxpilot extension loaded.")]
    ExtensionNotConnected,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VoxpilotError>;
