use thiserror::Error;

use crate::config::ConfigError;
use crate::decoder::DecodeError;

#[derive(Error, Debug)]
pub enum SkyhookError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Dial {url}: {reason}")]
    Dial { url: String, reason: String },

    #[error("Login as {handle} failed: {reason}")]
    Login { handle: String, reason: String },

    #[error("Fetch profile {actor}: {reason}")]
    Profile { actor: String, reason: String },

    #[error("Access token expired while fetching {actor}")]
    SessionExpired { actor: String },

    #[error("Webhook returned {status}: {body}")]
    Webhook { status: u16, body: String },

    #[error("No frame within {0:?}")]
    ReadTimeout(std::time::Duration),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl SkyhookError {
    /// Errors that end the current feed connection and trigger a reconnect.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            SkyhookError::WebSocket(_)
                | SkyhookError::Dial { .. }
                | SkyhookError::Login { .. }
                | SkyhookError::ReadTimeout(_)
                | SkyhookError::ConnectionClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, SkyhookError>;
