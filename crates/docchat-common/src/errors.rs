use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// 401/403 from the backend, or no credential to send. Never retried.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{detail}")]
    Http { status: u16, detail: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the failure must be surfaced upward instead of recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    /// Map an HTTP status and response body to an error.
    ///
    /// The body's JSON `detail` field is preferred as the human-readable
    /// summary; otherwise the status line is used.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| json.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {status}"));

        match status {
            401 | 403 => ClientError::Unauthorized(detail),
            _ => ClientError::Http { status, detail },
        }
    }
}
