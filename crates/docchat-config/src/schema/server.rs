use serde::{Deserialize, Serialize};

/// Placeholder substituted into `history_path`.
pub const SESSION_ID_PLACEHOLDER: &str = "{session_id}";

/// Where the conversation backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Scheme and host of the backend, without a trailing slash.
    pub base_url: String,
    /// Multipart submit endpoint answering with an event stream.
    pub chat_path: String,
    /// History endpoint; `{session_id}` is replaced with the conversation id.
    pub history_path: String,
}

impl ServerConfig {
    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.chat_path)
    }

    pub fn history_url(&self, session_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.history_path.replace(SESSION_ID_PLACEHOLDER, session_id)
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            chat_path: "/chat".into(),
            history_path: "/session/{session_id}".into(),
        }
    }
}
