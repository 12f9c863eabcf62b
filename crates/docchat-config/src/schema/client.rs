use serde::{Deserialize, Serialize};

/// Behaviour of the streaming client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// TCP connect timeout in seconds (valid range: 1-120).
    pub connect_timeout_secs: u32,
    /// Caller-imposed reply timeout in seconds; 0 disables it (else 1-3600).
    /// Expiry behaves exactly like a user cancel.
    pub reply_timeout_secs: u32,
    /// Task tag sent when the user picks none.
    pub default_task: String,
    /// Largest single event-stream record accepted before the stream is
    /// treated as malformed (valid range: 1 KiB-64 MiB).
    pub max_record_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            reply_timeout_secs: 0,
            default_task: "general conversation".into(),
            max_record_bytes: 1024 * 1024,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.connect_timeout_secs))
    }

    pub fn reply_timeout(&self) -> Option<std::time::Duration> {
        (self.reply_timeout_secs > 0)
            .then(|| std::time::Duration::from_secs(u64::from(self.reply_timeout_secs)))
    }
}
