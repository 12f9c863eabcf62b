//! Terminal stand-ins for the client's collaborators.

use std::sync::Mutex;

use docchat_client::{ConversationLocator, CredentialProvider};
use docchat_common::ConversationId;

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "DOCCHAT_TOKEN";

/// Reads the token from the environment on every request.
pub struct EnvCredential;

impl CredentialProvider for EnvCredential {
    fn credential(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// The `--session` flag in, the current id out.
pub struct TerminalLocator {
    requested: Option<String>,
    current: Mutex<Option<ConversationId>>,
}

impl TerminalLocator {
    pub fn new(requested: Option<String>) -> Self {
        Self {
            requested,
            current: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<ConversationId> {
        self.current.lock().ok().and_then(|c| c.clone())
    }
}

impl ConversationLocator for TerminalLocator {
    fn stored_conversation_id(&self) -> Option<String> {
        self.requested.clone()
    }

    fn publish_conversation_id(&self, id: &ConversationId) {
        tracing::debug!(conversation_id = %id, "Conversation id published");
        if let Ok(mut current) = self.current.lock() {
            *current = Some(id.clone());
        }
    }
}
