//! Interfaces to state the client uses but does not own: the bearer
//! credential and the place a conversation id is remembered (the address
//! bar in a browser, a flag or file for the CLI).

use docchat_common::ConversationId;

pub trait CredentialProvider: Send + Sync {
    /// The bearer token to attach, or `None` when signed out.
    fn credential(&self) -> Option<String>;
}

/// A fixed token, for tests and scripted use.
#[derive(Debug, Clone)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Option<String> {
        self.0.clone().filter(|t| !t.trim().is_empty())
    }
}

pub trait ConversationLocator: Send + Sync {
    /// The id the view was opened with, untrusted until validated.
    fn stored_conversation_id(&self) -> Option<String>;

    /// Called whenever the authoritative id changes.
    fn publish_conversation_id(&self, id: &ConversationId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_static_credential_is_absent() {
        assert_eq!(StaticCredential::new("tok").credential().as_deref(), Some("tok"));
        assert!(StaticCredential::new("  ").credential().is_none());
        assert!(StaticCredential::none().credential().is_none());
    }
}
