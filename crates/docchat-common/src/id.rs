//! Conversation and message identifiers.
//!
//! A `ConversationId` is both the client-side key of a conversation and the
//! `session_id` sent to the backend. Ids the client makes up itself are
//! UUID-v4 strings; ids confirmed by the server are trusted as-is and always
//! take precedence over the local choice (see [`ConversationId::reconcile`]).

use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Returns true only for hyphenated UUID-v4 strings (36 chars, version 4,
/// RFC 4122 variant).
pub fn is_valid_v4(candidate: &str) -> bool {
    if candidate.len() != 36 {
        return false;
    }
    match uuid::Uuid::try_parse(candidate) {
        Ok(parsed) => {
            parsed.get_version_num() == 4 && parsed.get_variant() == uuid::Variant::RFC4122
        }
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// A fresh random id. No network call.
    pub fn generate() -> Self {
        Self(new_id())
    }

    /// Accept an id from an untrusted source (URL, stored state).
    pub fn parse(candidate: &str) -> Option<Self> {
        let candidate = candidate.trim();
        is_valid_v4(candidate).then(|| Self(candidate.to_string()))
    }

    /// Wrap an id the backend assigned. Server ids need not be UUIDs.
    pub fn from_server(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Server wins: returns the server's id when it sent a non-empty one,
    /// otherwise keeps the local id.
    pub fn reconcile(local: &ConversationId, server_provided: Option<&str>) -> ConversationId {
        match server_provided.map(str::trim) {
            Some(server) if !server.is_empty() && server != local.as_str() => {
                Self::from_server(server)
            }
            _ => local.clone(),
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_v4(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locally unique message id, stable for the message's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
