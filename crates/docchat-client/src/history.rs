//! Replaying a persisted conversation into the store.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info};

use docchat_common::{ClientError, ConversationId};

use crate::attachment::Attachment;
use crate::backend::ChatBackend;
use crate::coordinator::StreamingCoordinator;
use crate::protocol::{HistoryExchange, HistoryResponse};
use crate::store::{Message, Role};

/// A decoded transcript, ready to replace the open conversation.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub messages: Vec<Message>,
    pub active_documents: Vec<Attachment>,
}

pub struct HistoryLoader {
    backend: Arc<dyn ChatBackend>,
}

impl HistoryLoader {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn fetch(&self, id: &ConversationId) -> Result<Transcript, ClientError> {
        let response = self.backend.fetch_history(id).await?;
        Ok(transcript_from(response))
    }

    /// Fetch `id` and make it the open conversation of `coordinator`.
    /// Returns the number of messages restored. On error the store is left
    /// untouched; the caller decides the fallback.
    pub async fn load(
        &self,
        id: &ConversationId,
        coordinator: &StreamingCoordinator,
    ) -> Result<usize, ClientError> {
        let transcript = self.fetch(id).await?;
        let count = transcript.messages.len();

        coordinator
            .reset_conversation(id.clone(), transcript.messages, transcript.active_documents)
            .await?;

        info!(conversation_id = %id, messages = count, "Conversation restored");
        Ok(count)
    }
}

/// Each exchange becomes a user message followed by an assistant message,
/// both complete, in the order the server sent them.
pub fn transcript_from(response: HistoryResponse) -> Transcript {
    let mut messages = Vec::with_capacity(response.chat_history.len() * 2);
    for exchange in response.chat_history {
        let (user, assistant) = restore_exchange(exchange);
        messages.push(user);
        messages.push(assistant);
    }

    Transcript {
        messages,
        active_documents: response.active_documents.into_iter().map(Into::into).collect(),
    }
}

fn restore_exchange(exchange: HistoryExchange) -> (Message, Message) {
    let created_at = exchange
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    let attachments: Vec<Attachment> = exchange
        .document_metadata
        .map(|meta| meta.original_files.into_iter().map(Into::into).collect())
        .unwrap_or_default();

    let prompt = crate::task::display_text(&exchange.prompt, attachments.len());
    (
        Message::restored(Role::User, prompt, attachments, created_at),
        Message::restored(Role::Assistant, exchange.response, Vec::new(), created_at),
    )
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            debug!(timestamp = raw, error = %e, "Unparseable history timestamp");
            None
        }
    }
}
