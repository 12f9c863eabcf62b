use std::collections::HashMap;
use std::fmt;

use tokio::sync::broadcast;
use tracing::debug;

use docchat_common::{ConversationEvent, ConversationId, EventBus, MessageId};

use super::message::{Message, MessagePatch, MessageStatus};
use super::StoreError;
use crate::attachment::Attachment;

pub struct ConversationStore {
    id: ConversationId,
    messages: Vec<Message>,
    index: HashMap<MessageId, usize>,
    active_documents: Vec<Attachment>,
    streaming: Option<MessageId>,
    events: EventBus,
}

impl ConversationStore {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            index: HashMap::new(),
            active_documents: Vec::new(),
            streaming: None,
            events: EventBus::default(),
        }
    }

    // -- reads --

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.index.get(id).map(|&idx| &self.messages[idx])
    }

    pub fn active_documents(&self) -> &[Attachment] {
        &self.active_documents
    }

    /// The single assistant message currently receiving chunks, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.streaming.as_ref().and_then(|id| self.message(id))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    // -- mutations --

    /// Append to the end of the conversation. Rejects a duplicate id and a
    /// second `Streaming` message.
    pub fn append_message(&mut self, message: Message) -> Result<(), StoreError> {
        if self.index.contains_key(&message.id) {
            return Err(StoreError::DuplicateId(message.id));
        }
        if message.status == MessageStatus::Streaming {
            if let Some(active) = &self.streaming {
                return Err(StoreError::AlreadyStreaming {
                    active: active.clone(),
                });
            }
            self.streaming = Some(message.id.clone());
        }

        let id = message.id.clone();
        self.index.insert(id.clone(), self.messages.len());
        self.messages.push(message);
        self.events.publish(ConversationEvent::MessageAppended(id));
        Ok(())
    }

    /// Apply a patch. The whole patch is validated before anything changes.
    pub fn update_message(&mut self, id: &MessageId, patch: MessagePatch) -> Result<(), StoreError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| StoreError::UnknownMessage(id.clone()))?;
        let current = self.messages[idx].status;

        if patch.changes_text() && current.is_terminal() {
            return Err(StoreError::Finalized(id.clone()));
        }
        if let Some(next) = patch.status {
            if !current.can_transition_to(next) {
                if current.is_terminal() {
                    return Err(StoreError::Finalized(id.clone()));
                }
                return Err(StoreError::InvalidTransition {
                    id: id.clone(),
                    from: current,
                    to: next,
                });
            }
            if next == MessageStatus::Streaming {
                if let Some(active) = self.streaming.as_ref().filter(|a| *a != id) {
                    return Err(StoreError::AlreadyStreaming {
                        active: active.clone(),
                    });
                }
            }
        }
        if patch.is_empty() {
            return Ok(());
        }

        let message = &mut self.messages[idx];
        if let Some(chunk) = patch.append {
            message.text.push_str(&chunk);
        }
        if let Some(text) = patch.text {
            message.text = text;
        }
        if let Some(next) = patch.status {
            message.status = next;
            if next == MessageStatus::Streaming {
                self.streaming = Some(id.clone());
            } else if next.is_terminal() && self.streaming.as_ref() == Some(id) {
                self.streaming = None;
            }
        }

        self.events.publish(ConversationEvent::MessageUpdated(id.clone()));
        Ok(())
    }

    /// Replace the documents in the assistant's context. Payloads are
    /// dropped; only descriptors are kept.
    pub fn set_active_documents(&mut self, documents: Vec<Attachment>) {
        self.active_documents = documents.iter().map(Attachment::without_payload).collect();
        self.events.publish(ConversationEvent::ActiveDocumentsChanged {
            count: self.active_documents.len(),
        });
    }

    /// Adopt a new conversation id. Returns false when nothing changed.
    pub fn set_id(&mut self, id: ConversationId) -> bool {
        if id == self.id {
            return false;
        }
        let from = std::mem::replace(&mut self.id, id.clone());
        debug!(from = %from, to = %id, "Conversation id changed");
        self.events
            .publish(ConversationEvent::ConversationIdChanged { from, to: id });
        true
    }

    /// Replace the whole conversation. The only way to drop or reorder
    /// messages. Active documents are cleared.
    pub fn reset(&mut self, id: ConversationId, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut index = HashMap::with_capacity(messages.len());
        let mut streaming = None;
        for (idx, message) in messages.iter().enumerate() {
            if index.insert(message.id.clone(), idx).is_some() {
                return Err(StoreError::DuplicateId(message.id.clone()));
            }
            if message.status == MessageStatus::Streaming {
                if let Some(active) = streaming.replace(message.id.clone()) {
                    return Err(StoreError::AlreadyStreaming { active });
                }
            }
        }

        self.id = id;
        self.messages = messages;
        self.index = index;
        self.streaming = streaming;
        self.active_documents.clear();

        self.events.publish(ConversationEvent::ConversationReset {
            conversation_id: self.id.clone(),
            message_count: self.messages.len(),
        });
        Ok(())
    }

    /// Broadcast a transient notice to subscribers.
    pub fn notify(&self, message: impl Into<String>) {
        self.events.publish(ConversationEvent::Notice(message.into()));
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(ConversationId::generate())
    }
}

impl fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationStore")
            .field("id", &self.id)
            .field("messages", &self.messages.len())
            .field("active_documents", &self.active_documents.len())
            .field("streaming", &self.streaming)
            .finish()
    }
}
