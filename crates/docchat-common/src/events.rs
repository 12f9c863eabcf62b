use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::{ConversationId, MessageId};

/// Change notifications emitted by the conversation store. The UI
/// subscribes and re-reads the store; events carry ids, not content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ConversationEvent {
    MessageAppended(MessageId),
    MessageUpdated(MessageId),
    ActiveDocumentsChanged { count: usize },
    ConversationReset {
        conversation_id: ConversationId,
        message_count: usize,
    },
    ConversationIdChanged {
        from: ConversationId,
        to: ConversationId,
    },
    Notice(String),
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<ConversationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ConversationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
