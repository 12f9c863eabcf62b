use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docchat_common::MessageId;

use crate::attachment::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a message.
///
/// `Pending -> Streaming -> Complete | Error | Cancelled`. User messages go
/// straight from `Pending` to `Complete`. `Cancelled` is the quiet end of a
/// superseded or abandoned reply and is never rendered as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Error,
    Cancelled,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Complete | MessageStatus::Error | MessageStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal move. Staying put is always legal.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        if self == next {
            return true;
        }
        match self {
            MessageStatus::Pending => true,
            MessageStatus::Streaming => next.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A freshly submitted user message. Attachments are kept as
    /// descriptors only.
    pub fn user(text: impl Into<String>, attachments: &[Attachment]) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            text: text.into(),
            attachments: attachments.iter().map(Attachment::without_payload).collect(),
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// The empty assistant bubble a reply streams into.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            text: String::new(),
            attachments: Vec::new(),
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// A finished message replayed from history.
    pub fn restored(
        role: Role,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            role,
            text: text.into(),
            attachments,
            status: MessageStatus::Complete,
            created_at,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

/// A partial update applied by [`ConversationStore::update_message`].
///
/// Text edits (`append` then `text`) are applied before the status change,
/// so one patch can write the final text and close the message.
///
/// [`ConversationStore::update_message`]: super::ConversationStore::update_message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub append: Option<String>,
    pub text: Option<String>,
    pub status: Option<MessageStatus>,
}

impl MessagePatch {
    pub fn append(chunk: impl Into<String>) -> Self {
        Self {
            append: Some(chunk.into()),
            ..Default::default()
        }
    }

    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn changes_text(&self) -> bool {
        self.append.is_some() || self.text.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.changes_text() && self.status.is_none()
    }
}
