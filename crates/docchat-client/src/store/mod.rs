//! The observable record of the conversation currently open in a view.
//!
//! All mutation goes through four operations (`append_message`,
//! `update_message`, `set_active_documents`, `reset`) so that message ids
//! stay unique, order stays append-only and at most one assistant message
//! is ever `Streaming`. Every mutation is broadcast as a
//! [`ConversationEvent`] for the UI to re-read.

mod conversation;
mod message;

#[cfg(test)]
mod tests;

pub use conversation::ConversationStore;
pub use message::{Message, MessagePatch, MessageStatus, Role};

use docchat_common::{ClientError, MessageId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("message id already present: {0}")]
    DuplicateId(MessageId),

    #[error("no message with id {0}")]
    UnknownMessage(MessageId),

    #[error("message {active} is already streaming")]
    AlreadyStreaming { active: MessageId },

    #[error("message {0} is finalized")]
    Finalized(MessageId),

    #[error("message {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
    },
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        ClientError::Store(err.to_string())
    }
}
