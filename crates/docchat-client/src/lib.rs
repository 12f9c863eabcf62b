//! Streaming conversation client for the document-assistant service.
//!
//! - `streaming`: event-stream frame parser
//! - `protocol`: wire events and history payloads
//! - `store`: the observable record of one open conversation
//! - `coordinator`: one live reply per view, supersession, cancellation
//! - `history`: replaying a persisted conversation into the store
//! - `session`: the per-view owner tying the above together

pub mod attachment;
pub mod backend;
pub mod collaborators;
pub mod coordinator;
pub mod history;
pub mod protocol;
pub mod session;
pub mod store;
pub mod streaming;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use attachment::Attachment;
pub use backend::{ByteStream, ChatBackend, ChatRequest, HttpBackend};
pub use collaborators::{ConversationLocator, CredentialProvider, StaticCredential};
pub use coordinator::{
    CancelReason, ReplyHandle, ReplyOutcome, SharedStore, StreamingCoordinator, SubmitOptions,
};
pub use history::{HistoryLoader, Transcript};
pub use protocol::StreamEvent;
pub use session::{ChatSession, OpenOutcome};
pub use store::{ConversationStore, Message, MessagePatch, MessageStatus, Role, StoreError};
pub use streaming::SseFrameParser;
pub use task::TaskKind;

pub use docchat_common::{ClientError, ConversationEvent, ConversationId, MessageId};
