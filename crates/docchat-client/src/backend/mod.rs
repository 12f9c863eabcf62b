//! The backend seam: opening a reply stream and fetching history.

mod http;


pub use http::HttpBackend;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use docchat_common::{ClientError, ConversationId};

use crate::attachment::Attachment;
use crate::protocol::HistoryResponse;

/// Raw reply bytes in network-read order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// One submission as it goes on the wire.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub conversation_id: ConversationId,
    /// May be empty when files are attached.
    pub prompt: String,
    pub task: String,
    /// Attachments still carrying their payloads.
    pub files: Vec<Attachment>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit a message and return the reply's event-stream body once the
    /// response headers have arrived. Non-2xx statuses are errors here.
    async fn open_reply_stream(&self, request: ChatRequest) -> Result<ByteStream, ClientError>;

    /// Fetch the persisted transcript of a conversation.
    async fn fetch_history(&self, id: &ConversationId) -> Result<HistoryResponse, ClientError>;
}
