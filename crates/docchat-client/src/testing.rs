//! In-memory backend with scripted replies for deterministic tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use docchat_common::{ClientError, ConversationId};

use crate::backend::{ByteStream, ChatBackend, ChatRequest};
use crate::collaborators::ConversationLocator;
use crate::protocol::HistoryResponse;

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Bytes(String),
    Delay(Duration),
    /// Transport error mid-stream.
    Drop(String),
    /// Never yields again.
    Hang,
}

pub(crate) enum Reply {
    Stream(Vec<Step>),
    Reject(ClientError),
}

pub(crate) fn record(json: &str) -> Step {
    Step::Bytes(format!("data: {json}\n\n"))
}

pub(crate) fn chunk(text: &str) -> Step {
    record(&serde_json::json!({ "chunk": text }).to_string())
}

pub(crate) fn done() -> Step {
    record(r#"{"done":true}"#)
}

pub(crate) fn delay_ms(ms: u64) -> Step {
    Step::Delay(Duration::from_millis(ms))
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    by_prompt: Mutex<HashMap<String, Vec<Step>>>,
    histories: Mutex<VecDeque<Result<HistoryResponse, ClientError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    history_requests: Mutex<Vec<ConversationId>>,
    history_delay: Mutex<Option<Duration>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, steps: Vec<Step>) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Stream(steps));
        self
    }

    /// Reply used only for a submission with exactly this prompt.
    pub(crate) fn reply_to(self, prompt: &str, steps: Vec<Step>) -> Self {
        self.by_prompt
            .lock()
            .unwrap()
            .insert(prompt.to_string(), steps);
        self
    }

    pub(crate) fn reject(self, err: ClientError) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Reject(err));
        self
    }

    pub(crate) fn history(self, result: Result<HistoryResponse, ClientError>) -> Self {
        self.histories.lock().unwrap().push_back(result);
        self
    }

    /// Every history fetch waits this long before answering.
    pub(crate) fn history_delay(self, delay: Duration) -> Self {
        *self.history_delay.lock().unwrap() = Some(delay);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn history_requests(&self) -> Vec<ConversationId> {
        self.history_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_reply_stream(&self, request: ChatRequest) -> Result<ByteStream, ClientError> {
        let keyed = self.by_prompt.lock().unwrap().remove(&request.prompt);
        self.requests.lock().unwrap().push(request);
        let reply = match keyed {
            Some(steps) => Reply::Stream(steps),
            None => self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Stream(vec![Step::Hang])),
        };

        let steps = match reply {
            Reply::Reject(err) => return Err(err),
            Reply::Stream(steps) => steps,
        };

        let stream = futures_util::stream::unfold(steps.into_iter(), |mut steps| async move {
            loop {
                match steps.next()? {
                    Step::Delay(d) => tokio::time::sleep(d).await,
                    Step::Bytes(b) => return Some((Ok(b.into_bytes()), steps)),
                    Step::Drop(msg) => return Some((Err(ClientError::Network(msg)), steps)),
                    Step::Hang => std::future::pending::<()>().await,
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn fetch_history(&self, id: &ConversationId) -> Result<HistoryResponse, ClientError> {
        self.history_requests.lock().unwrap().push(id.clone());
        let delay = *self.history_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.histories
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ClientError::Http {
                    status: 404,
                    detail: "Session not found".into(),
                })
            })
    }
}

/// Locator that remembers every published id.
#[derive(Default)]
pub(crate) struct RecordingLocator {
    pub(crate) stored: Option<String>,
    published: Mutex<Vec<ConversationId>>,
}

impl RecordingLocator {
    pub(crate) fn with_stored(id: &str) -> Self {
        Self {
            stored: Some(id.to_string()),
            published: Mutex::default(),
        }
    }

    pub(crate) fn published(&self) -> Vec<ConversationId> {
        self.published.lock().unwrap().clone()
    }
}

impl ConversationLocator for RecordingLocator {
    fn stored_conversation_id(&self) -> Option<String> {
        self.stored.clone()
    }

    fn publish_conversation_id(&self, id: &ConversationId) {
        self.published.lock().unwrap().push(id.clone());
    }
}
