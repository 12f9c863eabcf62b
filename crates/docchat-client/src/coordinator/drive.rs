//! The background task that streams one reply into the store.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use docchat_common::{ClientError, ConversationId};

use super::{finalize_cancelled, CancelReason, PendingRequest, ReplyOutcome, SharedStore};
use crate::backend::{ChatBackend, ChatRequest};
use crate::collaborators::ConversationLocator;
use crate::protocol::StreamEvent;
use crate::store::{MessagePatch, MessageStatus, StoreError};
use crate::streaming::{SseFrameParser, CLOSED_EARLY};

pub(super) struct Drive {
    pub(super) backend: Arc<dyn ChatBackend>,
    pub(super) store: SharedStore,
    pub(super) locator: Option<Arc<dyn ConversationLocator>>,
    pub(super) pending: Arc<Mutex<Option<PendingRequest>>>,
    pub(super) request: PendingRequest,
    pub(super) chat: ChatRequest,
    pub(super) timeout: Option<Duration>,
    pub(super) max_record_bytes: usize,
}

/// How the stream itself ended, when nobody cancelled it.
enum Ended {
    Outcome(ReplyOutcome),
    /// The store no longer holds our message.
    Detached,
}

impl Drive {
    pub(super) async fn run(self) -> ReplyOutcome {
        let token = self.request.token();
        let deadline = self.timeout.map(|t| Instant::now() + t);

        let ended = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            _ = wait_until(deadline) => {
                self.expire().await;
                None
            }
            ended = self.pump() => Some(ended),
        };

        let outcome = match ended {
            None => ReplyOutcome::Cancelled(
                self.request.reason().unwrap_or(CancelReason::UserCancelled),
            ),
            Some(Ended::Detached) => {
                warn!(
                    message_id = %self.request.assistant_id,
                    "Reply target left the store; stopping"
                );
                ReplyOutcome::Cancelled(self.request.reason().unwrap_or(CancelReason::Navigation))
            }
            Some(Ended::Outcome(outcome)) => outcome,
        };

        self.release().await;
        outcome
    }

    /// Deadline hit: cancel exactly like a user cancel.
    async fn expire(&self) {
        let mut pending = self.pending.lock().await;
        if !self.owns(pending.as_ref()) {
            // someone else already retired this request
            return;
        }
        pending.take();
        if self.request.cancel(CancelReason::TimedOut) {
            info!(
                conversation_id = %self.request.conversation_id,
                message_id = %self.request.assistant_id,
                "Reply timed out"
            );
        }
        let mut store = self.store.write().await;
        finalize_cancelled(
            &mut store,
            &self.request.assistant_id,
            self.request.reason().unwrap_or(CancelReason::TimedOut),
        );
    }

    /// Clear the pending slot if it still points at this request.
    async fn release(&self) {
        let mut pending = self.pending.lock().await;
        if self.owns(pending.as_ref()) {
            pending.take();
        }
    }

    fn owns(&self, slot: Option<&PendingRequest>) -> bool {
        slot.is_some_and(|p| p.assistant_id == self.request.assistant_id)
    }

    async fn pump(&self) -> Ended {
        let mut stream = match self.backend.open_reply_stream(self.chat.clone()).await {
            Ok(stream) => stream,
            Err(err) => return self.fail(&err.to_string(), err.is_fatal()).await,
        };

        let mut parser = SseFrameParser::with_max_record_bytes(self.max_record_bytes);
        let mut started = false;

        loop {
            let events = match stream.next().await {
                Some(Ok(bytes)) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    if !started {
                        started = true;
                        if let Some(ended) = self.mark_streaming().await {
                            return ended;
                        }
                    }
                    parser.feed(&bytes)
                }
                Some(Err(err)) => {
                    debug!(error = %err, "Reply stream failed");
                    return self.transport_failure(err).await;
                }
                None => {
                    for event in parser.finish() {
                        if let Some(ended) = self.apply(event).await {
                            return ended;
                        }
                    }
                    return self.fail(CLOSED_EARLY, false).await;
                }
            };

            for event in events {
                if let Some(ended) = self.apply(event).await {
                    return ended;
                }
            }
        }
    }

    async fn mark_streaming(&self) -> Option<Ended> {
        let mut store = self.store.write().await;
        if self.request.is_cancelled() {
            return Some(Ended::Outcome(ReplyOutcome::Cancelled(
                self.request.reason().unwrap_or(CancelReason::UserCancelled),
            )));
        }
        match store.update_message(
            &self.request.assistant_id,
            MessagePatch::status(MessageStatus::Streaming),
        ) {
            Ok(()) => None,
            Err(StoreError::UnknownMessage(_)) => Some(Ended::Detached),
            Err(e) => {
                warn!(error = %e, "Could not mark reply as streaming");
                None
            }
        }
    }

    /// Apply one event under the store lock. Returns `Some` once the reply
    /// has reached a terminal state.
    async fn apply(&self, event: StreamEvent) -> Option<Ended> {
        let id = &self.request.assistant_id;
        let mut store = self.store.write().await;
        if self.request.is_cancelled() {
            return Some(Ended::Outcome(ReplyOutcome::Cancelled(
                self.request.reason().unwrap_or(CancelReason::UserCancelled),
            )));
        }
        if store.message(id).is_none() {
            // the conversation was replaced underneath us
            return Some(Ended::Detached);
        }

        let result = match event {
            StreamEvent::Chunk(text) => store.update_message(id, MessagePatch::append(text)),
            StreamEvent::Session {
                session_id,
                active_documents,
            } => {
                let resolved = ConversationId::reconcile(store.id(), Some(&session_id));
                if store.set_id(resolved.clone()) {
                    info!(conversation_id = %resolved, "Server assigned conversation id");
                    if let Some(locator) = &self.locator {
                        locator.publish_conversation_id(&resolved);
                    }
                }
                store.set_active_documents(active_documents);
                Ok(())
            }
            StreamEvent::Done => {
                return match store.update_message(id, MessagePatch::status(MessageStatus::Complete))
                {
                    Ok(()) => Some(Ended::Outcome(ReplyOutcome::Completed)),
                    Err(StoreError::UnknownMessage(_)) => Some(Ended::Detached),
                    Err(e) => {
                        warn!(error = %e, "Could not complete reply");
                        Some(Ended::Outcome(ReplyOutcome::Failed {
                            message: e.to_string(),
                            fatal: false,
                        }))
                    }
                };
            }
            StreamEvent::Error(message) => {
                warn!(message_id = %id, error = %message, "Reply failed");
                let patch = MessagePatch::status(MessageStatus::Error)
                    .with_text(format!("Error: {message}"));
                return match store.update_message(id, patch) {
                    Err(StoreError::UnknownMessage(_)) => Some(Ended::Detached),
                    _ => Some(Ended::Outcome(ReplyOutcome::Failed {
                        message,
                        fatal: false,
                    })),
                };
            }
        };

        match result {
            Ok(()) => None,
            Err(StoreError::UnknownMessage(_)) => Some(Ended::Detached),
            Err(e) => {
                warn!(message_id = %id, error = %e, "Dropping event the store rejected");
                None
            }
        }
    }

    async fn transport_failure(&self, err: ClientError) -> Ended {
        warn!(
            conversation_id = %self.request.conversation_id,
            error = %err,
            "Reply transport failed"
        );
        self.fail(&err.to_string(), err.is_fatal()).await
    }

    async fn fail(&self, message: &str, fatal: bool) -> Ended {
        let mut store = self.store.write().await;
        if self.request.is_cancelled() {
            return Ended::Outcome(ReplyOutcome::Cancelled(
                self.request.reason().unwrap_or(CancelReason::UserCancelled),
            ));
        }
        let patch = MessagePatch::status(MessageStatus::Error).with_text(format!("Error: {message}"));
        if let Err(e) = store.update_message(&self.request.assistant_id, patch) {
            if matches!(e, StoreError::UnknownMessage(_)) {
                return Ended::Detached;
            }
            warn!(error = %e, "Could not record reply failure");
        }
        Ended::Outcome(ReplyOutcome::Failed {
            message: message.to_string(),
            fatal,
        })
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
