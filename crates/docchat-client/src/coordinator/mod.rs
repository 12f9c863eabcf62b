//! At most one live reply per conversation view.
//!
//! `submit` supersedes whatever is in flight, records the exchange in the
//! store immediately and spawns a task that streams the reply into the
//! assistant message. Cancellation is cooperative through a
//! `CancellationToken`: the drive task drops the byte stream (closing the
//! connection) as soon as it is cancelled.
//!
//! Lock order is always `pending` then `store`.

mod drive;
mod pending;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use docchat_common::{ClientError, ConversationId, MessageId};

use crate::attachment::Attachment;
use crate::backend::{ChatBackend, ChatRequest};
use crate::collaborators::ConversationLocator;
use crate::store::{ConversationStore, Message, MessagePatch, MessageStatus};
use crate::streaming::DEFAULT_MAX_RECORD_BYTES;
use crate::task::{display_text, TaskKind};

use drive::Drive;
pub(crate) use pending::PendingRequest;

/// The store shared between the view and the coordinator.
pub type SharedStore = Arc<RwLock<ConversationStore>>;

/// Why a reply stopped early. None of these is rendered as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer submission replaced it.
    Superseded,
    UserCancelled,
    /// The caller-imposed deadline passed.
    TimedOut,
    /// The view switched conversations.
    Navigation,
}

impl CancelReason {
    /// Superseded replies are discarded; the others keep what arrived.
    pub fn keeps_partial_text(self) -> bool {
        !matches!(self, CancelReason::Superseded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Completed,
    Failed { message: String, fatal: bool },
    Cancelled(CancelReason),
}

#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Explicit task; otherwise chosen from the prompt and attachments.
    pub task: Option<TaskKind>,
    /// Cancel the reply if it has not finished by then.
    pub timeout: Option<Duration>,
}

impl SubmitOptions {
    pub fn with_task(mut self, task: TaskKind) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Handle to a submitted reply.
#[derive(Debug)]
pub struct ReplyHandle {
    pub user_message_id: MessageId,
    pub assistant_message_id: MessageId,
    join: JoinHandle<ReplyOutcome>,
}

impl ReplyHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the reply to reach a terminal state.
    pub async fn outcome(self) -> ReplyOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => ReplyOutcome::Failed {
                message: format!("reply task ended unexpectedly: {e}"),
                fatal: false,
            },
        }
    }
}

pub struct StreamingCoordinator {
    backend: Arc<dyn ChatBackend>,
    store: SharedStore,
    locator: Option<Arc<dyn ConversationLocator>>,
    pending: Arc<Mutex<Option<PendingRequest>>>,
    default_task: TaskKind,
    max_record_bytes: usize,
}

impl StreamingCoordinator {
    pub fn new(backend: Arc<dyn ChatBackend>, store: SharedStore) -> Self {
        Self {
            backend,
            store,
            locator: None,
            pending: Arc::new(Mutex::new(None)),
            default_task: TaskKind::default(),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    /// Where server-confirmed ids are published.
    pub fn with_locator(mut self, locator: Arc<dyn ConversationLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_default_task(mut self, task: TaskKind) -> Self {
        self.default_task = task;
        self
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Submit a message to `conversation_id`, which must be the one open in
    /// the store.
    ///
    /// Any in-flight reply is superseded first. The user message (complete)
    /// and the assistant placeholder (pending) are in the store when this
    /// returns; the reply itself streams in the background.
    pub async fn submit(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        attachments: Vec<Attachment>,
        options: SubmitOptions,
    ) -> Result<ReplyHandle, ClientError> {
        self.submit_to(Some(conversation_id), text, attachments, options).await
    }

    /// Submit to whatever conversation the store holds at the moment the
    /// locks are taken.
    pub async fn submit_current(
        &self,
        text: &str,
        attachments: Vec<Attachment>,
        options: SubmitOptions,
    ) -> Result<ReplyHandle, ClientError> {
        self.submit_to(None, text, attachments, options).await
    }

    async fn submit_to(
        &self,
        target: Option<&ConversationId>,
        text: &str,
        attachments: Vec<Attachment>,
        options: SubmitOptions,
    ) -> Result<ReplyHandle, ClientError> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(ClientError::Protocol(
                "a message needs text or at least one attachment".into(),
            ));
        }

        let task = TaskKind::resolve(options.task, text, attachments.len(), self.default_task);

        let mut pending = self.pending.lock().await;
        let mut store = self.store.write().await;

        let conversation_id = store.id().clone();
        if let Some(target) = target.filter(|t| **t != conversation_id) {
            return Err(ClientError::Protocol(format!(
                "conversation {target} is not the open conversation"
            )));
        }

        if let Some(previous) = pending.take() {
            info!(
                conversation_id = %previous.conversation_id,
                message_id = %previous.assistant_id,
                "Superseding in-flight reply"
            );
            previous.cancel(CancelReason::Superseded);
            finalize_cancelled(&mut store, &previous.assistant_id, CancelReason::Superseded);
        }

        let user = Message::user(display_text(text, attachments.len()), &attachments);
        let user_id = user.id.clone();
        store.append_message(user)?;
        store.update_message(&user_id, MessagePatch::status(MessageStatus::Complete))?;

        let assistant = Message::assistant_placeholder();
        let assistant_id = assistant.id.clone();
        store.append_message(assistant)?;
        drop(store);

        let request = PendingRequest::new(conversation_id.clone(), assistant_id.clone());
        *pending = Some(request.clone());
        drop(pending);

        // Payloads move into the request; the store kept descriptors only.
        let files = attachments;

        debug!(
            conversation_id = %conversation_id,
            message_id = %assistant_id,
            task = %task,
            files = files.len(),
            "Reply submitted"
        );

        let drive = Drive {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            locator: self.locator.clone(),
            pending: Arc::clone(&self.pending),
            request,
            chat: ChatRequest {
                conversation_id,
                prompt: text.to_string(),
                task: task.as_str().to_string(),
                files,
            },
            timeout: options.timeout,
            max_record_bytes: self.max_record_bytes,
        };
        let join = tokio::spawn(drive.run());

        Ok(ReplyHandle {
            user_message_id: user_id,
            assistant_message_id: assistant_id,
            join,
        })
    }

    /// Cancel the in-flight reply, keeping its partial text. Returns false
    /// when nothing was in flight; calling it again is a no-op.
    pub async fn cancel(&self) -> bool {
        self.retire(CancelReason::UserCancelled).await
    }

    /// Cancel ahead of switching conversations. When this returns, no late
    /// chunk from the old reply can reach the store.
    pub async fn cancel_for_navigation(&self) -> bool {
        self.retire(CancelReason::Navigation).await
    }

    /// Replace the open conversation with `id` and `messages`.
    ///
    /// Whatever is in flight at this moment is cancelled under the same
    /// locks as the reset, including a reply submitted while the caller
    /// was fetching history.
    pub async fn reset_conversation(
        &self,
        id: ConversationId,
        messages: Vec<Message>,
        active_documents: Vec<Attachment>,
    ) -> Result<(), ClientError> {
        let mut pending = self.pending.lock().await;
        let mut store = self.store.write().await;

        if let Some(request) = pending.take() {
            request.cancel(CancelReason::Navigation);
            finalize_cancelled(&mut store, &request.assistant_id, CancelReason::Navigation);
            info!(
                conversation_id = %request.conversation_id,
                message_id = %request.assistant_id,
                "Reply cancelled by conversation switch"
            );
        }

        store.reset(id, messages)?;
        if !active_documents.is_empty() {
            store.set_active_documents(active_documents);
        }
        Ok(())
    }

    /// The assistant message currently being populated, if any.
    pub async fn pending_message_id(&self) -> Option<MessageId> {
        self.pending
            .lock()
            .await
            .as_ref()
            .map(|p| p.assistant_id.clone())
    }

    async fn retire(&self, reason: CancelReason) -> bool {
        let mut pending = self.pending.lock().await;
        let Some(request) = pending.take() else {
            return false;
        };
        request.cancel(reason);
        let mut store = self.store.write().await;
        finalize_cancelled(&mut store, &request.assistant_id, reason);
        info!(
            conversation_id = %request.conversation_id,
            message_id = %request.assistant_id,
            ?reason,
            "Reply cancelled"
        );
        true
    }
}

/// Close a cancelled reply's message quietly. Terminal messages and
/// messages no longer in the store are left alone.
pub(crate) fn finalize_cancelled(
    store: &mut ConversationStore,
    id: &MessageId,
    reason: CancelReason,
) {
    match store.message(id) {
        Some(message) if !message.status.is_terminal() => {}
        _ => return,
    }
    let mut patch = MessagePatch::status(MessageStatus::Cancelled);
    if !reason.keeps_partial_text() {
        patch = patch.with_text("");
    }
    if let Err(e) = store.update_message(id, patch) {
        warn!(message_id = %id, error = %e, "Failed to finalize cancelled reply");
    }
}
