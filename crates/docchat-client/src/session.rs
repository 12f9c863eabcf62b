//! The per-view owner of one conversation.
//!
//! Switching conversations cancels the in-flight reply up front and again
//! under the locks that replace the store, so neither a late chunk nor a
//! reply submitted during the history fetch can land in the wrong
//! conversation. History failures fall back to a fresh conversation and
//! leave a transient notice instead of an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use docchat_common::{ClientError, ConversationEvent, ConversationId, Notice, NoticeQueue};
use docchat_config::ClientConfig;

use crate::attachment::Attachment;
use crate::backend::ChatBackend;
use crate::collaborators::ConversationLocator;
use crate::coordinator::{ReplyHandle, SharedStore, StreamingCoordinator, SubmitOptions};
use crate::history::HistoryLoader;
use crate::store::ConversationStore;
use crate::task::TaskKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Restored {
        conversation_id: ConversationId,
        message_count: usize,
    },
    /// The requested conversation could not be used; a new one was started.
    StartedFresh {
        conversation_id: ConversationId,
        reason: String,
    },
}

impl OpenOutcome {
    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            OpenOutcome::Restored {
                conversation_id, ..
            }
            | OpenOutcome::StartedFresh {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

pub struct ChatSession {
    store: SharedStore,
    coordinator: StreamingCoordinator,
    history: HistoryLoader,
    locator: Arc<dyn ConversationLocator>,
    notices: Mutex<NoticeQueue>,
    reply_timeout: Option<Duration>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        locator: Arc<dyn ConversationLocator>,
        config: &ClientConfig,
    ) -> Self {
        let default_task = config.default_task.parse::<TaskKind>().unwrap_or_else(|e| {
            warn!(error = %e, "Unknown default task; using general conversation");
            TaskKind::default()
        });

        let store: SharedStore = Arc::new(RwLock::new(ConversationStore::default()));
        let coordinator = StreamingCoordinator::new(Arc::clone(&backend), Arc::clone(&store))
            .with_locator(Arc::clone(&locator))
            .with_default_task(default_task)
            .with_max_record_bytes(config.max_record_bytes);

        Self {
            store,
            coordinator,
            history: HistoryLoader::new(backend),
            locator,
            notices: Mutex::new(NoticeQueue::default()),
            reply_timeout: config.reply_timeout(),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.store.read().await.subscribe()
    }

    pub async fn conversation_id(&self) -> ConversationId {
        self.store.read().await.id().clone()
    }

    /// Resume the conversation the locator remembers, or start a new one.
    pub async fn initialize(&self) -> Result<OpenOutcome, ClientError> {
        match self.locator.stored_conversation_id() {
            Some(stored) => self.open(&stored).await,
            None => {
                let conversation_id = self.start_new().await?;
                Ok(OpenOutcome::StartedFresh {
                    conversation_id,
                    reason: "no stored conversation".into(),
                })
            }
        }
    }

    /// Open an existing conversation by id.
    ///
    /// Only an unauthorized history request is returned as an error; every
    /// other failure starts a fresh conversation and queues a notice.
    pub async fn open(&self, candidate: &str) -> Result<OpenOutcome, ClientError> {
        self.coordinator.cancel_for_navigation().await;

        let Some(id) = ConversationId::parse(candidate) else {
            return self
                .fall_back(format!("'{}' is not a valid conversation id", candidate.trim()))
                .await;
        };

        match self.history.load(&id, &self.coordinator).await {
            Ok(message_count) => {
                self.locator.publish_conversation_id(&id);
                Ok(OpenOutcome::Restored {
                    conversation_id: id,
                    message_count,
                })
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => self.fall_back(err.to_string()).await,
        }
    }

    /// Abandon the current conversation and start an empty one.
    pub async fn start_new(&self) -> Result<ConversationId, ClientError> {
        self.coordinator.cancel_for_navigation().await;

        let id = ConversationId::generate();
        self.coordinator
            .reset_conversation(id.clone(), Vec::new(), Vec::new())
            .await?;
        self.locator.publish_conversation_id(&id);
        info!(conversation_id = %id, "Started new conversation");
        Ok(id)
    }

    pub async fn submit(
        &self,
        text: &str,
        attachments: Vec<Attachment>,
        task: Option<TaskKind>,
    ) -> Result<ReplyHandle, ClientError> {
        let options = SubmitOptions {
            task,
            timeout: self.reply_timeout,
        };
        self.coordinator.submit_current(text, attachments, options).await
    }

    pub async fn cancel(&self) -> bool {
        self.coordinator.cancel().await
    }

    /// Take every pending notice.
    pub async fn notices(&self) -> Vec<Notice> {
        self.notices.lock().await.drain()
    }

    async fn fall_back(&self, reason: String) -> Result<OpenOutcome, ClientError> {
        warn!(%reason, "Could not open conversation; starting a new one");
        let conversation_id = self.start_new().await?;

        let notice = Notice::warning(format!(
            "Could not load that conversation ({reason}). Started a new one."
        ))
        .for_conversation(conversation_id.clone());
        self.store.read().await.notify(notice.message.clone());
        self.notices.lock().await.push(notice);

        Ok(OpenOutcome::StartedFresh {
            conversation_id,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use docchat_common::NoticeLevel;

    use super::*;
    use crate::coordinator::{CancelReason, ReplyOutcome};
    use crate::protocol::HistoryResponse;
    use crate::store::MessageStatus;
    use crate::testing::{chunk, delay_ms, done, record, RecordingLocator, ScriptedBackend, Step};

    const STORED: &str = "0f5e2a1c-9b4d-4e6f-8a7b-1c2d3e4f5a6b";

    fn session(backend: ScriptedBackend, locator: RecordingLocator) -> (ChatSession, Arc<ScriptedBackend>, Arc<RecordingLocator>) {
        let backend = Arc::new(backend);
        let locator = Arc::new(locator);
        let dyn_backend: Arc<dyn ChatBackend> = backend.clone();
        let dyn_locator: Arc<dyn ConversationLocator> = locator.clone();
        let session = ChatSession::new(dyn_backend, dyn_locator, &ClientConfig::default());
        (session, backend, locator)
    }

    fn one_exchange() -> HistoryResponse {
        serde_json::from_value(serde_json::json!({
            "chat_history": [{"prompt": "q", "response": "a"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn initialize_without_stored_id_starts_fresh() {
        let (session, backend, locator) = session(ScriptedBackend::new(), RecordingLocator::default());

        let outcome = session.initialize().await.unwrap();

        assert!(matches!(outcome, OpenOutcome::StartedFresh { .. }));
        assert!(outcome.conversation_id().is_valid());
        assert_eq!(locator.published(), vec![outcome.conversation_id().clone()]);
        assert!(backend.history_requests().is_empty());
        assert!(session.notices().await.is_empty());
    }

    #[tokio::test]
    async fn initialize_restores_stored_conversation() {
        let (session, backend, locator) = session(
            ScriptedBackend::new().history(Ok(one_exchange())),
            RecordingLocator::with_stored(STORED),
        );

        let outcome = session.initialize().await.unwrap();

        assert_eq!(
            outcome,
            OpenOutcome::Restored {
                conversation_id: ConversationId::parse(STORED).unwrap(),
                message_count: 2,
            }
        );
        assert_eq!(backend.history_requests()[0].as_str(), STORED);
        assert_eq!(locator.published()[0].as_str(), STORED);
        assert_eq!(session.store().read().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_id_falls_back_without_a_request() {
        let (session, backend, _) = session(ScriptedBackend::new(), RecordingLocator::default());
        let mut events = session.subscribe().await;

        let outcome = session.open("../../etc/passwd").await.unwrap();

        assert!(matches!(outcome, OpenOutcome::StartedFresh { .. }));
        assert!(backend.history_requests().is_empty());

        let notices = session.notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);

        let mut saw_notice = false;
        while let Ok(event) = events.try_recv() {
            saw_notice |= matches!(event, ConversationEvent::Notice(_));
        }
        assert!(saw_notice);
    }

    #[tokio::test]
    async fn history_failure_falls_back_to_new_conversation() {
        let (session, _, _) = session(ScriptedBackend::new(), RecordingLocator::default());

        let outcome = session.open(STORED).await.unwrap();

        match outcome {
            OpenOutcome::StartedFresh {
                conversation_id,
                reason,
            } => {
                assert_ne!(conversation_id.as_str(), STORED);
                assert_eq!(reason, "Session not found");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(session.store().read().await.is_empty());
        assert_eq!(session.notices().await.len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_history_is_surfaced() {
        let (session, _, _) = session(
            ScriptedBackend::new().history(Err(ClientError::Unauthorized("expired".into()))),
            RecordingLocator::default(),
        );

        let err = session.open(STORED).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn switching_conversations_cancels_the_live_reply() {
        let (session, _, _) = session(
            ScriptedBackend::new()
                .reply(vec![chunk("old"), delay_ms(30), chunk(" stale"), done()])
                .history(Ok(one_exchange())),
            RecordingLocator::default(),
        );
        session.start_new().await.unwrap();

        let handle = session.submit("hello", Vec::new(), None).await.unwrap();
        for _ in 0..400 {
            if session.store().read().await.streaming_message().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        session.open(STORED).await.unwrap();

        assert_eq!(
            handle.outcome().await,
            ReplyOutcome::Cancelled(CancelReason::Navigation)
        );
        tokio::time::sleep(Duration::from_millis(60)).await;

        let store = session.store().read().await;
        assert_eq!(store.id().as_str(), STORED);
        assert_eq!(store.len(), 2);
        assert!(store.messages().iter().all(|m| !m.text.contains("stale")));
        assert!(store.streaming_message().is_none());
    }

    #[tokio::test]
    async fn reply_submitted_while_history_loads_cannot_touch_the_opened_conversation() {
        let history: HistoryResponse = serde_json::from_value(serde_json::json!({
            "chat_history": [{"prompt": "q", "response": "a"}],
            "active_documents": ["report.pdf"]
        }))
        .unwrap();
        let (session, _, locator) = session(
            ScriptedBackend::new()
                .history(Ok(history))
                .history_delay(Duration::from_millis(50))
                .reply_to(
                    "old question",
                    vec![
                        delay_ms(10),
                        chunk("old"),
                        delay_ms(90),
                        record(r#"{"session_id":"server-old","active_documents":["old.pdf"]}"#),
                        done(),
                    ],
                ),
            RecordingLocator::default(),
        );
        session.start_new().await.unwrap();

        let (opened, submitted) = tokio::join!(session.open(STORED), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            session.submit("old question", Vec::new(), None).await
        });
        assert!(matches!(opened.unwrap(), OpenOutcome::Restored { .. }));
        assert_eq!(
            submitted.unwrap().outcome().await,
            ReplyOutcome::Cancelled(CancelReason::Navigation)
        );
        tokio::time::sleep(Duration::from_millis(120)).await;

        let store = session.store().read().await;
        assert_eq!(store.id().as_str(), STORED);
        let documents: Vec<_> = store.active_documents().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(documents, vec!["report.pdf"]);
        assert_eq!(store.len(), 2);
        assert!(store.messages().iter().all(|m| m.text != "old question"));
        assert!(locator.published().iter().all(|id| id.as_str() != "server-old"));
    }

    #[tokio::test]
    async fn submit_and_cancel_through_the_session() {
        let (session, _, _) = session(
            ScriptedBackend::new().reply(vec![chunk("partial"), Step::Hang]),
            RecordingLocator::default(),
        );
        session.start_new().await.unwrap();

        let handle = session.submit("hello", Vec::new(), None).await.unwrap();
        let assistant = handle.assistant_message_id.clone();
        for _ in 0..400 {
            if session.store().read().await.streaming_message().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(session.cancel().await);
        assert_eq!(
            handle.outcome().await,
            ReplyOutcome::Cancelled(CancelReason::UserCancelled)
        );
        let store = session.store().read().await;
        let message = store.message(&assistant).unwrap();
        assert_eq!(message.status, MessageStatus::Cancelled);
        assert_eq!(message.text, "partial");
    }

    #[tokio::test]
    async fn session_applies_configured_reply_timeout() {
        let backend = Arc::new(ScriptedBackend::new().reply(vec![Step::Hang]));
        let config = ClientConfig {
            reply_timeout_secs: 1,
            ..Default::default()
        };
        let dyn_backend: Arc<dyn ChatBackend> = backend.clone();
        let session = ChatSession::new(
            dyn_backend,
            Arc::new(RecordingLocator::default()),
            &config,
        );

        let handle = session.submit("hello", Vec::new(), None).await.unwrap();
        assert_eq!(
            handle.outcome().await,
            ReplyOutcome::Cancelled(CancelReason::TimedOut)
        );
    }
}
