use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use docchat_common::{ConversationId, MessageId};

use super::CancelReason;

/// The coordinator's record of the in-flight call. Clones share the same
/// token and reason, so the drive task and the coordinator see one state.
#[derive(Debug, Clone)]
pub(crate) struct PendingRequest {
    pub(crate) conversation_id: ConversationId,
    pub(crate) assistant_id: MessageId,
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl PendingRequest {
    pub(crate) fn new(conversation_id: ConversationId, assistant_id: MessageId) -> Self {
        Self {
            conversation_id,
            assistant_id,
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// Cancel with `reason`. The first reason sticks; returns false if the
    /// request was already cancelled.
    pub(crate) fn cancel(&self, reason: CancelReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
