use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::id::ConversationId;

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A non-blocking message for the UI, e.g. "could not load that
/// conversation, started a new one".
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub conversation_id: Option<ConversationId>,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Info, message, Duration::from_secs(5))
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Warning, message, Duration::from_secs(8))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Error, message, Duration::from_secs(10))
    }

    fn with_level(level: NoticeLevel, message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            level,
            message: message.into(),
            conversation_id: None,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Attach the conversation the notice is about.
    pub fn for_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Bounded queue of notices; expired entries are evicted on access.
#[derive(Debug)]
pub struct NoticeQueue {
    items: VecDeque<Notice>,
    capacity: usize,
}

impl NoticeQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a notice. At capacity the oldest entry is dropped.
    pub fn push(&mut self, notice: Notice) {
        self.evict_expired();
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(notice);
    }

    pub fn visible(&mut self) -> Vec<&Notice> {
        self.evict_expired();
        self.items.iter().collect()
    }

    /// Remove and return every pending notice.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.evict_expired();
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict_expired(&mut self) {
        self.items.retain(|n| !n.is_expired());
    }
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(8)
    }
}
