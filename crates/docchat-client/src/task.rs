//! Task tag policy: which intent accompanies a submission.
//!
//! The backend branches on the `task` field. Selection follows the chat
//! input's rules: attaching files to a plain conversation turns it into a
//! document task, removing them turns it back.

use std::fmt;
use std::str::FromStr;

/// User-visible text for a submission that carries only files.
pub const FILE_UPLOAD_LABEL: &str = "[File Upload]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskKind {
    #[default]
    GeneralConversation,
    FileQa,
    Comparison,
    Summarization,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GeneralConversation => "general conversation",
            TaskKind::FileQa => "file Q&A",
            TaskKind::Comparison => "comparison",
            TaskKind::Summarization => "summarization",
        }
    }

    /// Adjust a selection after the attachment list changed.
    pub fn for_attachments(self, count: usize) -> TaskKind {
        match (self, count) {
            (_, 0) => TaskKind::GeneralConversation,
            (TaskKind::GeneralConversation, 1) | (TaskKind::Comparison, 1) => TaskKind::FileQa,
            (TaskKind::GeneralConversation, _) => TaskKind::Comparison,
            (task, _) => task,
        }
    }

    /// The task to send. An explicit choice wins; an empty prompt with
    /// files defaults to summarization; otherwise `fallback` adjusted for
    /// the attachment count.
    pub fn resolve(
        explicit: Option<TaskKind>,
        prompt: &str,
        attachment_count: usize,
        fallback: TaskKind,
    ) -> TaskKind {
        if let Some(task) = explicit {
            return task;
        }
        if prompt.trim().is_empty() && attachment_count > 0 {
            return TaskKind::Summarization;
        }
        fallback.for_attachments(attachment_count)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general conversation" | "general" | "chat" => Ok(TaskKind::GeneralConversation),
            "file q&a" | "file-qa" | "qa" => Ok(TaskKind::FileQa),
            "comparison" | "compare" => Ok(TaskKind::Comparison),
            "summarization" | "summarize" | "summary" => Ok(TaskKind::Summarization),
            other => Err(format!("unknown task: {other}")),
        }
    }
}

/// Text shown in the user's bubble for a submission.
pub fn display_text(prompt: &str, attachment_count: usize) -> String {
    if prompt.trim().is_empty() && attachment_count > 0 {
        FILE_UPLOAD_LABEL.to_string()
    } else {
        prompt.to_string()
    }
}
