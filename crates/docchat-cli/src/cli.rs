use std::path::PathBuf;

use clap::Parser;

use docchat_client::TaskKind;

/// docchat: ask the document assistant from a terminal.
#[derive(Parser, Debug)]
#[command(name = "docchat", version, about)]
pub struct Args {
    /// Message to send. Without one (and without files) the conversation
    /// transcript is printed instead.
    pub prompt: Option<String>,

    /// Conversation to resume.
    #[arg(short, long)]
    pub session: Option<String>,

    /// Attach a file (repeatable).
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Task tag: "general conversation", "file Q&A", "comparison" or
    /// "summarization". Chosen from the attachments when omitted.
    #[arg(short, long)]
    pub task: Option<TaskKind>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    pub fn has_message(&self) -> bool {
        self.prompt.as_deref().is_some_and(|p| !p.trim().is_empty()) || !self.files.is_empty()
    }
}

pub fn parse() -> Args {
    Args::parse()
}
