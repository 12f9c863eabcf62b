//! Writing replies and transcripts to the terminal.

use std::io::Write;

use docchat_client::{ConversationStore, MessageId, MessageStatus, Role, SharedStore};

/// Prints an assistant message incrementally as its text grows.
pub struct ReplyPrinter {
    message: MessageId,
    printed: usize,
}

impl ReplyPrinter {
    pub fn new(message: MessageId) -> Self {
        Self { message, printed: 0 }
    }

    /// Write whatever arrived since the last call. Error text is left for
    /// the caller to report on stderr.
    pub async fn flush(&mut self, store: &SharedStore) {
        let store = store.read().await;
        let Some(message) = store.message(&self.message) else {
            return;
        };
        if message.status == MessageStatus::Error {
            return;
        }
        if let Some(delta) = unseen(&message.text, self.printed) {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(delta.as_bytes());
            let _ = stdout.flush();
            self.printed = message.text.len();
        }
    }

    pub fn printed_anything(&self) -> bool {
        self.printed > 0
    }
}

/// The part of `text` after the first `printed` bytes, if any.
fn unseen(text: &str, printed: usize) -> Option<&str> {
    text.get(printed..).filter(|rest| !rest.is_empty())
}

pub fn print_transcript(store: &ConversationStore) {
    if store.is_empty() {
        eprintln!("(no messages)");
        return;
    }
    for message in store.messages() {
        match message.role {
            Role::User => {
                let files: Vec<&str> = message.attachments.iter().map(|a| a.name.as_str()).collect();
                if files.is_empty() {
                    println!("> {}", message.text);
                } else {
                    println!("> {} [{}]", message.text, files.join(", "));
                }
            }
            Role::Assistant => println!("{}\n", message.text),
        }
    }
}
