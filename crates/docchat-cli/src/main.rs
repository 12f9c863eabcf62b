mod cli;
mod env;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use docchat_client::{
    Attachment, ChatBackend, ChatSession, ConversationEvent, ConversationLocator, HttpBackend,
    OpenOutcome, ReplyOutcome,
};
use docchat_common::{ClientError, ConfigError, NoticeLevel};
use docchat_config::DocChatConfig;

use crate::env::{EnvCredential, TerminalLocator};
use crate::output::{print_transcript, ReplyPrinter};

const EXIT_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

fn load_config(args: &cli::Args) -> Result<DocChatConfig, ConfigError> {
    match &args.config {
        Some(path) => docchat_config::load_config_from(path),
        None => docchat_config::load_config(),
    }
}

fn init_logging(args: &cli::Args, config: Option<&DocChatConfig>) {
    let level = args
        .log_level
        .clone()
        .or_else(|| config.map(|c| c.logging.level.as_filter().to_string()))
        .unwrap_or_else(|| "info".to_string());
    let directive = format!("docchat={level}");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Logging depends on the config, so config errors are reported after.
    // Out-of-range values only warn; the parsed file is still used.
    let loaded = load_config(&args);
    init_logging(&args, loaded.as_ref().ok());
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Config unreadable; falling back to defaults");
        let mut config = DocChatConfig::default();
        docchat_config::apply_env_overrides(&mut config);
        config
    });

    match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("docchat: {e}");
            ExitCode::from(if e.is_fatal() { EXIT_FATAL } else { EXIT_FAILED })
        }
    }
}

async fn run(args: cli::Args, config: DocChatConfig) -> Result<ExitCode, ClientError> {
    let locator = Arc::new(TerminalLocator::new(args.session.clone()));
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(
        config.server.clone(),
        &config.client,
        Arc::new(EnvCredential),
    )?);
    let dyn_locator: Arc<dyn ConversationLocator> = locator.clone();
    let session = ChatSession::new(backend, dyn_locator, &config.client);

    let opened = session.initialize().await?;
    for notice in session.notices().await {
        let tag = match notice.level {
            NoticeLevel::Info => "note",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("docchat: {tag}: {}", notice.message);
    }

    if !args.has_message() {
        if let OpenOutcome::Restored { .. } = opened {
            print_transcript(&*session.store().read().await);
        }
        eprintln!("conversation: {}", opened.conversation_id());
        return Ok(ExitCode::SUCCESS);
    }

    let mut attachments = Vec::with_capacity(args.files.len());
    for path in &args.files {
        attachments.push(Attachment::from_path(path).await?);
    }

    let mut events = session.subscribe().await;
    let prompt = args.prompt.unwrap_or_default();
    let handle = session.submit(&prompt, attachments, args.task).await?;
    let mut printer = ReplyPrinter::new(handle.assistant_message_id.clone());
    let assistant = handle.assistant_message_id.clone();

    let reply = handle.outcome();
    tokio::pin!(reply);
    let mut interrupted = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut reply => break outcome,
            event = events.recv() => match event {
                Ok(ConversationEvent::MessageUpdated(id)) if id == assistant => {
                    printer.flush(session.store()).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event receiver lagged");
                    printer.flush(session.store()).await;
                }
                Err(RecvError::Closed) => break (&mut reply).await,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                session.cancel().await;
            }
        }
    };
    printer.flush(session.store()).await;
    if printer.printed_anything() {
        println!();
    }

    let conversation_id = match locator.current() {
        Some(id) => id,
        None => session.conversation_id().await,
    };
    eprintln!("conversation: {conversation_id}");

    let code = match outcome {
        ReplyOutcome::Completed => ExitCode::SUCCESS,
        ReplyOutcome::Failed { message, fatal } => {
            eprintln!("docchat: {message}");
            ExitCode::from(if fatal { EXIT_FATAL } else { EXIT_FAILED })
        }
        ReplyOutcome::Cancelled(reason) => {
            eprintln!("docchat: reply cancelled ({reason:?})");
            ExitCode::from(EXIT_CANCELLED)
        }
    };
    Ok(code)
}
