//! Full configuration validation.
//!
//! Each section has its own check; all errors are collected into a single
//! `ConfigError`.

mod helpers;


use crate::schema::{DocChatConfig, SESSION_ID_PLACEHOLDER};
use docchat_common::ConfigError;

use helpers::{validate_range, validate_range_usize};

/// Task tags the backend understands.
pub const KNOWN_TASKS: [&str; 4] = [
    "general conversation",
    "file Q&A",
    "comparison",
    "summarization",
];

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &DocChatConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_server(&mut errors, config);
    validate_client(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_server(errors: &mut Vec<String>, config: &DocChatConfig) {
    let server = &config.server;
    if !(server.base_url.starts_with("http://") || server.base_url.starts_with("https://")) {
        errors.push(format!(
            "server.base_url = {:?} must start with http:// or https://",
            server.base_url
        ));
    }
    if !server.chat_path.starts_with('/') {
        errors.push(format!(
            "server.chat_path = {:?} must start with '/'",
            server.chat_path
        ));
    }
    if !server.history_path.starts_with('/') || !server.history_path.contains(SESSION_ID_PLACEHOLDER)
    {
        errors.push(format!(
            "server.history_path = {:?} must start with '/' and contain {SESSION_ID_PLACEHOLDER}",
            server.history_path
        ));
    }
}

fn validate_client(errors: &mut Vec<String>, config: &DocChatConfig) {
    let client = &config.client;
    validate_range(
        errors,
        "client.connect_timeout_secs",
        client.connect_timeout_secs,
        1,
        120,
    );
    if client.reply_timeout_secs != 0 {
        validate_range(
            errors,
            "client.reply_timeout_secs",
            client.reply_timeout_secs,
            1,
            3600,
        );
    }
    validate_range_usize(
        errors,
        "client.max_record_bytes",
        client.max_record_bytes,
        1024,
        64 * 1024 * 1024,
    );
    if !KNOWN_TASKS.contains(&client.default_task.as_str()) {
        errors.push(format!(
            "client.default_task = {:?} is not one of {KNOWN_TASKS:?}",
            client.default_task
        ));
    }
}
