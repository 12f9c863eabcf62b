//! docchat configuration.
//!
//! TOML-based configuration for the conversation client. Every section
//! uses serde defaults so partial files work out of the box. Out-of-range
//! values are reported as warnings and kept as written.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    ClientConfig, DocChatConfig, LogLevel, LoggingConfig, ServerConfig, CONFIG_SCHEMA_VERSION,
};

use docchat_common::ConfigError;

/// Environment variable that overrides `server.base_url`.
pub const BASE_URL_ENV: &str = "DOCCHAT_BASE_URL";

/// Load config from the platform default path and apply environment
/// overrides. Only a missing directory or an unreadable file is an error.
pub fn load_config() -> Result<DocChatConfig, ConfigError> {
    let mut config = toml_loader::load_default()?;
    apply_overrides(&mut config);
    Ok(config)
}

/// Load config from an explicit path and apply environment overrides.
pub fn load_config_from(path: &std::path::Path) -> Result<DocChatConfig, ConfigError> {
    let mut config = toml_loader::load_from_path(path)?;
    apply_overrides(&mut config);
    Ok(config)
}

/// Apply `DOCCHAT_*` environment overrides in place. Returns whether
/// anything changed.
pub fn apply_env_overrides(config: &mut DocChatConfig) -> bool {
    match std::env::var(BASE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => {
            tracing::debug!(base_url = %url, "server.base_url overridden from environment");
            config.server.base_url = url.trim().to_string();
            true
        }
        _ => false,
    }
}

fn apply_overrides(config: &mut DocChatConfig) {
    // The file itself was already checked by the loader.
    if apply_env_overrides(config) {
        if let Err(e) = validation::validate(config) {
            tracing::warn!("config validation warning: {e}");
        }
    }
}
