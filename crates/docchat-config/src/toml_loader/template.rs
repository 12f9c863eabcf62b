//! Default TOML config template with inline documentation comments.

pub(crate) fn default_config_toml() -> String {
    r##"# docchat configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# base_url = "http://localhost:8000"      # DOCCHAT_BASE_URL overrides this
# chat_path = "/chat"
# history_path = "/session/{session_id}"

[client]
# connect_timeout_secs = 10               # 1-120
# reply_timeout_secs = 0                  # 0 = none, else 1-3600
# default_task = "general conversation"   # or "file Q&A", "comparison", "summarization"
# max_record_bytes = 1048576              # 1024-67108864

[logging]
# level = "INFO"                          # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
