//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape, the serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub bot: RawBot,
    #[serde(default)]
    pub assistant: RawAssistant,
    #[serde(default)]
    pub azure: RawAzure,
    #[serde(default)]
    pub runner: RawRunner,
    #[serde(default)]
    pub indexing: RawIndexing,
    #[serde(default)]
    pub preprocess: RawPreprocess,
}

#[derive(Deserialize)]
pub(super) struct RawBot {
    #[serde(default = "default_bot_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawBot {
    fn default() -> Self {
        Self { name: default_bot_name(), log_level: default_log_level(), log_file: None }
    }
}

// ── Assistant ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawAssistant {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_instructions")]
    pub instructions: String,
    #[serde(default)]
    pub vector_store_id: Option<String>,
}

impl Default for RawAssistant {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            name: default_assistant_name(),
            model: default_model(),
            instructions: default_instructions(),
            vector_store_id: None,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawAzure {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawAzure {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_version: default_api_version(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ── Runner / indexing / preprocess ───────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawRunner {
    #[serde(default = "default_run_poll_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_run_timeout_seconds")]
    pub run_timeout_seconds: u64,
}

impl Default for RawRunner {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_run_poll_ms(),
            run_timeout_seconds: default_run_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawIndexing {
    #[serde(default = "default_vector_store_name")]
    pub vector_store_name: String,
    #[serde(default = "default_index_poll_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_index_max_poll_ms")]
    pub max_poll_interval_ms: u64,
    #[serde(default = "default_index_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub cleanup: bool,
}

impl Default for RawIndexing {
    fn default() -> Self {
        Self {
            vector_store_name: default_vector_store_name(),
            poll_interval_ms: default_index_poll_ms(),
            max_poll_interval_ms: default_index_max_poll_ms(),
            timeout_seconds: default_index_timeout_seconds(),
            cleanup: false,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawPreprocess {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for RawPreprocess {
    fn default() -> Self {
        Self { max_chars: default_max_chars() }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_bot_name() -> String {
    "lending-bot".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_backend() -> String {
    "azure".to_string()
}
fn default_assistant_name() -> String {
    "Lending Copilot".to_string()
}
fn default_model() -> String {
    "GPT4O_DEPLOYMENT".to_string()
}
fn default_instructions() -> String {
    "You answer lending questions, cite sources, and call tools as needed.".to_string()
}
pub(super) fn default_api_version() -> String {
    "2025-03-01-preview".to_string()
}
fn default_timeout_seconds() -> u64 {
    60
}
fn default_run_poll_ms() -> u64 {
    750
}
fn default_run_timeout_seconds() -> u64 {
    300
}
pub(super) fn default_vector_store_name() -> String {
    "temp_vs".to_string()
}
fn default_index_poll_ms() -> u64 {
    500
}
fn default_index_max_poll_ms() -> u64 {
    5_000
}
fn default_index_timeout_seconds() -> u64 {
    300
}
pub(super) fn default_max_chars() -> usize {
    8_000
}
