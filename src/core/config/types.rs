//! Public configuration types, resolved from raw TOML by the `load` module.

use std::path::PathBuf;
use std::time::Duration;

/// Assistant definition sent to the hosted service at startup.
/// Populated from `[assistant]` in the TOML.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Which backend is active (`"azure"` or `"dummy"`).
    pub backend: String,
    /// Display name of the created assistant.
    pub name: String,
    /// Model or Azure deployment name.
    pub model: String,
    /// System instructions attached to the assistant.
    pub instructions: String,
    /// Existing vector store to attach for `file_search`. Ignored when
    /// temporary files are indexed at startup.
    pub vector_store_id: Option<String>,
}

/// Azure OpenAI connection settings (`[azure]`).
#[derive(Debug, Clone)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Run polling settings (`[runner]`).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Delay between run status polls.
    pub poll_interval: Duration,
    /// Upper bound on a single run, tool round-trips included.
    pub run_timeout: Duration,
}

/// Temporary file indexing settings (`[indexing]`).
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    pub vector_store_name: String,
    /// First delay between vector store polls; doubles up to `max_poll_interval`.
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub timeout: Duration,
    /// Delete the temporary vector store and uploaded files on shutdown.
    pub cleanup: bool,
}

/// Prompt preprocessing settings (`[preprocess]`).
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub max_chars: usize,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    /// Optional log file; logs go to stderr when unset.
    pub log_file: Option<PathBuf>,
    pub assistant: AssistantConfig,
    pub azure: AzureConfig,
    pub runner: RunnerConfig,
    pub indexing: IndexingConfig,
    pub preprocess: PreprocessConfig,
    /// API key from `AZURE_OPENAI_API_KEY`. Never sourced from TOML.
    pub api_key: Option<String>,
}
