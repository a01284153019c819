//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `AZURE_OPENAI_ENDPOINT` and `LENDING_BOT_LOG_LEVEL` env overrides.
//! The API key is only ever read from `AZURE_OPENAI_API_KEY`.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs (`Config`, `AzureConfig`,
//!   `RunnerConfig`, etc.).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawAzure`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests: dummy backend, no API key, fast polling.
    pub fn test_default() -> Self {
        use std::time::Duration;

        Self {
            bot_name: "test".into(),
            log_level: "info".into(),
            log_file: None,
            assistant: AssistantConfig {
                backend: "dummy".into(),
                name: "Lending Copilot".into(),
                model: "test-model".into(),
                instructions: "test instructions".into(),
                vector_store_id: None,
            },
            azure: AzureConfig {
                endpoint: "http://localhost:0".into(),
                api_version: raw::default_api_version(),
                timeout_seconds: 1,
            },
            runner: RunnerConfig {
                poll_interval: Duration::from_millis(1),
                run_timeout: Duration::from_secs(5),
            },
            indexing: IndexingConfig {
                vector_store_name: raw::default_vector_store_name(),
                poll_interval: Duration::from_millis(1),
                max_poll_interval: Duration::from_millis(4),
                timeout: Duration::from_secs(5),
                cleanup: false,
            },
            preprocess: PreprocessConfig { max_chars: raw::default_max_chars() },
            api_key: None,
        }
    }
}
