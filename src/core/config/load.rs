//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `AZURE_OPENAI_ENDPOINT` and `LENDING_BOT_LOG_LEVEL` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

const KNOWN_BACKENDS: &[&str] = &["azure", "dummy"];

/// Deep-merge two TOML values.
/// Tables are merged recursively; the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let endpoint_override = env::var("AZURE_OPENAI_ENDPOINT").ok();
    let log_level_override = env::var("LENDING_BOT_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            endpoint_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(
            default_path,
            endpoint_override.as_deref(),
            log_level_override.as_deref(),
        )
    } else {
        resolve(
            RawConfig::default(),
            endpoint_override.as_deref(),
            log_level_override.as_deref(),
        )
    }
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(
    path: &Path,
    endpoint_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    resolve(parsed, endpoint_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    endpoint_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let a = parsed.assistant;
    if !KNOWN_BACKENDS.contains(&a.backend.as_str()) {
        return Err(AppError::Config(format!(
            "unknown assistant backend '{}' (expected one of: {})",
            a.backend,
            KNOWN_BACKENDS.join(", ")
        )));
    }

    let ix = parsed.indexing;
    if ix.max_poll_interval_ms < ix.poll_interval_ms {
        return Err(AppError::Config(format!(
            "indexing.max_poll_interval_ms ({}) is smaller than indexing.poll_interval_ms ({})",
            ix.max_poll_interval_ms, ix.poll_interval_ms
        )));
    }
    if parsed.preprocess.max_chars == 0 {
        return Err(AppError::Config("preprocess.max_chars must be greater than 0".into()));
    }

    let endpoint = endpoint_override
        .unwrap_or(&parsed.azure.endpoint)
        .trim_end_matches('/')
        .to_string();
    let log_level = log_level_override.unwrap_or(&parsed.bot.log_level).to_string();

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level,
        log_file: parsed.bot.log_file.as_deref().map(expand_home),
        assistant: AssistantConfig {
            backend: a.backend,
            name: a.name,
            model: a.model,
            instructions: a.instructions,
            vector_store_id: a.vector_store_id.filter(|id| !id.trim().is_empty()),
        },
        azure: AzureConfig {
            endpoint,
            api_version: parsed.azure.api_version,
            timeout_seconds: parsed.azure.timeout_seconds,
        },
        runner: RunnerConfig {
            poll_interval: Duration::from_millis(parsed.runner.poll_interval_ms),
            run_timeout: Duration::from_secs(parsed.runner.run_timeout_seconds),
        },
        indexing: IndexingConfig {
            vector_store_name: ix.vector_store_name,
            poll_interval: Duration::from_millis(ix.poll_interval_ms),
            max_poll_interval: Duration::from_millis(ix.max_poll_interval_ms),
            timeout: Duration::from_secs(ix.timeout_seconds),
            cleanup: ix.cleanup,
        },
        preprocess: PreprocessConfig { max_chars: parsed.preprocess.max_chars },
        api_key: env::var("AZURE_OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
