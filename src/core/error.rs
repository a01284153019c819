//! Application-wide error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::assistants::ApiError;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("assistants api error: {0}")]
    Api(#[from] ApiError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("indexing error: {0}")]
    Indexing(String),

    #[error("run {run_id} ended with status '{status}': {message}")]
    RunFailed {
        run_id: String,
        status: String,
        message: String,
    },

    #[error("run {run_id} did not finish within {waited_secs}s")]
    RunTimeout { run_id: String, waited_secs: u64 },

    #[error("no assistant reply: {0}")]
    NoReply(String),
}
