//! Assistants API abstraction.
//!
//! `AssistantsBackend` is an enum over concrete backend implementations.
//! Add a new variant + module in `backends/` for each additional service.
//!
//! Backend instances are shared immutable capabilities; clone them freely.
//! Every method is an `async fn` on the enum so callers need no trait-object
//! machinery.

pub mod backends;
pub mod types;

use std::path::Path;

use thiserror::Error;

pub use types::*;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
    #[error("missing API key (set AZURE_OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("missing endpoint (set [azure] endpoint or AZURE_OPENAI_ENDPOINT)")]
    MissingEndpoint,
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}{}: {message}", code_suffix(.code))]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [code={c}]")).unwrap_or_default()
}

// ── Backend enum ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum AssistantsBackend {
    Azure(backends::azure::AzureAssistantsClient),
    Dummy(backends::dummy::DummyAssistants),
}

impl AssistantsBackend {
    pub fn name(&self) -> &'static str {
        match self {
            AssistantsBackend::Azure(_) => "azure",
            AssistantsBackend::Dummy(_) => "dummy",
        }
    }

    pub async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.create_assistant(spec).await,
            AssistantsBackend::Dummy(d) => d.create_assistant(spec).await,
        }
    }

    pub async fn create_thread(&self) -> Result<Thread, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.create_thread().await,
            AssistantsBackend::Dummy(d) => d.create_thread().await,
        }
    }

    pub async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.retrieve_thread(thread_id).await,
            AssistantsBackend::Dummy(d) => d.retrieve_thread(thread_id).await,
        }
    }

    /// Post a `user` message to the thread.
    pub async fn create_message(&self, thread_id: &str, content: &str) -> Result<Message, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.create_message(thread_id, content).await,
            AssistantsBackend::Dummy(d) => d.create_message(thread_id, content).await,
        }
    }

    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.create_run(thread_id, assistant_id).await,
            AssistantsBackend::Dummy(d) => d.create_run(thread_id, assistant_id).await,
        }
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.retrieve_run(thread_id, run_id).await,
            AssistantsBackend::Dummy(d) => d.retrieve_run(thread_id, run_id).await,
        }
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.submit_tool_outputs(thread_id, run_id, outputs).await,
            AssistantsBackend::Dummy(d) => d.submit_tool_outputs(thread_id, run_id, outputs).await,
        }
    }

    /// Request cancellation of an active run. The returned run is usually
    /// `cancelling`; the service finishes it asynchronously.
    pub async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.cancel_run(thread_id, run_id).await,
            AssistantsBackend::Dummy(d) => d.cancel_run(thread_id, run_id).await,
        }
    }

    /// All messages of the thread, oldest first.
    pub async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.list_messages(thread_id).await,
            AssistantsBackend::Dummy(d) => d.list_messages(thread_id).await,
        }
    }

    /// Upload a local file with purpose `assistants`.
    pub async fn upload_file(&self, path: &Path) -> Result<FileObject, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.upload_file(path).await,
            AssistantsBackend::Dummy(d) => d.upload_file(path).await,
        }
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.delete_file(file_id).await,
            AssistantsBackend::Dummy(d) => d.delete_file(file_id).await,
        }
    }

    pub async fn create_vector_store(&self, name: &str, file_ids: &[String]) -> Result<VectorStore, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.create_vector_store(name, file_ids).await,
            AssistantsBackend::Dummy(d) => d.create_vector_store(name, file_ids).await,
        }
    }

    pub async fn retrieve_vector_store(&self, vector_store_id: &str) -> Result<VectorStore, ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.retrieve_vector_store(vector_store_id).await,
            AssistantsBackend::Dummy(d) => d.retrieve_vector_store(vector_store_id).await,
        }
    }

    pub async fn delete_vector_store(&self, vector_store_id: &str) -> Result<(), ApiError> {
        match self {
            AssistantsBackend::Azure(c) => c.delete_vector_store(vector_store_id).await,
            AssistantsBackend::Dummy(d) => d.delete_vector_store(vector_store_id).await,
        }
    }
}
