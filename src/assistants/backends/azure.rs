//! Azure OpenAI Assistants backend (`/openai/assistants`, `/openai/threads`, …).
//!
//! Every request goes to `<endpoint>/openai/<path>?api-version=<version>` and
//! carries the `api-key` header. List and delete envelopes are private to
//! this module; callers only see the shared types in `assistants::types`.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, trace};

use crate::assistants::{
    ApiError, Assistant, AssistantSpec, FileObject, Message, Run, Thread, ToolOutput, VectorStore,
};

/// Messages fetched per `list_messages` call; the API maximum.
const MESSAGE_PAGE_LIMIT: u32 = 100;

// ── Public client ─────────────────────────────────────────────────────────────

/// Client for one Azure OpenAI resource.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Clone)]
pub struct AzureAssistantsClient {
    client: Client,
    endpoint: String,
    api_version: String,
    api_key: String,
}

impl std::fmt::Debug for AzureAssistantsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAssistantsClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl AzureAssistantsClient {
    /// `endpoint` is the resource root, e.g. `https://my-resource.openai.azure.com`.
    pub fn new(
        endpoint: String,
        api_version: String,
        timeout_seconds: u64,
        api_key: String,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ApiError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version,
            api_key,
        })
    }

    pub async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, ApiError> {
        if tracing::enabled!(tracing::Level::TRACE) {
            let body = serde_json::to_string_pretty(spec)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %body, "create assistant payload");
        }
        self.send(self.request(Method::POST, "assistants").json(spec)).await
    }

    pub async fn create_thread(&self) -> Result<Thread, ApiError> {
        self.send(self.request(Method::POST, "threads").json(&json!({}))).await
    }

    pub async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        self.send(self.request(Method::GET, &format!("threads/{thread_id}"))).await
    }

    pub async fn create_message(&self, thread_id: &str, content: &str) -> Result<Message, ApiError> {
        let body = json!({ "role": "user", "content": content });
        self.send(self.request(Method::POST, &format!("threads/{thread_id}/messages")).json(&body))
            .await
    }

    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ApiError> {
        let body = json!({ "assistant_id": assistant_id, "stream": false });
        self.send(self.request(Method::POST, &format!("threads/{thread_id}/runs")).json(&body))
            .await
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        self.send(self.request(Method::GET, &format!("threads/{thread_id}/runs/{run_id}")))
            .await
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ApiError> {
        let body = json!({ "tool_outputs": outputs });
        let path = format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs");
        self.send(self.request(Method::POST, &path).json(&body)).await
    }

    pub async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        let path = format!("threads/{thread_id}/runs/{run_id}/cancel");
        self.send(self.request(Method::POST, &path)).await
    }

    /// Every message of the thread, oldest first, following `has_more` pages.
    pub async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, ApiError> {
        let limit = MESSAGE_PAGE_LIMIT.to_string();
        let path = format!("threads/{thread_id}/messages");
        let mut messages = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut req = self
                .request(Method::GET, &path)
                .query(&[("order", "asc"), ("limit", limit.as_str())]);
            if let Some(cursor) = &after {
                req = req.query(&[("after", cursor.as_str())]);
            }
            let page: ListEnvelope<Message> = self.send(req).await?;
            let next = page.last_id.or_else(|| page.data.last().map(|m| m.id.clone()));
            messages.extend(page.data);
            match next {
                Some(cursor) if page.has_more && after.as_deref() != Some(cursor.as_str()) => {
                    debug!(%thread_id, after = %cursor, "fetching next message page");
                    after = Some(cursor);
                }
                _ => break,
            }
        }
        Ok(messages)
    }

    pub async fn upload_file(&self, path: &Path) -> Result<FileObject, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        debug!(file = %file_name, bytes = bytes.len(), "uploading file");
        let form = Form::new()
            .text("purpose", "assistants")
            .part("file", Part::bytes(bytes).file_name(file_name));
        self.send(self.request(Method::POST, "files").multipart(form)).await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let status: DeleteEnvelope = self
            .send(self.request(Method::DELETE, &format!("files/{file_id}")))
            .await?;
        status.into_result(file_id)
    }

    pub async fn create_vector_store(&self, name: &str, file_ids: &[String]) -> Result<VectorStore, ApiError> {
        let body = json!({ "name": name, "file_ids": file_ids });
        self.send(self.request(Method::POST, "vector_stores").json(&body)).await
    }

    pub async fn retrieve_vector_store(&self, vector_store_id: &str) -> Result<VectorStore, ApiError> {
        self.send(self.request(Method::GET, &format!("vector_stores/{vector_store_id}")))
            .await
    }

    pub async fn delete_vector_store(&self, vector_store_id: &str) -> Result<(), ApiError> {
        let status: DeleteEnvelope = self
            .send(self.request(Method::DELETE, &format!("vector_stores/{vector_store_id}")))
            .await?;
        status.into_result(vector_store_id)
    }

    // ── Plumbing ──────────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/openai/{path}", self.endpoint);
        self.client
            .request(method, url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let req = req
            .build()
            .map_err(|e| ApiError::Request(format!("failed to build request: {e}")))?;
        let method = req.method().clone();
        let path = req.url().path().to_string();
        debug!(%method, %path, "assistants request");

        let response = self.client.execute(req).await.map_err(|e| {
            error!(%method, %path, error = %e, "assistants HTTP request failed (transport)");
            ApiError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Decode(format!("failed to read response body: {e}")))?;
        trace!(%path, body = %body, "assistants response body");

        serde_json::from_str::<T>(&body).map_err(|e| {
            error!(%path, error = %e, "failed to deserialize assistants response");
            ApiError::Decode(format!("{path}: {e}"))
        })
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    data: Vec<T>,
    #[serde(default)]
    last_id: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteEnvelope {
    #[serde(default)]
    deleted: bool,
}

impl DeleteEnvelope {
    fn into_result(self, id: &str) -> Result<(), ApiError> {
        if self.deleted {
            Ok(())
        } else {
            Err(ApiError::Request(format!("service did not delete '{id}'")))
        }
    }
}

// Error envelope used by OpenAI and Azure OpenAI.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => {
            let code = env.error.code.and_then(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            });
            (code, env.error.message)
        }
        Err(_) => (None, body),
    };

    error!(%status, code = code.as_deref().unwrap_or("-"), %message, "assistants request returned HTTP error");
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(message));
    }
    Err(ApiError::Http { status: status.as_u16(), code, message })
}
