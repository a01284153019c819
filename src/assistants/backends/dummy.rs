//! Dummy Assistants backend: keeps threads, runs and vector stores in memory.
//!
//! Used for keyless local runs and for exercising the full run lifecycle in
//! tests. A run advances one step per `retrieve_run`:
//! `queued → in_progress → requires_action (once per scripted tool round) → completed`.
//! The completed reply echoes the last user message, prefixed with `[echo]`.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::assistants::{
    Annotation, ApiError, Assistant, AssistantSpec, FileCitation, FileCounts, FileObject,
    FunctionCall, Message, MessageContent, RequiredAction, Run, RunError, RunStatus,
    SubmitToolOutputs, TextContent, Thread, ToolCall, ToolOutput, VectorStore, VectorStoreStatus,
};

/// Citation marker appended to replies from assistants with an attached vector store.
pub const CITATION_MARKER: &str = "[1]";

#[derive(Debug, Clone, Default)]
pub struct DummyAssistants {
    state: Arc<Mutex<DummyState>>,
}

#[derive(Debug, Default)]
struct DummyState {
    assistants: HashMap<String, AssistantSpec>,
    threads: HashMap<String, Vec<Message>>,
    runs: HashMap<String, DummyRun>,
    files: HashMap<String, FileObject>,
    vector_stores: HashMap<String, DummyStore>,
    /// Retrieves per vector store id; kept after the store is deleted.
    store_polls: HashMap<String, u32>,
    /// Script consumed by the next `create_run`.
    next_run: RunScript,
    /// Script consumed by the next `create_vector_store`.
    next_store: StoreScript,
}

#[derive(Debug, Default)]
struct RunScript {
    tool_rounds: VecDeque<Vec<(String, String)>>,
    failure: Option<RunError>,
    stall: bool,
}

/// How a vector store finishes indexing.
#[derive(Debug, Clone, Copy)]
struct StoreScript {
    /// Retrieves that still report `in_progress`.
    pending_polls: u32,
    outcome: VectorStoreStatus,
    failed_files: u32,
}

impl Default for StoreScript {
    fn default() -> Self {
        Self { pending_polls: 0, outcome: VectorStoreStatus::Completed, failed_files: 0 }
    }
}

#[derive(Debug)]
struct DummyStore {
    store: VectorStore,
    file_ids: Vec<String>,
    script: StoreScript,
}

#[derive(Debug)]
struct DummyRun {
    run: Run,
    script: RunScript,
    outputs: Vec<ToolOutput>,
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

impl DummyAssistants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next run request one round of tool calls before completing.
    /// Each entry is `(function name, JSON arguments)`. Call repeatedly to
    /// script several rounds.
    pub fn script_tool_round<I, N>(&self, calls: I)
    where
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        let round = calls
            .into_iter()
            .map(|(name, args)| (name.into(), args.to_string()))
            .collect();
        if let Ok(mut state) = self.state.lock() {
            state.next_run.tool_rounds.push_back(round);
        }
    }

    /// Make the next run end in `failed` with the given error.
    pub fn script_failure(&self, code: &str, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.next_run.failure = Some(RunError { code: code.into(), message: message.into() });
        }
    }

    /// Make the next run stay `in_progress` forever.
    pub fn script_stall(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.next_run.stall = true;
        }
    }

    /// Make the next vector store report `in_progress` for `pending_polls`
    /// retrieves, then finish with `outcome`. With a `completed` outcome,
    /// `failed_files` of its files are counted as failed.
    pub fn script_vector_store(&self, pending_polls: u32, outcome: VectorStoreStatus, failed_files: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.next_store = StoreScript { pending_polls, outcome, failed_files };
        }
    }

    /// How many times the vector store was retrieved.
    pub fn vector_store_polls(&self, vector_store_id: &str) -> u32 {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.store_polls.get(vector_store_id).copied())
            .unwrap_or(0)
    }

    /// Number of uploaded files still present.
    pub fn file_count(&self) -> usize {
        self.state.lock().map(|s| s.files.len()).unwrap_or(0)
    }

    /// Number of vector stores still present.
    pub fn vector_store_count(&self) -> usize {
        self.state.lock().map(|s| s.vector_stores.len()).unwrap_or(0)
    }

    /// The definition the given assistant was created with.
    pub fn assistant_spec(&self, assistant_id: &str) -> Option<AssistantSpec> {
        self.state.lock().ok()?.assistants.get(assistant_id).cloned()
    }

    /// Tool outputs submitted to a run, in submission order.
    pub fn submitted_outputs(&self, run_id: &str) -> Vec<ToolOutput> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.runs.get(run_id).map(|r| r.outputs.clone()))
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, DummyState>, ApiError> {
        self.state
            .lock()
            .map_err(|_| ApiError::Request("dummy backend state poisoned".into()))
    }

    pub async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, ApiError> {
        let mut state = self.lock()?;
        for vs_id in spec.vector_store_ids() {
            if !state.vector_stores.contains_key(&vs_id) {
                return Err(ApiError::NotFound(format!("vector store {vs_id}")));
            }
        }
        let id = new_id("asst");
        state.assistants.insert(id.clone(), spec.clone());
        debug!(assistant_id = %id, tools = spec.tools.len(), "dummy assistant created");
        Ok(Assistant { id, name: Some(spec.name.clone()), model: spec.model.clone() })
    }

    pub async fn create_thread(&self) -> Result<Thread, ApiError> {
        let id = new_id("thread");
        self.lock()?.threads.insert(id.clone(), Vec::new());
        Ok(Thread { id })
    }

    pub async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        if self.lock()?.threads.contains_key(thread_id) {
            Ok(Thread { id: thread_id.to_string() })
        } else {
            Err(ApiError::NotFound(format!("thread {thread_id}")))
        }
    }

    pub async fn create_message(&self, thread_id: &str, content: &str) -> Result<Message, ApiError> {
        let mut state = self.lock()?;
        let messages = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| ApiError::NotFound(format!("thread {thread_id}")))?;
        let message = text_message("user", content.to_string(), Vec::new());
        messages.push(message.clone());
        Ok(message)
    }

    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ApiError> {
        let mut state = self.lock()?;
        if !state.threads.contains_key(thread_id) {
            return Err(ApiError::NotFound(format!("thread {thread_id}")));
        }
        if !state.assistants.contains_key(assistant_id) {
            return Err(ApiError::NotFound(format!("assistant {assistant_id}")));
        }
        if state.runs.values().any(|r| r.run.thread_id == thread_id && r.run.status.is_pending()) {
            return Err(ApiError::InvalidRequest(format!(
                "thread {thread_id} already has an active run"
            )));
        }

        let run = Run {
            id: new_id("run"),
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            status: RunStatus::Queued,
            created_at: Utc::now().timestamp(),
            required_action: None,
            last_error: None,
        };
        let script = std::mem::take(&mut state.next_run);
        state.runs.insert(run.id.clone(), DummyRun { run: run.clone(), script, outputs: Vec::new() });
        Ok(run)
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let entry = state
            .runs
            .get_mut(run_id)
            .filter(|r| r.run.thread_id == thread_id)
            .ok_or_else(|| ApiError::NotFound(format!("run {run_id}")))?;

        match entry.run.status {
            RunStatus::Queued => entry.run.status = RunStatus::InProgress,
            RunStatus::InProgress if entry.script.stall => {}
            RunStatus::InProgress => {
                if let Some(err) = entry.script.failure.take() {
                    entry.run.status = RunStatus::Failed;
                    entry.run.last_error = Some(err);
                } else if let Some(round) = entry.script.tool_rounds.pop_front() {
                    let tool_calls = round
                        .into_iter()
                        .map(|(name, arguments)| ToolCall {
                            id: new_id("call"),
                            kind: "function".into(),
                            function: FunctionCall { name, arguments },
                        })
                        .collect();
                    entry.run.status = RunStatus::RequiresAction;
                    entry.run.required_action = Some(RequiredAction {
                        kind: "submit_tool_outputs".into(),
                        submit_tool_outputs: SubmitToolOutputs { tool_calls },
                    });
                } else {
                    entry.run.status = RunStatus::Completed;
                    let last_user = last_user_text(&state.threads, thread_id);
                    let reply = completed_reply(last_user, &entry.outputs);
                    let citation = state
                        .assistants
                        .get(&entry.run.assistant_id)
                        .and_then(|spec| spec.vector_store_ids().into_iter().next())
                        .and_then(|vs| state.vector_stores.get(&vs))
                        .and_then(|vs| vs.file_ids.first().cloned());
                    let message = match citation {
                        Some(file_id) => text_message(
                            "assistant",
                            format!("{reply} {CITATION_MARKER}"),
                            vec![Annotation::FileCitation {
                                text: CITATION_MARKER.to_string(),
                                file_citation: FileCitation { file_id },
                            }],
                        ),
                        None => text_message("assistant", reply, Vec::new()),
                    };
                    if let Some(messages) = state.threads.get_mut(thread_id) {
                        messages.push(message);
                    }
                }
            }
            _ => {}
        }
        Ok(entry.run.clone())
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ApiError> {
        let mut state = self.lock()?;
        let entry = state
            .runs
            .get_mut(run_id)
            .filter(|r| r.run.thread_id == thread_id)
            .ok_or_else(|| ApiError::NotFound(format!("run {run_id}")))?;

        if entry.run.status != RunStatus::RequiresAction {
            return Err(ApiError::InvalidRequest(format!(
                "run {run_id} is '{}', not awaiting tool outputs",
                entry.run.status
            )));
        }

        let mut expected: Vec<&str> = entry.run.pending_tool_calls().iter().map(|c| c.id.as_str()).collect();
        let mut submitted: Vec<&str> = outputs.iter().map(|o| o.tool_call_id.as_str()).collect();
        expected.sort_unstable();
        submitted.sort_unstable();
        if expected != submitted {
            return Err(ApiError::InvalidRequest(format!(
                "tool outputs {submitted:?} do not match pending calls {expected:?}"
            )));
        }

        entry.outputs.extend_from_slice(outputs);
        entry.run.required_action = None;
        entry.run.status = RunStatus::Queued;
        Ok(entry.run.clone())
    }

    /// Pending runs become `cancelled` immediately.
    pub async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        let mut state = self.lock()?;
        let entry = state
            .runs
            .get_mut(run_id)
            .filter(|r| r.run.thread_id == thread_id)
            .ok_or_else(|| ApiError::NotFound(format!("run {run_id}")))?;
        if !entry.run.status.is_pending() {
            return Err(ApiError::InvalidRequest(format!(
                "cannot cancel run {run_id} with status '{}'",
                entry.run.status
            )));
        }
        entry.run.status = RunStatus::Cancelled;
        entry.run.required_action = None;
        Ok(entry.run.clone())
    }

    pub async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, ApiError> {
        self.lock()?
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("thread {thread_id}")))
    }

    pub async fn upload_file(&self, path: &Path) -> Result<FileObject, ApiError> {
        let meta = tokio::fs::metadata(path).await?;
        let file = FileObject {
            id: new_id("file"),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            purpose: "assistants".into(),
            bytes: meta.len(),
        };
        self.lock()?.files.insert(file.id.clone(), file.clone());
        Ok(file)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        self.lock()?
            .files
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("file {file_id}")))
    }

    pub async fn create_vector_store(&self, name: &str, file_ids: &[String]) -> Result<VectorStore, ApiError> {
        let mut state = self.lock()?;
        if let Some(missing) = file_ids.iter().find(|id| !state.files.contains_key(*id)) {
            return Err(ApiError::NotFound(format!("file {missing}")));
        }
        let total = file_ids.len() as u32;
        let store = VectorStore {
            id: new_id("vs"),
            name: Some(name.to_string()),
            status: VectorStoreStatus::InProgress,
            file_counts: FileCounts { in_progress: total, total, ..FileCounts::default() },
        };
        let script = std::mem::take(&mut state.next_store);
        state.vector_stores.insert(
            store.id.clone(),
            DummyStore { store: store.clone(), file_ids: file_ids.to_vec(), script },
        );
        Ok(store)
    }

    /// Unscripted stores finish indexing on the first retrieve.
    pub async fn retrieve_vector_store(&self, vector_store_id: &str) -> Result<VectorStore, ApiError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let entry = state
            .vector_stores
            .get_mut(vector_store_id)
            .ok_or_else(|| ApiError::NotFound(format!("vector store {vector_store_id}")))?;
        *state.store_polls.entry(vector_store_id.to_string()).or_default() += 1;

        let store = &mut entry.store;
        if store.status == VectorStoreStatus::InProgress {
            if entry.script.pending_polls > 0 {
                entry.script.pending_polls -= 1;
            } else {
                store.status = entry.script.outcome;
                if store.status == VectorStoreStatus::Completed {
                    let failed = entry.script.failed_files.min(store.file_counts.total);
                    store.file_counts.failed = failed;
                    store.file_counts.completed = store.file_counts.total - failed;
                    store.file_counts.in_progress = 0;
                }
            }
        }
        Ok(store.clone())
    }

    pub async fn delete_vector_store(&self, vector_store_id: &str) -> Result<(), ApiError> {
        self.lock()?
            .vector_stores
            .remove(vector_store_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("vector store {vector_store_id}")))
    }
}

fn text_message(role: &str, value: String, annotations: Vec<Annotation>) -> Message {
    Message {
        id: new_id("msg"),
        role: role.to_string(),
        created_at: Utc::now().timestamp(),
        content: vec![MessageContent::Text { text: TextContent { value, annotations } }],
    }
}

fn last_user_text<'a>(threads: &'a HashMap<String, Vec<Message>>, thread_id: &str) -> &'a str {
    threads
        .get(thread_id)
        .and_then(|msgs| msgs.iter().rev().find(|m| m.role == "user"))
        .and_then(|m| m.content.first())
        .and_then(|c| match c {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
        .unwrap_or("")
}

fn completed_reply(last_user: &str, outputs: &[ToolOutput]) -> String {
    if outputs.is_empty() {
        return format!("[echo] {last_user}");
    }
    let mut reply = format!("[echo] {last_user}\n\nTool results:");
    for o in outputs {
        reply.push_str("\n- ");
        reply.push_str(&o.output);
    }
    reply
}
