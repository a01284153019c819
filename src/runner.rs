//! Drives one user turn through the Assistants run lifecycle.
//!
//! thread → user message → run → poll / submit tool outputs → final message.

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::assistants::{Annotation, AssistantsBackend, Message, MessageContent, Run, RunStatus};
use crate::config::RunnerConfig;
use crate::error::AppError;
use crate::tools::ToolDispatcher;

/// A source the assistant cited through `file_search`.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    /// Marker text as it appears in the reply.
    pub text: String,
    pub file_id: String,
}

/// The assistant's answer to one turn.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Thread the turn ran in; pass it back to continue the conversation.
    pub thread_id: String,
    pub run_id: String,
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone)]
pub struct AssistantRunner {
    assistant_id: String,
    backend: AssistantsBackend,
    dispatcher: ToolDispatcher,
    config: RunnerConfig,
}

impl AssistantRunner {
    pub fn new(
        assistant_id: String,
        backend: AssistantsBackend,
        dispatcher: ToolDispatcher,
        config: RunnerConfig,
    ) -> Self {
        Self { assistant_id, backend, dispatcher, config }
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Send `user_message` and return the assistant's final reply.
    ///
    /// A new thread is created when `thread_id` is `None`; otherwise the
    /// existing thread is continued.
    pub async fn run(&self, user_message: &str, thread_id: Option<&str>) -> Result<Reply, AppError> {
        let thread = match thread_id {
            None => self.backend.create_thread().await?,
            Some(id) => self.backend.retrieve_thread(id).await?,
        };

        self.backend.create_message(&thread.id, user_message).await?;

        let run = self.backend.create_run(&thread.id, &self.assistant_id).await?;
        info!(thread_id = %thread.id, run_id = %run.id, "run started");

        let run = self.wait_for_run(&thread.id, run).await?;

        if run.status != RunStatus::Completed {
            let message = run
                .last_error
                .as_ref()
                .map(|e| {
                    if e.code.is_empty() {
                        e.message.clone()
                    } else {
                        format!("{}: {}", e.code, e.message)
                    }
                })
                .unwrap_or_else(|| "no error details".to_string());
            warn!(run_id = %run.id, status = %run.status, %message, "run did not complete");
            return Err(AppError::RunFailed {
                run_id: run.id,
                status: run.status.to_string(),
                message,
            });
        }

        let messages = self.backend.list_messages(&thread.id).await?;
        let (text, citations) = final_text(&messages)?;
        info!(run_id = %run.id, reply_len = text.len(), citations = citations.len(), "run completed");

        Ok(Reply { thread_id: thread.id, run_id: run.id, text, citations })
    }

    /// Poll until the run leaves the pending states, answering tool calls on the way.
    async fn wait_for_run(&self, thread_id: &str, mut run: Run) -> Result<Run, AppError> {
        let started = Instant::now();
        while run.status.is_pending() {
            let waited = started.elapsed();
            if waited >= self.config.run_timeout {
                // Leave the thread usable for the next turn.
                match self.backend.cancel_run(thread_id, &run.id).await {
                    Ok(cancelled) => info!(run_id = %run.id, status = %cancelled.status, "timed-out run cancelled"),
                    Err(e) => warn!(run_id = %run.id, error = %e, "failed to cancel timed-out run"),
                }
                return Err(AppError::RunTimeout {
                    run_id: run.id,
                    waited_secs: waited.as_millis().div_ceil(1000) as u64,
                });
            }

            if run.status == RunStatus::RequiresAction {
                let outputs = self.dispatcher.handle_step(&run)?;
                debug!(run_id = %run.id, outputs = outputs.len(), "submitting tool outputs");
                run = self
                    .backend
                    .submit_tool_outputs(thread_id, &run.id, &outputs)
                    .await?;
            } else {
                sleep(self.config.poll_interval).await;
                run = self.backend.retrieve_run(thread_id, &run.id).await?;
                debug!(run_id = %run.id, status = %run.status, "run polled");
            }
        }
        Ok(run)
    }
}

/// Text and citations of the first content part of the newest message.
fn final_text(messages: &[Message]) -> Result<(String, Vec<Citation>), AppError> {
    let last = messages
        .last()
        .ok_or_else(|| AppError::NoReply("thread has no messages".into()))?;

    match last.content.first() {
        Some(MessageContent::Text { text }) => {
            let citations = text
                .annotations
                .iter()
                .filter_map(|a| match a {
                    Annotation::FileCitation { text, file_citation } => Some(Citation {
                        text: text.clone(),
                        file_id: file_citation.file_id.clone(),
                    }),
                    Annotation::Other => None,
                })
                .collect();
            Ok((text.value.clone(), citations))
        }
        Some(MessageContent::Other) => Err(AppError::NoReply(format!(
            "message {} does not start with text",
            last.id
        ))),
        None => Err(AppError::NoReply(format!("message {} is empty", last.id))),
    }
}
