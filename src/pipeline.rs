//! End-to-end lending assistant: tools, optional temporary index, hosted
//! assistant and the run loop, assembled once at startup.

use std::path::PathBuf;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::assistants::{AssistantSpec, AssistantsBackend};
use crate::config::Config;
use crate::error::AppError;
use crate::indexing::{TempIndex, TempIndexer};
use crate::preprocess::QueryPreprocessor;
use crate::runner::{AssistantRunner, Reply};
use crate::tools::{BuiltinTool, ToolDispatcher, ToolRegistry};

pub struct LendingBotPipeline {
    registry: ToolRegistry,
    runner: AssistantRunner,
    preprocessor: QueryPreprocessor,
    indexer: TempIndexer,
    temp_index: Option<TempIndex>,
    vector_store_id: Option<String>,
    cleanup_on_shutdown: bool,
}

impl LendingBotPipeline {
    /// Build the pipeline: register tools, index `temp_files` (when given)
    /// into a fresh vector store, and create the assistant.
    pub async fn build(
        config: &Config,
        backend: AssistantsBackend,
        temp_files: &[PathBuf],
    ) -> Result<Self, AppError> {
        let registry = ToolRegistry::default_lending();
        let indexer = TempIndexer::new(backend.clone(), config.indexing.clone());

        let temp_index = if temp_files.is_empty() {
            None
        } else {
            Some(indexer.index(temp_files).await?)
        };
        let vector_store_id = temp_index
            .as_ref()
            .map(|ix| ix.vector_store_id.clone())
            .or_else(|| config.assistant.vector_store_id.clone());

        let spec = AssistantSpec {
            name: config.assistant.name.clone(),
            model: config.assistant.model.clone(),
            instructions: config.assistant.instructions.clone(),
            tools: registry.openai_tools(),
            tool_resources: tool_resources(&registry, vector_store_id.as_deref()),
        };
        let assistant = match backend.create_assistant(&spec).await {
            Ok(assistant) => assistant,
            Err(e) => {
                // Nothing will own the index once build fails.
                if let Some(index) = &temp_index {
                    warn!(error = %e, "assistant creation failed, removing temporary index");
                    indexer.cleanup(index).await;
                }
                return Err(e.into());
            }
        };
        info!(
            assistant_id = %assistant.id,
            backend = backend.name(),
            tools = registry.len(),
            vector_store_id = vector_store_id.as_deref().unwrap_or("-"),
            "assistant created"
        );

        let runner = AssistantRunner::new(
            assistant.id,
            backend,
            ToolDispatcher::new(),
            config.runner.clone(),
        );

        Ok(Self {
            registry,
            runner,
            preprocessor: QueryPreprocessor::new(&config.preprocess),
            indexer,
            temp_index,
            vector_store_id,
            cleanup_on_shutdown: config.indexing.cleanup,
        })
    }

    pub fn assistant_id(&self) -> &str {
        self.runner.assistant_id()
    }

    pub fn vector_store_id(&self) -> Option<&str> {
        self.vector_store_id.as_deref()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Answer `prompt` in a fresh thread.
    pub async fn run(&self, prompt: &str) -> Result<Reply, AppError> {
        self.run_in_thread(prompt, None).await
    }

    /// Answer `prompt`, continuing `thread_id` when given.
    pub async fn run_in_thread(&self, prompt: &str, thread_id: Option<&str>) -> Result<Reply, AppError> {
        let prompt = self.preprocessor.clean(prompt)?;
        self.runner.run(&prompt, thread_id).await
    }

    /// Remove the temporary index when cleanup is enabled.
    pub async fn shutdown(self) {
        if !self.cleanup_on_shutdown {
            return;
        }
        if let Some(index) = &self.temp_index {
            self.indexer.cleanup(index).await;
        }
    }
}

/// `tool_resources` for assistant creation. `file_search` only gets a store
/// when one exists and the built-in is registered.
fn tool_resources(registry: &ToolRegistry, vector_store_id: Option<&str>) -> Value {
    match vector_store_id {
        Some(id) if registry.has_builtin(BuiltinTool::FileSearch) => {
            json!({ "file_search": { "vector_store_ids": [id] } })
        }
        _ => json!({}),
    }
}
