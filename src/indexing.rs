//! Temporary file indexing.
//!
//! Uploads local files, builds a vector store from them and waits until the
//! service has finished indexing, so `file_search` can use their contents in
//! the very next run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::assistants::{AssistantsBackend, VectorStoreStatus};
use crate::config::IndexingConfig;
use crate::error::AppError;

/// Ids created by [`TempIndexer::index`]; kept so they can be deleted later.
#[derive(Debug, Clone, PartialEq)]
pub struct TempIndex {
    pub vector_store_id: String,
    pub file_ids: Vec<String>,
    /// Files the service reported as failed to index.
    pub failed_files: u32,
}

#[derive(Debug, Clone)]
pub struct TempIndexer {
    backend: AssistantsBackend,
    config: IndexingConfig,
}

impl TempIndexer {
    pub fn new(backend: AssistantsBackend, config: IndexingConfig) -> Self {
        Self { backend, config }
    }

    /// Upload `paths` and return the id of a ready vector store.
    ///
    /// All paths are checked before anything is uploaded. If a later step
    /// fails, whatever was already created is deleted before the error is
    /// returned.
    pub async fn index(&self, paths: &[PathBuf]) -> Result<TempIndex, AppError> {
        if paths.is_empty() {
            return Err(AppError::Indexing("no files to index".into()));
        }
        for path in paths {
            if !path.is_file() {
                return Err(AppError::FileNotFound(path.clone()));
            }
        }

        let mut index = TempIndex {
            vector_store_id: String::new(),
            file_ids: Vec::with_capacity(paths.len()),
            failed_files: 0,
        };
        match self.build_index(paths, &mut index).await {
            Ok(()) => Ok(index),
            Err(e) => {
                warn!(
                    error = %e,
                    files = index.file_ids.len(),
                    "indexing failed, removing partial index"
                );
                self.cleanup(&index).await;
                Err(e)
            }
        }
    }

    async fn build_index(&self, paths: &[PathBuf], index: &mut TempIndex) -> Result<(), AppError> {
        for path in paths {
            let file = self.backend.upload_file(path).await?;
            debug!(path = %path.display(), file_id = %file.id, bytes = file.bytes, "file uploaded");
            index.file_ids.push(file.id);
        }

        let store = self
            .backend
            .create_vector_store(&self.config.vector_store_name, &index.file_ids)
            .await?;
        info!(vector_store_id = %store.id, files = index.file_ids.len(), "vector store created");
        index.vector_store_id = store.id;

        index.failed_files = self.wait_until_ready(&index.vector_store_id).await?;
        Ok(())
    }

    /// Poll with exponential backoff until the store reports `completed`.
    /// Returns the number of files that failed to index.
    async fn wait_until_ready(&self, vector_store_id: &str) -> Result<u32, AppError> {
        let started = Instant::now();
        let mut delay = self.config.poll_interval;
        loop {
            let store = self.backend.retrieve_vector_store(vector_store_id).await?;
            match store.status {
                VectorStoreStatus::Completed => {
                    let counts = &store.file_counts;
                    if counts.failed > 0 {
                        warn!(
                            %vector_store_id,
                            failed = counts.failed,
                            completed = counts.completed,
                            "some files failed to index"
                        );
                    }
                    info!(%vector_store_id, completed = counts.completed, "vector store ready");
                    return Ok(counts.failed);
                }
                VectorStoreStatus::Expired => {
                    return Err(AppError::Indexing(format!(
                        "vector store {vector_store_id} expired before indexing finished"
                    )));
                }
                VectorStoreStatus::InProgress | VectorStoreStatus::Unknown => {}
            }

            if started.elapsed() + delay > self.config.timeout {
                return Err(AppError::Indexing(format!(
                    "vector store {vector_store_id} not ready after {}s",
                    self.config.timeout.as_secs()
                )));
            }
            debug!(%vector_store_id, delay_ms = delay.as_millis() as u64, "vector store still indexing");
            sleep(delay).await;
            delay = next_poll_delay(delay, self.config.max_poll_interval);
        }
    }

    /// Delete the vector store and uploaded files. Failures are logged and skipped.
    /// An empty `vector_store_id` means no store was created.
    pub async fn cleanup(&self, index: &TempIndex) {
        if !index.vector_store_id.is_empty() {
            if let Err(e) = self.backend.delete_vector_store(&index.vector_store_id).await {
                warn!(vector_store_id = %index.vector_store_id, error = %e, "failed to delete vector store");
            }
        }
        for file_id in &index.file_ids {
            if let Err(e) = self.backend.delete_file(file_id).await {
                warn!(%file_id, error = %e, "failed to delete uploaded file");
            }
        }
        info!(vector_store_id = %index.vector_store_id, "temporary index removed");
    }
}

/// Double the poll delay, capped at `max`.
fn next_poll_delay(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Resolve user-supplied paths relative to `base` (usually the working directory).
pub fn resolve_paths(base: &Path, paths: &[String]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| {
            let path = crate::config::expand_home(p);
            if path.is_absolute() { path } else { base.join(path) }
        })
        .collect()
}
