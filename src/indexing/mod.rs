//! Optional embedding-backed enrichment of checkpoint text.
//!
//! Indexing runs in the background and never affects the caller: every
//! failure is logged and dropped.

pub mod ollama;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::persistence::artifact_repo::ArtifactRepo;
use crate::Result;

pub use ollama::OllamaEmbedder;

/// Turns text into a vector.
pub trait Embedder: Send + Sync {
    /// Embedding for `text`, or `None` when the service returned nothing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Embedding` if the service call fails.
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<f32>>>> + Send + 'a>>;
}

/// Spawns background indexing of checkpoint text as `LogChunk` nodes.
#[derive(Clone)]
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    artifacts: ArtifactRepo,
}

impl Indexer {
    /// Indexer storing chunks through `artifacts`.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, artifacts: ArtifactRepo) -> Self {
        Self {
            embedder,
            artifacts,
        }
    }

    /// Embed and store `text` for `session_id` on a background task.
    pub fn spawn_index(&self, session_id: String, text: String) -> JoinHandle<()> {
        let indexer = self.clone();
        tokio::spawn(async move {
            match indexer.index(&session_id, &text).await {
                Ok(Some(chunk_id)) => debug!(session_id, chunk_id, "checkpoint indexed"),
                Ok(None) => debug!(session_id, "embedder returned no vector; skipped"),
                Err(err) => warn!(session_id, %err, "checkpoint indexing failed"),
            }
        })
    }

    async fn index(&self, session_id: &str, text: &str) -> Result<Option<String>> {
        let Some(vector) = self.embedder.embed(text).await? else {
            return Ok(None);
        };
        self.artifacts
            .store_log_chunk(session_id, text, vector)
            .await
            .map(Some)
    }
}
