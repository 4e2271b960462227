//! Read-side operations: context documents, node inspection, and search.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::indexing::Embedder;
use crate::models::artifact::{Activity, ActivityKind};
use crate::models::node::{GraphNode, NodeFilter};
use crate::persistence::artifact_repo::ArtifactRepo;
use crate::persistence::graph_store::{bounded, GraphStore};
use crate::workspace::context_loader::ContextLoader;
use crate::{AppError, Result};

use super::registry::SessionRegistry;

/// Result of [`MemoryService::read_memory`].
#[derive(Debug, Clone, Serialize)]
pub struct MemoryDocument {
    /// Requested relative path.
    pub path: String,
    /// Content, or `None` when absent from every candidate root.
    pub content: Option<String>,
}

/// One search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Matching node.
    pub node: GraphNode,
    /// Cosine score for vector hits; `None` for keyword hits.
    pub score: Option<f32>,
}

/// Query services over the context loader and graph store.
pub struct MemoryService {
    store: Arc<dyn GraphStore>,
    timeout: Duration,
    context: Arc<dyn ContextLoader>,
    registry: Arc<SessionRegistry>,
    artifacts: ArtifactRepo,
    embedder: Option<Arc<dyn Embedder>>,
    default_root: PathBuf,
}

impl MemoryService {
    /// Wire the service to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn GraphStore>,
        timeout: Duration,
        context: Arc<dyn ContextLoader>,
        registry: Arc<SessionRegistry>,
        artifacts: ArtifactRepo,
        embedder: Option<Arc<dyn Embedder>>,
        default_root: PathBuf,
    ) -> Self {
        Self {
            store,
            timeout,
            context,
            registry,
            artifacts,
            embedder,
            default_root,
        }
    }

    /// Read a context document through the candidate roots.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for an empty path, or `AppError::Io`
    /// if an existing file cannot be read.
    pub async fn read_memory(
        &self,
        relative_path: &str,
        workspace_root: Option<PathBuf>,
    ) -> Result<MemoryDocument> {
        if relative_path.trim().is_empty() {
            return Err(AppError::InvalidInput("path must not be empty".into()));
        }
        let root = workspace_root.unwrap_or_else(|| self.default_root.clone());
        let content = self.context.read(&root, relative_path).await?;
        Ok(MemoryDocument {
            path: relative_path.to_owned(),
            content,
        })
    }

    /// Fetch a node by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the store fails or times out.
    pub async fn read_node(&self, id: &str) -> Result<Option<GraphNode>> {
        bounded(self.timeout, "read node", self.store.get_node(id)).await
    }

    /// Nodes matching a filter expression, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for a malformed expression, or
    /// `AppError::StoreUnavailable` if the store fails.
    pub async fn search_nodes(&self, query: &str, limit: usize) -> Result<Vec<GraphNode>> {
        let filter = NodeFilter::parse(query)?;
        bounded(self.timeout, "search nodes", self.store.search_nodes(filter, limit)).await
    }

    /// Vector plus keyword search, de-duplicated by node id.
    ///
    /// Records a `search` activity for the current session, when one is open.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for an empty query or malformed
    /// expression, or `AppError::StoreUnavailable` if the keyword search fails.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".into()));
        }

        let mut hits = Vec::new();
        let mut seen = HashSet::new();

        if let Some(ref embedder) = self.embedder {
            match self.vector_hits(embedder.as_ref(), query, limit).await {
                Ok(vector_hits) => {
                    for hit in vector_hits {
                        if seen.insert(hit.node.id.clone()) {
                            hits.push(hit);
                        }
                    }
                }
                Err(err) => warn!(%err, "vector search skipped"),
            }
        }

        let filter = if query.contains('=') {
            NodeFilter::parse(query)?
        } else {
            NodeFilter::any().containing(query)
        };
        let keyword_hits =
            bounded(self.timeout, "keyword search", self.store.search_nodes(filter, limit)).await?;
        for node in keyword_hits {
            if seen.insert(node.id.clone()) {
                hits.push(SearchHit { node, score: None });
            }
        }
        hits.truncate(limit);

        if let Some(handle) = self.registry.get(None) {
            let activity = Activity::new(handle.id.clone(), ActivityKind::Search, query.to_owned());
            match self.artifacts.record_activity(&activity).await {
                Ok(()) => {
                    self.registry.touch(&handle.id);
                    debug!(session_id = %handle.id, "search recorded as activity");
                }
                Err(err) => warn!(session_id = %handle.id, %err, "search activity not recorded"),
            }
        }

        Ok(hits)
    }

    async fn vector_hits(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let Some(vector) = embedder.embed(query).await? else {
            return Ok(Vec::new());
        };
        let scored =
            bounded(self.timeout, "similarity search", self.store.search_similar(vector, limit))
                .await?;
        Ok(scored
            .into_iter()
            .map(|scored| SearchHit {
                node: scored.node,
                score: Some(scored.score),
            })
            .collect())
    }
}
