//! Durable graph store abstraction.
//!
//! The [`GraphStore`] trait decouples session bookkeeping from the storage
//! backend. Every method is a suspension point; callers wrap calls in a
//! timeout and treat an elapsed timeout as the store being unavailable.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::models::node::{GraphEdge, GraphNode, NodeFilter, ScoredNode, Upsert};
use crate::{AppError, Result};

/// Node/edge store with filter and vector similarity search.
pub trait GraphStore: Send + Sync {
    /// Create the node, or replace it when the id already exists.
    ///
    /// Replacing keeps the original `created_at` and keeps any stored
    /// embedding when `node.embedding` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable)
    /// if the write fails.
    fn upsert_node(&self, node: GraphNode) -> Pin<Box<dyn Future<Output = Result<Upsert>> + Send + '_>>;

    /// Fetch a node by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable)
    /// if the read fails.
    fn get_node(&self, id: &str) -> Pin<Box<dyn Future<Output = Result<Option<GraphNode>>> + Send + '_>>;

    /// Nodes matching `filter`, most recently created first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable)
    /// if the query fails.
    fn search_nodes(
        &self,
        filter: NodeFilter,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<GraphNode>>> + Send + '_>>;

    /// Create the edge, or replace it when the id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable)
    /// if the write fails.
    fn upsert_edge(&self, edge: GraphEdge) -> Pin<Box<dyn Future<Output = Result<Upsert>> + Send + '_>>;

    /// Outgoing edges of a node, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable)
    /// if the query fails.
    fn edges_from(&self, from: &str) -> Pin<Box<dyn Future<Output = Result<Vec<GraphEdge>>> + Send + '_>>;

    /// Nodes carrying an embedding, ranked by cosine similarity to `vector`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable)
    /// if the query fails.
    fn search_similar(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScoredNode>>> + Send + '_>>;
}

/// Await a store call, mapping an elapsed `limit` to `StoreUnavailable`.
///
/// # Errors
///
/// Returns the call's own error, or
/// [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable) on timeout.
pub async fn bounded<T>(
    limit: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StoreUnavailable(format!(
            "{operation} timed out after {}s",
            limit.as_secs_f32()
        ))),
    }
}
