//! Repository for nodes linked to a session: decisions, tasks, activity
//! evidence, and indexed checkpoint text.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::models::artifact::{Activity, ActivityKind, Decision, RelationType, Task};
use crate::models::node::{node_type, GraphEdge, GraphNode, NodeFilter};
use crate::Result;

use super::graph_store::{bounded, GraphStore};

/// Repository for session-linked artifact nodes.
#[derive(Clone)]
pub struct ArtifactRepo {
    store: Arc<dyn GraphStore>,
    timeout: Duration,
}

impl ArtifactRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Store a decision node and link it with `MADE_DECISION`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if either write fails.
    pub async fn record_decision(&self, decision: &Decision) -> Result<()> {
        let node = GraphNode::from_properties(
            decision.id.clone(),
            node_type::DECISION,
            &[node_type::DECISION],
            decision,
        )?;
        self.link_node(node, &decision.session_id, RelationType::MadeDecision)
            .await
    }

    /// Store a task node and link it with `IDENTIFIED_TASK`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if either write fails.
    pub async fn record_task(&self, task: &Task) -> Result<()> {
        let node =
            GraphNode::from_properties(task.id.clone(), node_type::TASK, &[node_type::TASK], task)?;
        self.link_node(node, &task.session_id, RelationType::IdentifiedTask)
            .await
    }

    /// Store an activity node and link it with `PERFORMED`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if either write fails.
    pub async fn record_activity(&self, activity: &Activity) -> Result<()> {
        let node = GraphNode::from_properties(
            activity.id.clone(),
            node_type::ACTIVITY,
            &[node_type::ACTIVITY, activity.kind.as_str()],
            activity,
        )?;
        self.link_node(node, &activity.session_id, RelationType::Performed)
            .await
    }

    /// Whether any activity of one of `kinds` was recorded for a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the query fails.
    pub async fn has_activity(&self, session_id: &str, kinds: &[ActivityKind]) -> Result<bool> {
        for kind in kinds {
            let filter = NodeFilter::any()
                .of_type(node_type::ACTIVITY)
                .with_label(kind.as_str())
                .with_property("session_id", session_id);
            let hits = bounded(
                self.timeout,
                "activity evidence",
                self.store.search_nodes(filter, 1),
            )
            .await?;
            if !hits.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Store checkpoint text with its embedding, linked with `HAS_CHECKPOINT`.
    ///
    /// Returns the new node id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if either write fails.
    pub async fn store_log_chunk(
        &self,
        session_id: &str,
        text: &str,
        embedding: Vec<f32>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut node = GraphNode::from_properties(
            id.clone(),
            node_type::LOG_CHUNK,
            &[node_type::LOG_CHUNK],
            &json!({ "session_id": session_id, "text": text }),
        )?;
        node.embedding = Some(embedding);
        self.link_node(node, session_id, RelationType::HasCheckpoint)
            .await?;
        Ok(id)
    }

    async fn link_node(
        &self,
        node: GraphNode,
        session_id: &str,
        relation: RelationType,
    ) -> Result<()> {
        let edge = GraphEdge::link(relation.as_str(), session_id, &node.id);
        bounded(self.timeout, "create node", self.store.upsert_node(node)).await?;
        bounded(self.timeout, "create edge", self.store.upsert_edge(edge)).await?;
        Ok(())
    }
}
