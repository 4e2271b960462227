//! Session repository over the graph store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::node::{node_type, GraphNode, NodeFilter, Upsert};
use crate::models::session::{RecentSession, SessionRecord};
use crate::{AppError, Result};

use super::graph_store::{bounded, GraphStore};

/// Result of looking a session id up without failing on store errors.
#[derive(Debug)]
pub enum SessionLookup {
    /// The record exists.
    Found(SessionRecord),
    /// No record with this id.
    Missing,
    /// The store errored or timed out.
    Unavailable(AppError),
}

/// Repository for `Session` nodes.
#[derive(Clone)]
pub struct SessionRepo {
    store: Arc<dyn GraphStore>,
    timeout: Duration,
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Retrieve a session by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the store fails or times out.
    pub async fn get(&self, id: &str) -> Result<Option<SessionRecord>> {
        let node = bounded(self.timeout, "get session", self.store.get_node(id)).await?;
        match node {
            Some(node) if node.node_type == node_type::SESSION => node.decode().map(Some),
            _ => Ok(None),
        }
    }

    /// Retrieve a session, folding store failures into the result.
    pub async fn lookup(&self, id: &str) -> SessionLookup {
        match self.get(id).await {
            Ok(Some(record)) => SessionLookup::Found(record),
            Ok(None) => SessionLookup::Missing,
            Err(err) => SessionLookup::Unavailable(err),
        }
    }

    /// Create or replace the session node.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the write fails or times out.
    pub async fn save(&self, record: &SessionRecord) -> Result<Upsert> {
        let mut node = GraphNode::from_properties(
            record.id.clone(),
            node_type::SESSION,
            &[node_type::SESSION],
            record,
        )?;
        node.created_at = record.start_time;
        node.updated_at = record.last_activity;
        bounded(self.timeout, "save session", self.store.upsert_node(node)).await
    }

    /// Advance a session's `last_activity` and persist it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionNotFound` if the record is missing, or
    /// `AppError::StoreUnavailable` if the store fails.
    pub async fn touch(&self, id: &str, at: DateTime<Utc>) -> Result<SessionRecord> {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(id.to_owned()))?;
        record.touch(at);
        self.save(&record).await?;
        Ok(record)
    }

    /// Flip a session to `Completed` with its end time and summary.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionNotFound` if the record is missing,
    /// `AppError::SessionClosed` if it already completed, or
    /// `AppError::StoreUnavailable` if the store fails.
    pub async fn complete(
        &self,
        id: &str,
        end_time: DateTime<Utc>,
        summary: String,
    ) -> Result<SessionRecord> {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(id.to_owned()))?;
        record.complete(end_time, summary)?;
        self.save(&record).await?;
        Ok(record)
    }

    /// Most recently created sessions, newest first, excluding `exclude`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the query fails or times out.
    pub async fn recent(&self, limit: usize, exclude: Option<&str>) -> Result<Vec<RecentSession>> {
        let filter = NodeFilter::any().of_type(node_type::SESSION);
        let nodes = bounded(
            self.timeout,
            "recent sessions",
            self.store.search_nodes(filter, limit.saturating_add(1)),
        )
        .await?;

        let mut recent = Vec::with_capacity(limit);
        for node in nodes {
            if exclude == Some(node.id.as_str()) {
                continue;
            }
            let record: SessionRecord = node.decode()?;
            recent.push(RecentSession::from(&record));
            if recent.len() == limit {
                break;
            }
        }
        Ok(recent)
    }
}
