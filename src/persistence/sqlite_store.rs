//! `SQLite` implementation of [`GraphStore`].

use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

use crate::models::node::{
    cosine_similarity, GraphEdge, GraphNode, NodeFilter, ScoredNode, Upsert,
};
use crate::{AppError, Result};

use super::db::Database;
use super::graph_store::GraphStore;

/// Graph store backed by the `node` and `edge` tables.
#[derive(Clone)]
pub struct SqliteGraphStore {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct NodeRow {
    id: String,
    node_type: String,
    labels: String,
    properties: String,
    embedding: Option<String>,
    created_at: String,
    updated_at: String,
}

impl NodeRow {
    fn into_node(self) -> Result<GraphNode> {
        let labels: Vec<String> = serde_json::from_str(&self.labels)
            .map_err(|e| AppError::StoreUnavailable(format!("invalid labels: {e}")))?;
        let properties = serde_json::from_str(&self.properties)
            .map_err(|e| AppError::StoreUnavailable(format!("invalid properties: {e}")))?;
        let embedding = self
            .embedding
            .as_deref()
            .map(serde_json::from_str::<Vec<f32>>)
            .transpose()
            .map_err(|e| AppError::StoreUnavailable(format!("invalid embedding: {e}")))?;

        Ok(GraphNode {
            id: self.id,
            node_type: self.node_type,
            labels,
            properties,
            embedding,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct EdgeRow {
    id: String,
    edge_type: String,
    from_id: String,
    to_id: String,
    properties: String,
    created_at: String,
}

impl EdgeRow {
    fn into_edge(self) -> Result<GraphEdge> {
        let properties = serde_json::from_str(&self.properties)
            .map_err(|e| AppError::StoreUnavailable(format!("invalid properties: {e}")))?;
        Ok(GraphEdge {
            id: self.id,
            edge_type: self.edge_type,
            from: self.from_id,
            to: self.to_id,
            properties,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| AppError::StoreUnavailable(format!("invalid timestamp: {e}")))?
        .with_timezone(&Utc))
}

/// Fixed-width UTC timestamps so lexical order equals chronological order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::StoreUnavailable(format!("failed to encode column: {e}")))
}

const NODE_COLUMNS: &str =
    "id, node_type, labels, properties, embedding, created_at, updated_at";

/// A property's value as filter text: strings bare, everything else as JSON.
const RENDERED_PROPERTY: &str = "CASE prop.type \
     WHEN 'text' THEN prop.atom \
     WHEN 'true' THEN 'true' \
     WHEN 'false' THEN 'false' \
     WHEN 'null' THEN 'null' \
     WHEN 'integer' THEN CAST(prop.atom AS TEXT) \
     WHEN 'real' THEN CAST(prop.atom AS TEXT) \
     ELSE prop.value END";

/// `SELECT` for the type, label and property clauses of `filter`, newest
/// first. The text clause is left to [`NodeFilter::matches`].
fn filtered_select(filter: &NodeFilter) -> QueryBuilder<'_, Sqlite> {
    let mut query = QueryBuilder::new(format!("SELECT {NODE_COLUMNS} FROM node WHERE 1 = 1"));

    if let Some(ref node_type) = filter.node_type {
        query.push(" AND node_type = ").push_bind(node_type.as_str());
    }
    for label in &filter.labels {
        query
            .push(" AND EXISTS (SELECT 1 FROM json_each(node.labels) AS label WHERE label.value = ")
            .push_bind(label.as_str())
            .push(")");
    }
    for (key, expected) in &filter.properties {
        query
            .push(" AND EXISTS (SELECT 1 FROM json_each(node.properties) AS prop WHERE prop.key = ")
            .push_bind(key.as_str());
        match expected {
            Value::String(text) => {
                query
                    .push(format!(" AND {RENDERED_PROPERTY} = "))
                    .push_bind(text.as_str());
            }
            other => {
                query
                    .push(format!(" AND prop.type <> 'text' AND {RENDERED_PROPERTY} = "))
                    .push_bind(other.to_string());
            }
        }
        query.push(")");
    }

    query.push(" ORDER BY created_at DESC, rowid DESC");
    query
}

impl SqliteGraphStore {
    /// Create a new store over an already-bootstrapped pool.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn upsert_node_inner(&self, node: GraphNode) -> Result<Upsert> {
        let labels = encode_json(&node.labels)?;
        let properties = encode_json(&node.properties)?;
        let embedding = node.embedding.as_deref().map(encode_json).transpose()?;

        let mut tx = self.db.begin().await?;
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM node WHERE id = ?1")
            .bind(&node.id)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = if existing.is_some() {
            sqlx::query(
                "UPDATE node
                 SET node_type = ?2, labels = ?3, properties = ?4,
                     embedding = COALESCE(?5, embedding), updated_at = ?6
                 WHERE id = ?1",
            )
            .bind(&node.id)
            .bind(&node.node_type)
            .bind(&labels)
            .bind(&properties)
            .bind(&embedding)
            .bind(format_timestamp(node.updated_at))
            .execute(&mut *tx)
            .await?;
            Upsert::Updated
        } else {
            sqlx::query(&format!(
                "INSERT INTO node ({NODE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))
            .bind(&node.id)
            .bind(&node.node_type)
            .bind(&labels)
            .bind(&properties)
            .bind(&embedding)
            .bind(format_timestamp(node.created_at))
            .bind(format_timestamp(node.updated_at))
            .execute(&mut *tx)
            .await?;
            Upsert::Created
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn search_nodes_inner(&self, filter: NodeFilter, limit: usize) -> Result<Vec<GraphNode>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut query = filtered_select(&filter);

        if filter.text.is_none() {
            query
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
            let rows: Vec<NodeRow> = query.build_query_as().fetch_all(self.db.as_ref()).await?;
            return rows.into_iter().map(NodeRow::into_node).collect();
        }

        // Text matching is Unicode case-insensitive, which SQLite's lower()
        // is not, so the remaining rows are streamed and checked here.
        let mut rows = query.build_query_as::<NodeRow>().fetch(self.db.as_ref());
        let mut matched = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let node = row.into_node()?;
            if filter.matches(&node) {
                matched.push(node);
                if matched.len() >= limit {
                    break;
                }
            }
        }
        Ok(matched)
    }

    async fn upsert_edge_inner(&self, edge: GraphEdge) -> Result<Upsert> {
        let properties = encode_json(&edge.properties)?;
        let mut tx = self.db.begin().await?;
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM edge WHERE id = ?1")
            .bind(&edge.id)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = if existing.is_some() {
            sqlx::query(
                "UPDATE edge SET edge_type = ?2, from_id = ?3, to_id = ?4, properties = ?5
                 WHERE id = ?1",
            )
            .bind(&edge.id)
            .bind(&edge.edge_type)
            .bind(&edge.from)
            .bind(&edge.to)
            .bind(&properties)
            .execute(&mut *tx)
            .await?;
            Upsert::Updated
        } else {
            sqlx::query(
                "INSERT INTO edge (id, edge_type, from_id, to_id, properties, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&edge.id)
            .bind(&edge.edge_type)
            .bind(&edge.from)
            .bind(&edge.to)
            .bind(&properties)
            .bind(format_timestamp(edge.created_at))
            .execute(&mut *tx)
            .await?;
            Upsert::Created
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn search_similar_inner(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS} FROM node WHERE embedding IS NOT NULL"
        ))
        .fetch_all(self.db.as_ref())
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let node = row.into_node()?;
            let score = node
                .embedding
                .as_deref()
                .map_or(0.0, |candidate| cosine_similarity(&vector, candidate));
            scored.push(ScoredNode { node, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

impl GraphStore for SqliteGraphStore {
    fn upsert_node(&self, node: GraphNode) -> Pin<Box<dyn Future<Output = Result<Upsert>> + Send + '_>> {
        Box::pin(self.upsert_node_inner(node))
    }

    fn get_node(&self, id: &str) -> Pin<Box<dyn Future<Output = Result<Option<GraphNode>>> + Send + '_>> {
        let id = id.to_owned();
        Box::pin(async move {
            let row: Option<NodeRow> =
                sqlx::query_as(&format!("SELECT {NODE_COLUMNS} FROM node WHERE id = ?1"))
                    .bind(&id)
                    .fetch_optional(self.db.as_ref())
                    .await?;
            row.map(NodeRow::into_node).transpose()
        })
    }

    fn search_nodes(
        &self,
        filter: NodeFilter,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<GraphNode>>> + Send + '_>> {
        Box::pin(self.search_nodes_inner(filter, limit))
    }

    fn upsert_edge(&self, edge: GraphEdge) -> Pin<Box<dyn Future<Output = Result<Upsert>> + Send + '_>> {
        Box::pin(self.upsert_edge_inner(edge))
    }

    fn edges_from(&self, from: &str) -> Pin<Box<dyn Future<Output = Result<Vec<GraphEdge>>> + Send + '_>> {
        let from = from.to_owned();
        Box::pin(async move {
            let rows: Vec<EdgeRow> = sqlx::query_as(
                "SELECT id, edge_type, from_id, to_id, properties, created_at
                 FROM edge WHERE from_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )
            .bind(&from)
            .fetch_all(self.db.as_ref())
            .await?;
            rows.into_iter().map(EdgeRow::into_edge).collect()
        })
    }

    fn search_similar(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScoredNode>>> + Send + '_>> {
        Box::pin(self.search_similar_inner(vector, limit))
    }
}
