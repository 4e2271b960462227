//! Generic graph node and edge shapes exchanged with the durable store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// Node type names used by this crate.
pub mod node_type {
    /// Durable session record.
    pub const SESSION: &str = "Session";
    /// Decision made during a session.
    pub const DECISION: &str = "Decision";
    /// Next step identified during a session.
    pub const TASK: &str = "Task";
    /// Recorded activity evidence.
    pub const ACTIVITY: &str = "Activity";
    /// Indexed quicksave text.
    pub const LOG_CHUNK: &str = "LogChunk";
}

/// Result of a create-or-update call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Upsert {
    /// No node or edge with this id existed.
    Created,
    /// An existing node or edge was replaced.
    Updated,
}

/// A typed node with free-form JSON properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    /// Unique identifier.
    pub id: String,
    /// Node type, e.g. `Session`.
    pub node_type: String,
    /// Labels used for coarse filtering.
    pub labels: Vec<String>,
    /// Property object.
    pub properties: Value,
    /// Optional embedding vector for similarity search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Creation timestamp, preserved across updates.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl GraphNode {
    /// Build a node from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `properties` does not serialize
    /// to a JSON object.
    pub fn from_properties<T: Serialize>(
        id: impl Into<String>,
        node_type: &str,
        labels: &[&str],
        properties: &T,
    ) -> Result<Self> {
        let properties = serde_json::to_value(properties)
            .map_err(|err| AppError::InvalidInput(format!("unserializable properties: {err}")))?;
        if !properties.is_object() {
            return Err(AppError::InvalidInput(
                "node properties must be a JSON object".into(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: id.into(),
            node_type: node_type.to_owned(),
            labels: labels.iter().map(|label| (*label).to_owned()).collect(),
            properties,
            embedding: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Deserialize the property object into a typed value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the stored properties do not
    /// match the expected shape.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_value(self.properties.clone()).map_err(|err| {
            AppError::StoreUnavailable(format!(
                "node {} has malformed {} properties: {err}",
                self.id, self.node_type
            ))
        })
    }

    /// Whether the node carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A typed, directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    /// Unique identifier.
    pub id: String,
    /// Relationship type, e.g. `MADE_DECISION`.
    pub edge_type: String,
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Property object.
    pub properties: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl GraphEdge {
    /// Construct an edge with a generated identifier and empty properties.
    #[must_use]
    pub fn link(edge_type: &str, from: &str, to: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            edge_type: edge_type.to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
            properties: Value::Object(serde_json::Map::new()),
            created_at: Utc::now(),
        }
    }
}

/// A node returned by similarity search with its cosine score.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredNode {
    /// Matching node.
    pub node: GraphNode,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Conjunctive node filter: every populated clause must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    /// Required node type.
    pub node_type: Option<String>,
    /// Required labels.
    pub labels: Vec<String>,
    /// Required property equalities.
    pub properties: Vec<(String, Value)>,
    /// Case-insensitive text that some string property must contain.
    pub text: Option<String>,
}

impl NodeFilter {
    /// Filter matching every node.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to a node type.
    #[must_use]
    pub fn of_type(mut self, node_type: &str) -> Self {
        self.node_type = Some(node_type.to_owned());
        self
    }

    /// Require a label.
    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        self.labels.push(label.to_owned());
        self
    }

    /// Require a property equal to `value`.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.push((key.to_owned(), value.into()));
        self
    }

    /// Require some string property to contain `needle`, ignoring case.
    #[must_use]
    pub fn containing(mut self, needle: &str) -> Self {
        self.text = Some(needle.to_lowercase());
        self
    }

    /// Parse the `key=value[&key=value...]` expression syntax.
    ///
    /// `Label=<x>` requires a label, `type=<x>` or `Name=<x>` a node type,
    /// anything else a property. An empty expression matches everything.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for a clause without `=` or with an
    /// empty key.
    pub fn parse(expr: &str) -> Result<Self> {
        let mut filter = Self::any();
        for clause in expr.split('&').map(str::trim).filter(|c| !c.is_empty()) {
            let (key, value) = clause
                .split_once('=')
                .ok_or_else(|| AppError::InvalidInput(format!("filter clause `{clause}` lacks `=`")))?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "filter clause `{clause}` has an empty key"
                )));
            }
            if key.eq_ignore_ascii_case("label") {
                filter = filter.with_label(value);
            } else if key.eq_ignore_ascii_case("type") || key.eq_ignore_ascii_case("name") {
                filter = filter.of_type(value);
            } else {
                filter = filter.with_property(key, value);
            }
        }
        Ok(filter)
    }

    /// Whether `node` satisfies every clause.
    #[must_use]
    pub fn matches(&self, node: &GraphNode) -> bool {
        if let Some(ref node_type) = self.node_type {
            if &node.node_type != node_type {
                return false;
            }
        }
        if !self.labels.iter().all(|label| node.has_label(label)) {
            return false;
        }
        if let Some(ref needle) = self.text {
            if !contains_text(&node.properties, needle) {
                return false;
            }
        }
        self.properties.iter().all(|(key, expected)| {
            node.properties
                .get(key)
                .is_some_and(|actual| value_matches(actual, expected))
        })
    }
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(text) => text.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|item| contains_text(item, needle)),
        Value::Object(map) => map.values().any(|item| contains_text(item, needle)),
        _ => false,
    }
}

/// Equality that lets parsed string clauses match non-string properties.
fn value_matches(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(_), _) => false,
        (other, Value::String(text)) => other.to_string() == *text,
        _ => false,
    }
}

/// Cosine similarity; zero when either vector is empty, zero-length, or
/// the dimensions differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
