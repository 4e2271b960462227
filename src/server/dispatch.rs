//! Method routing for decoded requests.
//!
//! | Method              | Operation                                   |
//! |---------------------|---------------------------------------------|
//! | `session/start`     | [`SessionOrchestrator::start`]              |
//! | `session/end`       | [`SessionOrchestrator::end`]                |
//! | `session/quicksave` | [`CheckpointService::quicksave`]            |
//! | `activity/record`   | [`SessionOrchestrator::record_activity`]    |
//! | `memory/read`       | [`MemoryService::read_memory`]              |
//! | `node/read`         | [`MemoryService::read_node`]                |
//! | `node/search`       | [`MemoryService::search_nodes`]             |
//! | `search`            | [`MemoryService::search`]                   |
//!
//! [`SessionOrchestrator::start`]: crate::orchestrator::session_manager::SessionOrchestrator::start
//! [`SessionOrchestrator::end`]: crate::orchestrator::session_manager::SessionOrchestrator::end
//! [`SessionOrchestrator::record_activity`]: crate::orchestrator::session_manager::SessionOrchestrator::record_activity
//! [`CheckpointService::quicksave`]: crate::orchestrator::checkpoint_manager::CheckpointService::quicksave
//! [`MemoryService::read_memory`]: crate::orchestrator::memory::MemoryService::read_memory
//! [`MemoryService::read_node`]: crate::orchestrator::memory::MemoryService::read_node
//! [`MemoryService::search_nodes`]: crate::orchestrator::memory::MemoryService::search_nodes
//! [`MemoryService::search`]: crate::orchestrator::memory::MemoryService::search

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::models::artifact::ActivityKind;
use crate::orchestrator::checkpoint_manager::QuicksaveParams;
use crate::orchestrator::session_manager::{ActivityParams, EndParams, StartParams};
use crate::state::AppState;
use crate::{AppError, Result};

use super::codec::{Request, Response};

const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct StartRequest {
    session_id: Option<String>,
    workspace_root: Option<PathBuf>,
    user_id: Option<String>,
    project_id: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EndRequest {
    session_id: String,
    summary: String,
    #[serde(default)]
    decisions: Vec<String>,
    #[serde(default)]
    next_steps: Vec<String>,
    workspace_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct QuicksaveRequest {
    summary: String,
    #[serde(default)]
    bullets: Vec<String>,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivityRequest {
    kind: ActivityKind,
    #[serde(default)]
    detail: String,
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemoryRequest {
    path: String,
    workspace_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct NodeRequest {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    limit: Option<usize>,
}

/// Route `request` to its operation and wrap the outcome for the wire.
pub async fn handle(state: &AppState, request: Request) -> Response {
    debug!(method = request.method.as_str(), "request received");
    let result = route(state, &request.method, request.params).await;
    Response::new(request.id, result)
}

fn params<T: DeserializeOwned>(method: &str, raw: Value) -> Result<T> {
    let raw = if raw.is_null() { json!({}) } else { raw };
    serde_json::from_value(raw)
        .map_err(|err| AppError::InvalidInput(format!("invalid {method} params: {err}")))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|err| AppError::Protocol(format!("failed to encode response: {err}")))
}

async fn route(state: &AppState, method: &str, raw: Value) -> Result<Value> {
    match method {
        "session/start" => {
            let req: StartRequest = params(method, raw)?;
            let outcome = state
                .sessions
                .start(StartParams {
                    session_id: req.session_id,
                    workspace_root: req
                        .workspace_root
                        .unwrap_or_else(|| state.config.default_workspace_root().to_path_buf()),
                    user_id: req.user_id,
                    project_id: req.project_id,
                    description: req.description,
                })
                .await?;
            to_value(&outcome)
        }
        "session/end" => {
            let req: EndRequest = params(method, raw)?;
            let outcome = state
                .sessions
                .end(EndParams {
                    session_id: req.session_id,
                    summary: req.summary,
                    decisions: req.decisions,
                    next_steps: req.next_steps,
                    workspace_root: req.workspace_root,
                })
                .await?;
            to_value(&outcome)
        }
        "session/quicksave" => {
            let req: QuicksaveRequest = params(method, raw)?;
            let outcome = state
                .checkpoints
                .quicksave(QuicksaveParams {
                    summary: req.summary,
                    bullets: req.bullets,
                    session_id: req.session_id,
                })
                .await?;
            to_value(&outcome)
        }
        "activity/record" => {
            let req: ActivityRequest = params(method, raw)?;
            let outcome = state
                .sessions
                .record_activity(ActivityParams {
                    kind: req.kind,
                    detail: req.detail,
                    session_id: req.session_id,
                })
                .await?;
            to_value(&outcome)
        }
        "memory/read" => {
            let req: MemoryRequest = params(method, raw)?;
            let document = state.memory.read_memory(&req.path, req.workspace_root).await?;
            to_value(&document)
        }
        "node/read" => {
            let req: NodeRequest = params(method, raw)?;
            let node = state.memory.read_node(&req.id).await?;
            Ok(json!({ "node": node }))
        }
        "node/search" => {
            let req: SearchRequest = params(method, raw)?;
            let nodes = state
                .memory
                .search_nodes(&req.query, req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
                .await?;
            Ok(json!({ "nodes": nodes }))
        }
        "search" => {
            let req: SearchRequest = params(method, raw)?;
            let hits = state
                .memory
                .search(&req.query, req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
                .await?;
            Ok(json!({ "hits": hits }))
        }
        other => Err(AppError::Protocol(format!("unknown method: {other}"))),
    }
}
