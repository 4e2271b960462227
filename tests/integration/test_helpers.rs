//! Shared builders for orchestrator-level integration tests.
//!
//! Provides an `AppState` over an in-memory store wrapped in a switchable
//! failure layer, a recording harvester, and a deterministic embedder.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_chronicle::config::GlobalConfig;
use agent_chronicle::harvest::{HarvestOutcome, Harvester};
use agent_chronicle::indexing::Embedder;
use agent_chronicle::models::node::{GraphEdge, GraphNode, NodeFilter, ScoredNode, Upsert};
use agent_chronicle::orchestrator::session_manager::StartParams;
use agent_chronicle::persistence::db;
use agent_chronicle::persistence::graph_store::GraphStore;
use agent_chronicle::persistence::sqlite_store::SqliteGraphStore;
use agent_chronicle::state::{AppState, Collaborators};
use agent_chronicle::workspace::context_loader::FsContextLoader;
use agent_chronicle::workspace::WorkspacePaths;
use agent_chronicle::{AppError, Result};
use tempfile::TempDir;

type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Store wrapper that can be switched to fail or hang every call.
pub struct FlakyStore {
    inner: Arc<dyn GraphStore>,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn GraphStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    fn guard<'a, T: Send + 'a>(&'a self, call: StoreFuture<'a, T>) -> StoreFuture<'a, T> {
        let failing = self.failing.load(Ordering::SeqCst);
        let hanging = self.hanging.load(Ordering::SeqCst);
        Box::pin(async move {
            if hanging {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if failing {
                return Err(AppError::StoreUnavailable("connection refused".into()));
            }
            call.await
        })
    }
}

impl GraphStore for FlakyStore {
    fn upsert_node(&self, node: GraphNode) -> StoreFuture<'_, Upsert> {
        self.guard(self.inner.upsert_node(node))
    }

    fn get_node(&self, id: &str) -> StoreFuture<'_, Option<GraphNode>> {
        self.guard(self.inner.get_node(id))
    }

    fn search_nodes(&self, filter: NodeFilter, limit: usize) -> StoreFuture<'_, Vec<GraphNode>> {
        self.guard(self.inner.search_nodes(filter, limit))
    }

    fn upsert_edge(&self, edge: GraphEdge) -> StoreFuture<'_, Upsert> {
        self.guard(self.inner.upsert_edge(edge))
    }

    fn edges_from(&self, from: &str) -> StoreFuture<'_, Vec<GraphEdge>> {
        self.guard(self.inner.edges_from(from))
    }

    fn search_similar(&self, vector: Vec<f32>, limit: usize) -> StoreFuture<'_, Vec<ScoredNode>> {
        self.guard(self.inner.search_similar(vector, limit))
    }
}

/// Harvester recording every call instead of running git.
#[derive(Default)]
pub struct RecordingHarvester {
    pub calls: Mutex<Vec<(PathBuf, String)>>,
    pub fail: AtomicBool,
}

impl RecordingHarvester {
    pub fn messages(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Harvester for RecordingHarvester {
    fn commit_and_push<'a>(
        &'a self,
        repo_root: &'a Path,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<HarvestOutcome>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("lock")
                .push((repo_root.to_path_buf(), message.to_owned()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Harvest("git commit failed".into()));
            }
            Ok(HarvestOutcome {
                committed: true,
                pushed: true,
            })
        })
    }
}

/// Embedder mapping text onto three keyword axes.
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<f32>>>> + Send + 'a>> {
        Box::pin(async move {
            let lower = text.to_lowercase();
            let axis = |word: &str| if lower.contains(word) { 1.0 } else { 0.0 };
            Ok(Some(vec![axis("parser"), axis("release"), 0.1]))
        })
    }
}

/// One isolated workspace with its services.
pub struct Harness {
    pub _dir: TempDir,
    pub config: Arc<GlobalConfig>,
    pub store: Arc<FlakyStore>,
    pub harvester: Arc<RecordingHarvester>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub state: AppState,
}

impl Harness {
    pub fn root(&self) -> &Path {
        self.config.default_workspace_root()
    }

    pub fn paths(&self) -> WorkspacePaths {
        WorkspacePaths::new(self.root())
    }

    pub fn start_params(&self) -> StartParams {
        StartParams {
            workspace_root: self.root().to_path_buf(),
            ..StartParams::default()
        }
    }

    pub fn resume_params(&self, session_id: &str) -> StartParams {
        StartParams {
            session_id: Some(session_id.to_owned()),
            ..self.start_params()
        }
    }

    /// Write a context document under `.context/`.
    pub fn write_context(&self, relative: &str, content: &str) {
        let path = self.paths().context_dir().join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, content).expect("write context");
    }

    /// Fresh services over the same store and workspace, as after a crash.
    pub fn restart(&self) -> AppState {
        build_state(
            &self.config,
            self.store.clone(),
            self.harvester.clone(),
            self.embedder.clone(),
        )
    }
}

pub fn build_state(
    config: &Arc<GlobalConfig>,
    store: Arc<dyn GraphStore>,
    harvester: Arc<dyn Harvester>,
    embedder: Option<Arc<dyn Embedder>>,
) -> AppState {
    AppState::build(
        Arc::clone(config),
        Collaborators {
            store,
            context: Arc::new(FsContextLoader::new(config.context.extra_roots.clone())),
            harvester,
            embedder,
        },
    )
    .expect("app state")
}

pub async fn harness() -> Harness {
    harness_with(|_| {}, None).await
}

pub async fn harness_with(
    tune: impl FnOnce(&mut GlobalConfig),
    embedder: Option<Arc<dyn Embedder>>,
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = GlobalConfig::for_workspace(dir.path()).expect("config");
    tune(&mut config);
    let config = Arc::new(config);

    let pool = db::connect_memory().await.expect("db connect");
    let store = Arc::new(FlakyStore::new(Arc::new(SqliteGraphStore::new(Arc::new(
        pool,
    )))));
    let harvester = Arc::new(RecordingHarvester::default());
    let state = build_state(&config, store.clone(), harvester.clone(), embedder.clone());

    Harness {
        _dir: dir,
        config,
        store,
        harvester,
        embedder,
        state,
    }
}

/// Full text of a file.
pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read file")
}
