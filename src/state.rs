//! Composition root: builds every service from configuration and the
//! external collaborators.

use std::sync::Arc;

use tracing::info;

use crate::config::GlobalConfig;
use crate::harvest::{GitHarvester, Harvester};
use crate::indexing::{Embedder, Indexer, OllamaEmbedder};
use crate::orchestrator::checkpoint_manager::CheckpointService;
use crate::orchestrator::compliance::predicates_from_config;
use crate::orchestrator::memory::MemoryService;
use crate::orchestrator::registry::SessionRegistry;
use crate::orchestrator::session_manager::SessionOrchestrator;
use crate::persistence::artifact_repo::ArtifactRepo;
use crate::persistence::graph_store::GraphStore;
use crate::persistence::session_repo::SessionRepo;
use crate::workspace::context_loader::{ContextLoader, FsContextLoader};
use crate::Result;

/// External collaborators injected into the services.
#[derive(Clone)]
pub struct Collaborators {
    /// Durable graph store.
    pub store: Arc<dyn GraphStore>,
    /// Context document loader.
    pub context: Arc<dyn ContextLoader>,
    /// Version-control harvester.
    pub harvester: Arc<dyn Harvester>,
    /// Optional embedder for indexing and vector search.
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl Collaborators {
    /// Default collaborators for `config` over `store`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Embedding` if the embedding client cannot be built.
    pub fn from_config(config: &GlobalConfig, store: Arc<dyn GraphStore>) -> Result<Self> {
        let embedder: Option<Arc<dyn Embedder>> = if config.embedding.enabled {
            Some(Arc::new(OllamaEmbedder::from_config(&config.embedding)?))
        } else {
            None
        };
        Ok(Self {
            store,
            context: Arc::new(FsContextLoader::new(config.context.extra_roots.clone())),
            harvester: Arc::new(GitHarvester::from_config(&config.harvest)),
            embedder,
        })
    }
}

/// Shared application state handed to the request dispatcher.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Sessions open in this process.
    pub registry: Arc<SessionRegistry>,
    /// Session lifecycle.
    pub sessions: SessionOrchestrator,
    /// Quicksave checkpoints.
    pub checkpoints: CheckpointService,
    /// Read-side queries.
    pub memory: MemoryService,
}

impl AppState {
    /// Wire every service around one registry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the compliance configuration is invalid.
    pub fn build(config: Arc<GlobalConfig>, collaborators: Collaborators) -> Result<Self> {
        let timeout = config.store_timeout();
        let registry = Arc::new(SessionRegistry::new());
        let session_repo = SessionRepo::new(Arc::clone(&collaborators.store), timeout);
        let artifact_repo = ArtifactRepo::new(Arc::clone(&collaborators.store), timeout);

        let predicates = predicates_from_config(&config.compliance, &artifact_repo)?;
        let indexer = collaborators
            .embedder
            .as_ref()
            .map(|embedder| Indexer::new(Arc::clone(embedder), artifact_repo.clone()));
        info!(
            predicates = predicates.len(),
            indexing = indexer.is_some(),
            "services wired"
        );

        let sessions = SessionOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&registry),
            session_repo.clone(),
            artifact_repo.clone(),
            Arc::clone(&collaborators.context),
            Arc::clone(&collaborators.harvester),
        );
        let checkpoints =
            CheckpointService::new(Arc::clone(&registry), session_repo, predicates, indexer);
        let memory = MemoryService::new(
            Arc::clone(&collaborators.store),
            timeout,
            Arc::clone(&collaborators.context),
            Arc::clone(&registry),
            artifact_repo,
            collaborators.embedder,
            config.default_workspace_root().to_path_buf(),
        );

        Ok(Self {
            config,
            registry,
            sessions,
            checkpoints,
            memory,
        })
    }
}
