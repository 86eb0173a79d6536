// Application wiring.
// Builds the store, the cache worker and the resolution engine, and runs the
// refresh-all and clear-cache actions on top of them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::paths::{cache_dir, store_dir, worker_dir};
use crate::cache::{RecencyTracker, RecentEntry, Store};
use crate::config::AppConfig;
use crate::engine::{ResolutionEngine, Resolved, Revalidation, Session};
use crate::error::{PromptError, Result};
use crate::github::{GitHubClient, RepoRef};
use crate::net::{ReqwestTransport, Transport};
use crate::primer::Primer;
use crate::worker::{
    CacheStorage, ClientConnection, ClientId, ControlledTransport, Registration, WorkerCommand,
    WorkerReply, WorkerSettings,
};

/// How long to wait for the cache worker to acknowledge a command.
const REPLY_TIMEOUT: Duration = Duration::from_secs(300);

/// The whole prompt viewer behind one handle.
pub struct App {
    config: AppConfig,
    engine: Arc<ResolutionEngine>,
    primer: Primer,
    recent: Arc<RecencyTracker>,
    registration: Registration,
    worker_cache: Arc<CacheStorage>,
    client: Mutex<ClientConnection>,
}

impl App {
    /// Start against the real network.
    pub async fn start(config: AppConfig, online: bool) -> Result<Self> {
        let network = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(config, network, online).await
    }

    /// Start with a custom network transport.
    ///
    /// A worker that fails to install is logged and skipped; the viewer then
    /// talks to the network directly and worker commands fail with
    /// [`PromptError::WorkerUnready`].
    pub async fn with_transport(
        config: AppConfig,
        network: Arc<dyn Transport>,
        online: bool,
    ) -> Result<Self> {
        let base = cache_dir(&config)?;
        let store = Arc::new(Store::open(store_dir(&base))?);
        let worker_cache = Arc::new(CacheStorage::open(worker_dir(&base))?);

        let registration = Registration::new();
        let client = registration.connect();
        if let Err(e) = registration
            .register(
                WorkerSettings::from_config(&config),
                network.clone(),
                worker_cache.clone(),
            )
            .await
        {
            warn!(error = %e, "cache worker failed to install");
        }

        let transport = Arc::new(ControlledTransport::new(registration.clone(), network));
        let remote = Arc::new(GitHubClient::new(transport, &config));
        let recent = Arc::new(RecencyTracker::new(store.clone(), config.max_recent));
        let session = Arc::new(Session::new(client.id().clone(), online));
        let engine = Arc::new(ResolutionEngine::new(
            remote,
            store,
            recent.clone(),
            session,
            &config.document_extension,
        ));

        info!(
            owner = %config.owner,
            repo = %config.repo,
            branch = %config.branch,
            online,
            cache = %base.display(),
            "prompt viewer started"
        );

        Ok(Self {
            config,
            primer: Primer::new(engine.clone()),
            engine,
            recent,
            registration,
            worker_cache,
            client: Mutex::new(client),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<ResolutionEngine> {
        &self.engine
    }

    pub fn worker_cache(&self) -> &CacheStorage {
        &self.worker_cache
    }

    pub fn is_online(&self) -> bool {
        self.engine.session().is_online()
    }

    /// Returns the previous connectivity.
    pub fn set_online(&self, online: bool) -> bool {
        self.engine.session().set_online(online)
    }

    /// Navigate to a directory or document.
    pub async fn open(&self, path: &str) -> Result<Resolved> {
        self.engine.resolve(path).await
    }

    /// Navigate to a directory, showing the cached listing first.
    pub async fn open_optimistic(&self, path: &str) -> Result<(Resolved, Option<Revalidation>)> {
        self.engine.resolve_listing_optimistic(path).await
    }

    /// Recently viewed documents, newest first.
    pub async fn recent(&self) -> Result<Vec<RecentEntry>> {
        let recent = self.recent.clone();
        tokio::task::spawn_blocking(move || recent.list())
            .await
            .map_err(|e| PromptError::Other(format!("recent list task failed: {}", e)))?
    }

    /// Re-fetch the whole tree and have the cache worker store every document.
    /// Returns the number of documents handed to the worker.
    pub async fn refresh_all(&self) -> Result<usize> {
        if !self.is_online() {
            return Err(PromptError::NetworkUnavailable);
        }

        let documents = self.primer.collect_all_documents("").await;
        let count = documents.len();
        let repo = RepoRef::from_config(&self.config);

        self.request(
            |client_id| WorkerCommand::CacheAllPrompts {
                file_paths: documents,
                owner: repo.owner,
                repo: repo.repo,
                branch: repo.branch,
                client_id: Some(client_id),
            },
            |reply| matches!(reply, WorkerReply::CacheAllPromptsComplete),
        )
        .await?;

        info!(documents = count, "refresh complete");
        Ok(count)
    }

    /// Wipe the local store and the worker's document region.
    pub async fn clear_cache(&self) -> Result<()> {
        // Writes still in flight would repopulate the store after the wipe
        self.engine.settle().await;

        let store = self.engine.store().clone();
        tokio::task::spawn_blocking(move || store.clear())
            .await
            .map_err(|e| PromptError::ClearFailed(e.to_string()))?
            .map_err(|e| PromptError::ClearFailed(e.to_string()))?;

        let reply = self
            .request(
                |client_id| WorkerCommand::ClearPromptCache {
                    client_id: Some(client_id),
                },
                |reply| {
                    matches!(
                        reply,
                        WorkerReply::PromptCacheCleared
                            | WorkerReply::PromptCacheClearFailed { .. }
                    )
                },
            )
            .await?;

        match reply {
            WorkerReply::PromptCacheCleared => {
                info!("cache cleared");
                Ok(())
            }
            WorkerReply::PromptCacheClearFailed { error } => Err(PromptError::ClearFailed(error)),
            other => Err(PromptError::Other(format!(
                "unexpected worker reply: {:?}",
                other
            ))),
        }
    }

    /// Post a command to the controlling worker and wait for the reply
    /// accepted by `answers`. Late replies to earlier commands are skipped.
    async fn request(
        &self,
        command: impl FnOnce(ClientId) -> WorkerCommand,
        answers: impl Fn(&WorkerReply) -> bool,
    ) -> Result<WorkerReply> {
        let controller = self.registration.controller()?;
        let mut client = self.client.lock().await;
        let client_id = client.id().clone();

        controller.post_message(command(client_id.clone()), Some(client_id))?;

        match tokio::time::timeout(REPLY_TIMEOUT, client.wait_for(answers)).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(PromptError::WorkerUnready),
            Err(_) => Err(PromptError::Other(
                "timed out waiting for the cache worker".to_string(),
            )),
        }
    }

    /// Wait for every background write to land.
    pub async fn settle(&self) {
        self.engine.settle().await;
        self.registration.settle().await;
    }

    pub async fn shutdown(&self) {
        self.settle().await;
        self.registration.shutdown().await;
        info!("prompt viewer stopped");
    }
}
