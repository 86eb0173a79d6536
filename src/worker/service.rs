// The cache worker task.
// Owns the worker's cache regions, answers intercepted fetches and runs commands.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{PromptError, Result};
use crate::github::client::raw_document_url;
use crate::net::{HttpResponse, Transport};
use crate::tasks::BackgroundTasks;

use super::clients::Clients;
use super::messages::{ClientId, Envelope, WorkerCommand, WorkerReply};
use super::policy::{FetchPolicy, PolicyRules, Request, offline_response};
use super::registration::RegistrationInner;
use super::storage::CacheStorage;

/// Region for static application assets.
/// Bump the version whenever the asset list or the assets themselves change,
/// otherwise clients keep the old copies forever.
pub const SHELL_CACHE: &str = "prompt-viewer-v1";

/// Region for primed documents.
pub const PROMPT_CACHE: &str = "prompt-viewer-prompts-v1";

/// What a worker needs to know about the deployment.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub raw_base: String,
    pub raw_prefix: String,
    pub assets: Vec<String>,
    pub shell_cache: String,
    pub prompt_cache: String,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            raw_base: config.raw_base.clone(),
            raw_prefix: config.raw_prefix(),
            assets: config.shell_assets.clone(),
            shell_cache: SHELL_CACHE.to_string(),
            prompt_cache: PROMPT_CACHE.to_string(),
        }
    }

    fn is_current(&self, region: &str) -> bool {
        region == self.shell_cache || region == self.prompt_cache
    }
}

pub(crate) enum WorkerEvent {
    Command(Envelope),
    Fetch {
        request: Request,
        respond_to: oneshot::Sender<Result<HttpResponse>>,
    },
}

/// State of one worker instance.
pub struct CacheWorker {
    id: u64,
    settings: WorkerSettings,
    rules: PolicyRules,
    network: Arc<dyn Transport>,
    storage: Arc<CacheStorage>,
    clients: Arc<Clients>,
    registration: Weak<RegistrationInner>,
    background: BackgroundTasks,
}

impl CacheWorker {
    pub(crate) fn new(
        id: u64,
        settings: WorkerSettings,
        network: Arc<dyn Transport>,
        storage: Arc<CacheStorage>,
        clients: Arc<Clients>,
        registration: Weak<RegistrationInner>,
    ) -> Self {
        let rules = PolicyRules::new(&settings.raw_prefix, &settings.assets);
        Self {
            id,
            settings,
            rules,
            network,
            storage,
            clients,
            registration,
            background: BackgroundTasks::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pre-cache every static asset. Any failure aborts the install and
    /// nothing is stored.
    pub async fn install(&self) -> Result<()> {
        let mut fetched = Vec::with_capacity(self.settings.assets.len());
        for asset in &self.settings.assets {
            let response = self.network.get(asset).await?;
            if !response.is_success() {
                return Err(PromptError::FetchFailed(format!(
                    "asset {} returned HTTP {}",
                    asset, response.status
                )));
            }
            fetched.push((asset.clone(), response));
        }

        let region = self.settings.shell_cache.clone();
        self.with_storage(move |storage| {
            storage.open_region(&region)?;
            for (url, response) in &fetched {
                storage.put(&region, url, response)?;
            }
            Ok(())
        })
        .await?;

        info!(worker = self.id, assets = self.settings.assets.len(), "worker installed");
        Ok(())
    }

    /// Drop regions from older versions, then tell every client to reload.
    pub async fn activate(&self) -> Result<()> {
        let settings = self.settings.clone();
        let removed = self
            .with_storage(move |storage| {
                let mut removed = Vec::new();
                for region in storage.keys()? {
                    if !settings.is_current(&region) {
                        storage.delete(&region)?;
                        removed.push(region);
                    }
                }
                storage.open_region(&settings.prompt_cache)?;
                Ok(removed)
            })
            .await?;

        for region in &removed {
            info!(worker = self.id, region = %region, "deleted old cache region");
        }

        let notified = self.clients.broadcast(WorkerReply::SwUpdated);
        info!(worker = self.id, notified, "worker activated");
        Ok(())
    }

    /// Answer an intercepted request according to its policy.
    pub async fn handle_fetch(self: &Arc<Self>, request: Request) -> Result<HttpResponse> {
        match self.rules.classify(&request) {
            FetchPolicy::PassThrough => self.network.get(&request.url).await,
            FetchPolicy::CacheFirst => self.cache_first(&request.url).await,
            FetchPolicy::StaleWhileRevalidate => self.stale_while_revalidate(&request.url).await,
        }
    }

    async fn cache_first(self: &Arc<Self>, url: &str) -> Result<HttpResponse> {
        let region = self.settings.shell_cache.clone();
        if let Some(cached) = self.lookup(&region, url).await {
            return Ok(cached);
        }

        let response = self.network.get(url).await?;
        if response.is_success() {
            let storage = self.storage.clone();
            let (key, stored) = (url.to_string(), response.clone());
            self.background.spawn_blocking(move || {
                if let Err(e) = storage.put(&region, &key, &stored) {
                    warn!(url = %key, error = %e, "failed to cache asset");
                }
            });
        }
        Ok(response)
    }

    async fn stale_while_revalidate(self: &Arc<Self>, url: &str) -> Result<HttpResponse> {
        let region = self.settings.prompt_cache.clone();
        let generation = self.storage.generation(&region);

        if let Some(cached) = self.lookup(&region, url).await {
            let worker = self.clone();
            let url = url.to_string();
            self.background.spawn(async move {
                worker.refresh(&region, &url, generation).await;
            });
            return Ok(cached);
        }

        match self.network.get(url).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_if_current(&region, url, &response, generation)
                        .await;
                }
                Ok(response)
            }
            Err(e) => {
                warn!(url, error = %e, "network fetch failed and nothing cached");
                Ok(offline_response())
            }
        }
    }

    /// Background half of stale-while-revalidate.
    async fn refresh(&self, region: &str, url: &str, generation: u64) {
        match self.network.get(url).await {
            Ok(response) if response.is_success() => {
                self.store_if_current(region, url, &response, generation)
                    .await;
            }
            Ok(response) => debug!(url, status = response.status, "revalidation not cached"),
            Err(e) => debug!(url, error = %e, "revalidation failed"),
        }
    }

    /// Run one command to completion.
    pub(crate) async fn handle_command(&self, envelope: Envelope) {
        let source = envelope.source;
        match envelope.command {
            WorkerCommand::CacheAllPrompts {
                file_paths,
                owner,
                repo,
                branch,
                client_id,
            } => {
                info!(worker = self.id, files = file_paths.len(), "caching all prompts");
                let urls: Vec<String> = file_paths
                    .iter()
                    .map(|path| raw_document_url(&self.settings.raw_base, &owner, &repo, &branch, path))
                    .collect();
                let cached = self.cache_all(&urls).await;
                info!(
                    worker = self.id,
                    cached,
                    failed = urls.len() - cached,
                    "finished caching prompts"
                );
                self.reply(
                    client_id.as_ref(),
                    source.as_ref(),
                    WorkerReply::CacheAllPromptsComplete,
                );
            }
            WorkerCommand::ClearPromptCache { client_id } => {
                let region = self.settings.prompt_cache.clone();
                let reply = match self.with_storage(move |s| s.delete(&region)).await {
                    Ok(_) => {
                        info!(worker = self.id, "prompt cache cleared");
                        WorkerReply::PromptCacheCleared
                    }
                    Err(e) => {
                        error!(worker = self.id, error = %e, "failed to clear prompt cache");
                        WorkerReply::PromptCacheClearFailed {
                            error: e.to_string(),
                        }
                    }
                };
                self.reply(source.as_ref(), client_id.as_ref(), reply);
            }
            WorkerCommand::SkipWaiting => match self.registration.upgrade() {
                Some(registration) => {
                    if let Err(e) = registration.promote(self.id).await {
                        error!(worker = self.id, error = %e, "activation failed");
                    }
                }
                None => debug!(worker = self.id, "registration gone, ignoring skipWaiting"),
            },
        }
    }

    /// Fetch and store every URL. Returns how many were stored.
    async fn cache_all(&self, urls: &[String]) -> usize {
        let region = self.settings.prompt_cache.clone();
        let generation = self.storage.generation(&region);

        let attempts = urls.iter().map(|url| {
            let region = region.clone();
            async move {
                match self.network.get(url).await {
                    Ok(response) if response.is_success() => {
                        debug!(url = %url, "caching prompt");
                        self.store_if_current(&region, url, &response, generation)
                            .await
                    }
                    Ok(response) => {
                        error!(url = %url, status = response.status, "failed to fetch prompt for caching");
                        false
                    }
                    Err(e) => {
                        error!(url = %url, error = %e, "error fetching prompt for caching");
                        false
                    }
                }
            }
        });

        join_all(attempts).await.into_iter().filter(|stored| *stored).count()
    }

    /// Send to the preferred client, or the fallback if that one is unknown.
    fn reply(&self, preferred: Option<&ClientId>, fallback: Option<&ClientId>, reply: WorkerReply) {
        let delivered = preferred.is_some_and(|id| self.clients.post(id, reply.clone()))
            || fallback.is_some_and(|id| self.clients.post(id, reply.clone()));
        if !delivered {
            warn!(worker = self.id, ?reply, "no client to deliver reply to");
        }
    }

    async fn lookup(&self, region: &str, url: &str) -> Option<HttpResponse> {
        let (region, key) = (region.to_string(), url.to_string());
        match self.with_storage(move |s| s.match_url(&region, &key)).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn store_if_current(
        &self,
        region: &str,
        url: &str,
        response: &HttpResponse,
        generation: u64,
    ) -> bool {
        let (region, key, response) = (region.to_string(), url.to_string(), response.clone());
        match self
            .with_storage(move |s| s.put_if_current(&region, &key, &response, generation))
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(url, error = %e, "failed to cache response");
                false
            }
        }
    }

    async fn with_storage<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CacheStorage) -> Result<T> + Send + 'static,
    {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || f(&storage))
            .await
            .map_err(|e| PromptError::Other(format!("storage task failed: {}", e)))?
    }

    /// Wait for background cache writes and revalidations.
    pub async fn settle(&self) {
        self.background.settle().await;
    }
}

/// Start the worker's event loop. Commands run one at a time in arrival
/// order; fetches are answered concurrently.
pub(crate) fn spawn(worker: Arc<CacheWorker>) -> WorkerHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = worker.id;

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Fetch {
                    request,
                    respond_to,
                } => {
                    let worker = worker.clone();
                    tokio::spawn(async move {
                        let _ = respond_to.send(worker.handle_fetch(request).await);
                    });
                }
                WorkerEvent::Command(envelope) => worker.handle_command(envelope).await,
            }
        }
        debug!(worker = worker.id, "worker stopped");
    });

    WorkerHandle { id, tx }
}

/// Mailbox of a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    id: u64,
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Post a command. Delivery is asynchronous; answers arrive in the
    /// client's inbox.
    pub fn post_message(&self, command: WorkerCommand, source: Option<ClientId>) -> Result<()> {
        self.tx
            .send(WorkerEvent::Command(Envelope { command, source }))
            .map_err(|_| PromptError::WorkerUnready)
    }

    /// Route a request through the worker's fetch policy.
    pub async fn fetch(&self, request: Request) -> Result<HttpResponse> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(WorkerEvent::Fetch {
                request,
                respond_to,
            })
            .map_err(|_| PromptError::FetchFailed("cache worker stopped".into()))?;
        rx.await
            .map_err(|_| PromptError::FetchFailed("cache worker dropped the request".into()))?
    }
}

#[async_trait]
impl Transport for WorkerHandle {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.fetch(Request::get(url)).await
    }
}
