// Worker lifecycle: install, wait, activate, control.
// At most one worker controls fetches; a newer one waits until told to skip waiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{PromptError, Result};
use crate::net::{HttpResponse, Transport};

use super::clients::{ClientConnection, Clients};
use super::messages::WorkerCommand;
use super::service::{self, CacheWorker, WorkerHandle, WorkerSettings};
use super::storage::CacheStorage;

/// Where a freshly registered worker ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Active,
    Waiting,
}

struct Slot {
    worker: Arc<CacheWorker>,
    handle: WorkerHandle,
}

pub struct RegistrationInner {
    clients: Arc<Clients>,
    active: Mutex<Option<Arc<Slot>>>,
    waiting: Mutex<Option<Arc<Slot>>>,
    next_id: AtomicU64,
}

impl RegistrationInner {
    /// Turn the waiting worker `id` into the controller.
    pub(crate) async fn promote(&self, id: u64) -> Result<()> {
        let slot = {
            let mut waiting = lock(&self.waiting);
            let matches = waiting.as_ref().is_some_and(|slot| slot.worker.id() == id);
            if matches { waiting.take() } else { None }
        };
        let Some(slot) = slot else {
            debug!(worker = id, "not waiting, nothing to promote");
            return Ok(());
        };
        self.make_active(slot).await
    }

    async fn make_active(&self, slot: Arc<Slot>) -> Result<()> {
        let id = slot.worker.id();
        let previous = lock(&self.active).replace(slot.clone());
        if let Some(previous) = previous {
            debug!(old = previous.worker.id(), new = id, "replacing controller");
        }
        slot.worker.activate().await
    }
}

/// Owns the cache worker lifecycle for one application.
#[derive(Clone)]
pub struct Registration {
    inner: Arc<RegistrationInner>,
}

impl Default for Registration {
    fn default() -> Self {
        Self::new()
    }
}

impl Registration {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistrationInner {
                clients: Arc::new(Clients::new()),
                active: Mutex::new(None),
                waiting: Mutex::new(None),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a new foreground client.
    pub fn connect(&self) -> ClientConnection {
        self.inner.clients.connect()
    }

    /// Install a new worker. It activates right away when nothing controls
    /// fetches yet and waits otherwise.
    pub async fn register(
        &self,
        settings: WorkerSettings,
        network: Arc<dyn Transport>,
        storage: Arc<CacheStorage>,
    ) -> Result<WorkerState> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let worker = Arc::new(CacheWorker::new(
            id,
            settings,
            network,
            storage,
            self.inner.clients.clone(),
            Arc::downgrade(&self.inner),
        ));
        worker.install().await?;

        let handle = service::spawn(worker.clone());
        let slot = Arc::new(Slot { worker, handle });

        let controlled = lock(&self.inner.active).is_some();
        if !controlled {
            self.inner.make_active(slot).await?;
            info!(worker = id, "worker is controlling");
            return Ok(WorkerState::Active);
        }

        if let Some(redundant) = lock(&self.inner.waiting).replace(slot) {
            debug!(worker = redundant.worker.id(), "discarding older waiting worker");
        }
        info!(worker = id, "worker installed and waiting");
        Ok(WorkerState::Waiting)
    }

    /// Mailbox of the controlling worker.
    pub fn controller(&self) -> Result<WorkerHandle> {
        lock(&self.inner.active)
            .as_ref()
            .map(|slot| slot.handle.clone())
            .ok_or(PromptError::WorkerUnready)
    }

    pub fn waiting(&self) -> Option<WorkerHandle> {
        lock(&self.inner.waiting)
            .as_ref()
            .map(|slot| slot.handle.clone())
    }

    /// Ask the waiting worker to take over.
    pub fn skip_waiting(&self) -> Result<()> {
        let handle = self.waiting().ok_or(PromptError::WorkerUnready)?;
        handle.post_message(WorkerCommand::SkipWaiting, None)
    }

    /// Wait for the controller's background cache writes.
    pub async fn settle(&self) {
        let active = lock(&self.inner.active).clone();
        if let Some(slot) = active {
            slot.worker.settle().await;
        }
    }

    /// Stop every worker. Later messages fail with `WorkerUnready`.
    pub async fn shutdown(&self) {
        let waiting = lock(&self.inner.waiting).take();
        let active = lock(&self.inner.active).take();
        for slot in waiting.into_iter().chain(active) {
            slot.worker.settle().await;
            debug!(worker = slot.worker.id(), "worker shut down");
        }
    }
}

/// Sends requests through the controlling worker, or straight to the
/// network while no worker controls.
pub struct ControlledTransport {
    registration: Registration,
    network: Arc<dyn Transport>,
}

impl ControlledTransport {
    pub fn new(registration: Registration, network: Arc<dyn Transport>) -> Self {
        Self {
            registration,
            network,
        }
    }
}

#[async_trait]
impl Transport for ControlledTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        match self.registration.controller() {
            Ok(handle) => handle.get(url).await,
            Err(_) => self.network.get(url).await,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
