// Foreground clients connected to the cache worker.
// Replies are delivered through one unbounded mailbox per client.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use super::messages::{ClientId, WorkerReply};

/// Every client that can receive replies.
#[derive(Debug, Default)]
pub struct Clients {
    senders: Mutex<HashMap<ClientId, mpsc::UnboundedSender<WorkerReply>>>,
    next_id: AtomicU64,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and hand back its end of the mailbox.
    pub fn connect(&self) -> ClientConnection {
        let id = ClientId::from(format!(
            "client-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id.clone(), tx);
        debug!(client = %id, "client connected");

        ClientConnection {
            id,
            inbox: rx,
            update_available: false,
        }
    }

    /// Deliver a reply to one client. Returns false if it is gone.
    pub fn post(&self, id: &ClientId, reply: WorkerReply) -> bool {
        let mut senders = self.lock();
        let Some(tx) = senders.get(id) else {
            return false;
        };
        if tx.send(reply).is_ok() {
            return true;
        }
        senders.remove(id);
        false
    }

    /// Deliver a reply to every client. Returns how many received it.
    pub fn broadcast(&self, reply: WorkerReply) -> usize {
        let mut senders = self.lock();
        senders.retain(|_, tx| tx.send(reply.clone()).is_ok());
        senders.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientId, mpsc::UnboundedSender<WorkerReply>>> {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A client's identity and inbox.
#[derive(Debug)]
pub struct ClientConnection {
    id: ClientId,
    inbox: mpsc::UnboundedReceiver<WorkerReply>,
    update_available: bool,
}

impl ClientConnection {
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Whether a `swUpdated` notification has been seen.
    pub fn update_available(&self) -> bool {
        self.update_available
    }

    /// Next reply, in arrival order.
    pub async fn next(&mut self) -> Option<WorkerReply> {
        let reply = self.inbox.recv().await;
        if reply == Some(WorkerReply::SwUpdated) {
            self.update_available = true;
        }
        reply
    }

    /// Wait for the first reply accepted by `wanted`, discarding others.
    pub async fn wait_for(&mut self, wanted: impl Fn(&WorkerReply) -> bool) -> Option<WorkerReply> {
        while let Some(reply) = self.next().await {
            if wanted(&reply) {
                return Some(reply);
            }
            debug!(client = %self.id, ?reply, "skipping unrelated reply");
        }
        None
    }
}
