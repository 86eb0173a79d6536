// Foreground session state.
// Connectivity, the current path and this client's identity.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::worker::ClientId;

/// Created at startup, updated on connectivity changes, dropped at shutdown.
#[derive(Debug)]
pub struct Session {
    online: AtomicBool,
    current_path: Mutex<String>,
    client_id: ClientId,
}

impl Session {
    pub fn new(client_id: ClientId, online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            current_path: Mutex::new(String::new()),
            client_id,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a connectivity change. Returns the previous state.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!(online, "connectivity changed");
        }
        previous
    }

    pub fn current_path(&self) -> String {
        self.lock_path().clone()
    }

    pub fn set_current_path(&self, path: &str) {
        *self.lock_path() = path.to_string();
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn lock_path(&self) -> std::sync::MutexGuard<'_, String> {
        self.current_path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
