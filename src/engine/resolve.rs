// Read-through resolution of listings and documents.
// Online requests hit the network and write through; failures fall back to the store.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cache::{Content, RecencyTracker, Resource, Store};
use crate::error::{PromptError, Result};
use crate::github::{ListingItem, RemoteSource, is_document_path};
use crate::tasks::BackgroundTasks;

use super::session::Session;

/// Where resolved content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Freshly fetched.
    Network,
    /// Read from the store while offline.
    Cache,
    /// Read from the store because the fetch failed while online.
    StaleCache,
}

/// Content produced for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: String,
    pub content: Content,
    pub origin: Origin,
}

impl Resolved {
    /// Whether the caller should show a "loaded from cache" status.
    pub fn loaded_from_cache(&self) -> bool {
        self.origin == Origin::StaleCache
    }
}

/// Pending background refetch of a listing shown from cache.
#[derive(Debug)]
pub struct Revalidation {
    rx: oneshot::Receiver<Option<Vec<ListingItem>>>,
}

impl Revalidation {
    /// The fresh listing if it should replace the one on screen.
    pub async fn changed(self) -> Option<Vec<ListingItem>> {
        self.rx.await.ok().flatten()
    }
}

/// Change heuristic for listings: only the item count is compared.
/// Same count with different members is reported as unchanged.
pub fn listing_changed(cached: &[ListingItem], fresh: &[ListingItem]) -> bool {
    cached.len() != fresh.len()
}

/// Resolves paths against the store and the remote source.
pub struct ResolutionEngine {
    remote: Arc<dyn RemoteSource>,
    store: Arc<Store>,
    recent: Arc<RecencyTracker>,
    session: Arc<Session>,
    extension: String,
    writes: Arc<BackgroundTasks>,
}

impl ResolutionEngine {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        store: Arc<Store>,
        recent: Arc<RecencyTracker>,
        session: Arc<Session>,
        extension: &str,
    ) -> Self {
        Self {
            remote,
            store,
            recent,
            session,
            extension: extension.to_string(),
            writes: Arc::new(BackgroundTasks::new()),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Navigate to a path: resolve it, make it current, and record document views.
    pub async fn resolve(&self, path: &str) -> Result<Resolved> {
        self.session.set_current_path(path);
        let resolved = self.load(path).await?;

        if resolved.content.as_document().is_some() {
            let recent = self.recent.clone();
            let viewed = path.to_string();
            let recorded = tokio::task::spawn_blocking(move || recent.record(&viewed)).await;
            match recorded {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(path, error = %e, "failed to record recent view"),
                Err(e) => warn!(path, error = %e, "recent view task failed"),
            }
        }

        Ok(resolved)
    }

    /// Resolve a path without touching navigation state.
    pub async fn load(&self, path: &str) -> Result<Resolved> {
        if !self.session.is_online() {
            return match self.read_store(path).await {
                Some(content) => Ok(self.resolved(path, content, Origin::Cache)),
                None => Err(PromptError::NotAvailable(path.to_string())),
            };
        }

        let generation = self.store.generation();
        match self.fetch(path).await {
            Ok(content) => {
                self.write_through(path, content.clone(), generation);
                Ok(self.resolved(path, content, Origin::Network))
            }
            Err(e) if e.is_fetch_failure() => {
                warn!(path, error = %e, "fetch failed, falling back to cache");
                match self.read_store(path).await {
                    Some(content) => {
                        info!(path, "loaded from cache");
                        Ok(self.resolved(path, content, Origin::StaleCache))
                    }
                    None => Err(PromptError::NotAvailable(path.to_string())),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a directory and return its entries.
    pub async fn load_listing(&self, path: &str) -> Result<Vec<ListingItem>> {
        match self.load(path).await?.content {
            Content::Listing(items) => Ok(items),
            Content::Document(_) => Err(PromptError::NotAvailable(path.to_string())),
        }
    }

    /// Show a cached listing at once and refetch it in the background.
    ///
    /// Falls back to [`ResolutionEngine::resolve`] for documents, when offline,
    /// and when nothing is cached. The returned [`Revalidation`] yields the fresh
    /// listing only when [`listing_changed`] says so.
    pub async fn resolve_listing_optimistic(
        &self,
        path: &str,
    ) -> Result<(Resolved, Option<Revalidation>)> {
        if is_document_path(path, &self.extension) || !self.session.is_online() {
            return Ok((self.resolve(path).await?, None));
        }

        let cached = match self.read_store(path).await {
            Some(Content::Listing(items)) => items,
            _ => return Ok((self.resolve(path).await?, None)),
        };
        self.session.set_current_path(path);

        let (tx, rx) = oneshot::channel();
        let remote = self.remote.clone();
        let store = self.store.clone();
        let generation = store.generation();
        let key = path.to_string();
        let shown = cached.clone();
        self.writes.spawn(async move {
            let fresh = match remote.list_directory(&key).await {
                Ok(items) => items,
                Err(e) => {
                    debug!(path = %key, error = %e, "background listing refresh failed");
                    let _ = tx.send(None);
                    return;
                }
            };

            let resource = Resource::new(&key, Content::Listing(fresh.clone()));
            let written = tokio::task::spawn_blocking(move || {
                store.put_resource_if_current(&resource, generation)
            })
            .await;
            if let Ok(Err(e)) = written {
                warn!(path = %key, error = %e, "failed to cache listing");
            }

            let update = listing_changed(&shown, &fresh).then_some(fresh);
            let _ = tx.send(update);
        });

        let resolved = self.resolved(path, Content::Listing(cached), Origin::Cache);
        Ok((resolved, Some(Revalidation { rx })))
    }

    /// Wait for outstanding write-throughs and background refreshes.
    pub async fn settle(&self) {
        self.writes.settle().await;
    }

    async fn fetch(&self, path: &str) -> Result<Content> {
        if is_document_path(path, &self.extension) {
            Ok(Content::Document(self.remote.fetch_document(path).await?))
        } else {
            Ok(Content::Listing(self.remote.list_directory(path).await?))
        }
    }

    /// Store read that never fails the caller: errors count as a miss.
    async fn read_store(&self, path: &str) -> Option<Content> {
        let store = self.store.clone();
        let key = path.to_string();
        match tokio::task::spawn_blocking(move || store.get_resource(&key)).await {
            Ok(Ok(resource)) => resource.map(|r| r.content),
            Ok(Err(e)) => {
                warn!(path, error = %e, "store read failed");
                None
            }
            Err(e) => {
                warn!(path, error = %e, "store read task failed");
                None
            }
        }
    }

    /// Persist fetched content without making the caller wait.
    /// Dropped if the store was cleared after the fetch started.
    fn write_through(&self, path: &str, content: Content, generation: u64) {
        let store = self.store.clone();
        let resource = Resource::new(path, content);
        self.writes.spawn_blocking(move || {
            if let Err(e) = store.put_resource_if_current(&resource, generation) {
                warn!(path = %resource.path, error = %e, "write-through failed");
            }
        });
    }

    fn resolved(&self, path: &str, content: Content, origin: Origin) -> Resolved {
        Resolved {
            path: path.to_string(),
            content,
            origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::github::GitHubClient;
    use crate::testing::{MockTransport, contents_url, raw_url, test_config};
    use crate::worker::ClientId;

    struct Fixture {
        _temp_dir: TempDir,
        transport: Arc<MockTransport>,
        engine: ResolutionEngine,
        recent: Arc<RecencyTracker>,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        let transport = Arc::new(MockTransport::new());
        let remote = Arc::new(GitHubClient::new(transport.clone(), &config));
        let store = Arc::new(Store::open(temp_dir.path().join("store")).unwrap());
        let recent = Arc::new(RecencyTracker::new(store.clone(), config.max_recent));
        let session = Arc::new(Session::new(ClientId::from("client-1"), true));
        let engine = ResolutionEngine::new(remote, store, recent.clone(), session, ".md");
        Fixture {
            _temp_dir: temp_dir,
            transport,
            engine,
            recent,
        }
    }

    fn three_items() -> serde_json::Value {
        json!([
            {"name": "a", "path": "a", "type": "dir"},
            {"name": "b.md", "path": "b.md", "type": "file"},
            {"name": "c.md", "path": "c.md", "type": "file"}
        ])
    }

    #[tokio::test]
    async fn test_offline_miss_is_not_available() {
        let f = fixture();
        f.engine.session().set_online(false);

        for path in ["", "never/seen", "never/seen.md"] {
            let err = f.engine.resolve(path).await.unwrap_err();
            assert!(matches!(err, PromptError::NotAvailable(_)));
        }
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_online_fetch_then_offline_round_trip() {
        let f = fixture();
        f.transport.route_json(&contents_url(""), three_items());
        f.transport.route_text(&raw_url("b.md"), "# B");

        let root = f.engine.resolve("").await.unwrap();
        let doc = f.engine.resolve("b.md").await.unwrap();
        assert_eq!(root.origin, Origin::Network);
        assert_eq!(doc.content, Content::Document("# B".into()));
        f.engine.settle().await;

        f.engine.session().set_online(false);
        let cached_root = f.engine.resolve("").await.unwrap();
        let cached_doc = f.engine.resolve("b.md").await.unwrap();
        assert_eq!(cached_root.origin, Origin::Cache);
        assert_eq!(cached_root.content, root.content);
        assert_eq!(cached_doc.content, doc.content);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_stale_cache() {
        let f = fixture();
        f.transport.route_text(&raw_url("b.md"), "# B v1");
        f.engine.resolve("b.md").await.unwrap();
        f.engine.settle().await;

        f.transport.set_offline(true);
        let resolved = f.engine.resolve("b.md").await.unwrap();
        assert_eq!(resolved.origin, Origin::StaleCache);
        assert!(resolved.loaded_from_cache());
        assert_eq!(resolved.content.as_document(), Some("# B v1"));
    }

    #[tokio::test]
    async fn test_fetch_failure_without_cache_is_not_available() {
        let f = fixture();
        // Unrouted URLs answer 404
        let err = f.engine.resolve("missing.md").await.unwrap_err();
        assert!(matches!(err, PromptError::NotAvailable(p) if p == "missing.md"));
    }

    #[tokio::test]
    async fn test_branch_decided_by_path() {
        let f = fixture();
        f.transport.route_json(&contents_url("notes.txt"), json!([]));
        f.transport.route_text(&raw_url("x.md"), "# X");

        let listing = f.engine.resolve("notes.txt").await.unwrap();
        assert_eq!(listing.content, Content::Listing(Vec::new()));
        f.engine.resolve("x.md").await.unwrap();

        assert_eq!(
            f.transport.calls(),
            vec![contents_url("notes.txt"), raw_url("x.md")]
        );
    }

    #[tokio::test]
    async fn test_documents_recorded_as_recent() {
        let f = fixture();
        f.transport.route_json(&contents_url(""), three_items());
        f.transport.route_text(&raw_url("b.md"), "# B");
        f.transport.route_text(&raw_url("c.md"), "# C");

        f.engine.resolve("").await.unwrap();
        f.engine.resolve("b.md").await.unwrap();
        f.engine.resolve("c.md").await.unwrap();
        let _ = f.engine.resolve("gone.md").await;

        let recent: Vec<String> = f.recent.list().unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(recent, vec!["c.md", "b.md"]);
        assert_eq!(f.engine.session().current_path(), "gone.md");
    }

    #[tokio::test]
    async fn test_last_response_wins() {
        let f = fixture();
        let url = raw_url("race.md");
        f.transport.route_text(&url, "slow");
        f.transport.delay(&url, Duration::from_millis(50));

        // The slow request starts first and its response lands last
        let slow = f.engine.load("race.md");
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.transport.route_text(&url, "fast");
            f.transport.delay(&url, Duration::ZERO);
            f.engine.load("race.md").await
        };
        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(fast.unwrap().content.as_document(), Some("fast"));
        // The slow fetch read its route before the switch
        assert_eq!(slow.unwrap().origin, Origin::Network);
        f.engine.settle().await;

        let stored = f.engine.store().get_resource("race.md").unwrap().unwrap();
        assert_eq!(stored.content.as_document(), Some("slow"));
    }

    #[tokio::test]
    async fn test_optimistic_listing_same_count_not_rerendered() {
        let f = fixture();
        f.transport.route_json(&contents_url(""), three_items());
        f.engine.resolve("").await.unwrap();
        f.engine.settle().await;

        f.transport.route_json(
            &contents_url(""),
            json!([
                {"name": "x", "path": "x", "type": "dir"},
                {"name": "y.md", "path": "y.md", "type": "file"},
                {"name": "z.md", "path": "z.md", "type": "file"}
            ]),
        );
        let (shown, revalidation) = f.engine.resolve_listing_optimistic("").await.unwrap();
        assert_eq!(shown.origin, Origin::Cache);
        assert_eq!(shown.content.as_listing().unwrap()[0].name, "a");
        assert!(revalidation.unwrap().changed().await.is_none());
    }

    #[tokio::test]
    async fn test_optimistic_listing_count_change_rerenders() {
        let f = fixture();
        f.transport.route_json(&contents_url(""), three_items());
        f.engine.resolve("").await.unwrap();
        f.engine.settle().await;

        f.transport.route_json(
            &contents_url(""),
            json!([
                {"name": "a", "path": "a", "type": "dir"},
                {"name": "b.md", "path": "b.md", "type": "file"},
                {"name": "c.md", "path": "c.md", "type": "file"},
                {"name": "d.md", "path": "d.md", "type": "file"}
            ]),
        );
        let (_, revalidation) = f.engine.resolve_listing_optimistic("").await.unwrap();
        let fresh = revalidation.unwrap().changed().await.unwrap();
        assert_eq!(fresh.len(), 4);

        f.engine.settle().await;
        let stored = f.engine.store().get_resource("").unwrap().unwrap();
        assert_eq!(stored.content.as_listing().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_optimistic_listing_without_cache_fetches() {
        let f = fixture();
        f.transport.route_json(&contents_url(""), three_items());

        let (shown, revalidation) = f.engine.resolve_listing_optimistic("").await.unwrap();
        assert_eq!(shown.origin, Origin::Network);
        assert!(revalidation.is_none());
    }

    #[tokio::test]
    async fn test_background_listing_refresh_does_not_undo_clear() {
        let f = fixture();
        f.transport.route_json(&contents_url(""), three_items());
        f.engine.resolve("").await.unwrap();
        f.engine.settle().await;

        f.transport.delay(&contents_url(""), Duration::from_millis(50));
        let (shown, _) = f.engine.resolve_listing_optimistic("").await.unwrap();
        assert_eq!(shown.origin, Origin::Cache);

        f.engine.store().clear().unwrap();
        f.engine.settle().await;
        assert!(f.engine.store().get_resource("").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_landing_after_clear_is_not_cached() {
        let f = fixture();
        let url = raw_url("late.md");
        f.transport.route_text(&url, "# Late");
        f.transport.delay(&url, Duration::from_millis(50));

        let load = f.engine.load("late.md");
        let clear = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.engine.store().clear().unwrap();
        };
        let (loaded, ()) = tokio::join!(load, clear);
        assert_eq!(loaded.unwrap().origin, Origin::Network);

        f.engine.settle().await;
        assert!(f.engine.store().get_resource("late.md").unwrap().is_none());
    }

    #[test]
    fn test_listing_changed_counts_only() {
        let a = vec![ListingItem::file("a.md", "a.md")];
        let b = vec![ListingItem::file("b.md", "b.md")];
        assert!(!listing_changed(&a, &b));
        assert!(listing_changed(&a, &[]));
    }
}
