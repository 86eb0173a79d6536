// Bulk enumeration of every document in the remote tree.
// Feeds the cache worker's prime-all request.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, join_all};
use tracing::{debug, info, warn};

use crate::engine::ResolutionEngine;

/// Walks the tree below a root and collects document paths.
pub struct Primer {
    engine: Arc<ResolutionEngine>,
}

impl Primer {
    pub fn new(engine: Arc<ResolutionEngine>) -> Self {
        Self { engine }
    }

    /// Every document below `root`, grouped by directory in listing order.
    ///
    /// Subdirectories are resolved concurrently. A subtree that is neither
    /// fetchable nor cached is skipped; its siblings are still collected.
    pub async fn collect_all_documents(&self, root: &str) -> Vec<String> {
        let documents = self.walk(root.to_string()).await;
        info!(root, count = documents.len(), "collected documents");
        documents
    }

    fn walk(&self, path: String) -> BoxFuture<'_, Vec<String>> {
        async move {
            let items = match self.engine.load_listing(&path).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping unreachable directory");
                    return Vec::new();
                }
            };
            debug!(path = %path, entries = items.len(), "listed directory");

            let subtrees = items
                .iter()
                .filter(|item| item.is_navigable())
                .map(|item| self.walk(item.path.clone()));
            let mut nested = join_all(subtrees).await.into_iter();

            let extension = self.engine.extension();
            let mut documents = Vec::new();
            for item in &items {
                if item.is_navigable() {
                    documents.extend(nested.next().unwrap_or_default());
                } else if item.is_document(extension) {
                    documents.push(item.path.clone());
                }
            }
            documents
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::cache::{RecencyTracker, Store};
    use crate::engine::Session;
    use crate::github::GitHubClient;
    use crate::testing::{MockTransport, contents_url, test_config};
    use crate::worker::ClientId;

    fn primer(temp_dir: &TempDir, transport: Arc<MockTransport>) -> (Primer, Arc<ResolutionEngine>) {
        let config = test_config(temp_dir.path());
        let remote = Arc::new(GitHubClient::new(transport, &config));
        let store = Arc::new(Store::open(temp_dir.path().join("store")).unwrap());
        let recent = Arc::new(RecencyTracker::new(store.clone(), config.max_recent));
        let session = Arc::new(Session::new(ClientId::from("client-1"), true));
        let engine = Arc::new(ResolutionEngine::new(remote, store, recent, session, ".md"));
        (Primer::new(engine.clone()), engine)
    }

    fn route_tree(transport: &MockTransport) {
        transport.route_json(
            &contents_url(""),
            json!([
                {"name": "alpha", "path": "alpha", "type": "dir"},
                {"name": "top.md", "path": "top.md", "type": "file"},
                {"name": "beta", "path": "beta", "type": "dir"},
                {"name": "LICENSE", "path": "LICENSE", "type": "file"}
            ]),
        );
        transport.route_json(
            &contents_url("alpha"),
            json!([
                {"name": "a1.md", "path": "alpha/a1.md", "type": "file"},
                {"name": "deep", "path": "alpha/deep", "type": "dir"}
            ]),
        );
        transport.route_json(
            &contents_url("alpha/deep"),
            json!([{"name": "d.md", "path": "alpha/deep/d.md", "type": "file"}]),
        );
        transport.route_json(
            &contents_url("beta"),
            json!([{"name": "b1.md", "path": "beta/b1.md", "type": "file"}]),
        );
    }

    #[tokio::test]
    async fn test_collects_in_listing_order() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        route_tree(&transport);
        // Finish alpha last so completion order differs from listing order
        transport.delay(&contents_url("alpha"), Duration::from_millis(30));
        let (primer, _) = primer(&temp_dir, transport);

        let documents = primer.collect_all_documents("").await;
        assert_eq!(
            documents,
            vec!["alpha/a1.md", "alpha/deep/d.md", "top.md", "beta/b1.md"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_subtree_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        route_tree(&transport);
        transport.break_url(&contents_url("alpha"));
        let (primer, _) = primer(&temp_dir, transport);

        let documents = primer.collect_all_documents("").await;
        assert_eq!(documents, vec!["top.md", "beta/b1.md"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_cached_listings() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        route_tree(&transport);
        let (primer, engine) = primer(&temp_dir, transport.clone());

        let online = primer.collect_all_documents("").await;
        engine.settle().await;

        // Network gone: every listing comes from the store
        transport.set_offline(true);
        assert_eq!(primer.collect_all_documents("").await, online);

        // Explicitly offline: the store is the only source
        engine.session().set_online(false);
        assert_eq!(primer.collect_all_documents("").await, online);
    }

    #[tokio::test]
    async fn test_unreachable_root_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.set_offline(true);
        let (primer, _) = primer(&temp_dir, transport);

        assert!(primer.collect_all_documents("").await.is_empty());
    }
}
