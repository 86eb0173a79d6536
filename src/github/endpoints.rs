// GitHub endpoint functions.
// The two reads the cache layer needs: directory listings and raw documents.

use async_trait::async_trait;

use crate::error::Result;

use super::client::GitHubClient;
use super::types::ListingItem;

/// Read-only access to the remote document tree.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// List the children of a directory ("" is the root).
    async fn list_directory(&self, path: &str) -> Result<Vec<ListingItem>>;

    /// Fetch the raw text of a document.
    async fn fetch_document(&self, path: &str) -> Result<String>;
}

#[async_trait]
impl RemoteSource for GitHubClient {
    async fn list_directory(&self, path: &str) -> Result<Vec<ListingItem>> {
        let response = self.get(&self.contents_url(path)).await?;
        let items: Vec<ListingItem> = serde_json::from_str(&response.body)?;
        Ok(items)
    }

    async fn fetch_document(&self, path: &str) -> Result<String> {
        let response = self.get(&self.raw_url(path)).await?;
        Ok(response.body)
    }
}
