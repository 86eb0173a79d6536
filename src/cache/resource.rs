// Cached resource model.
// A directory listing or a document body, stored under its path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::{ListingItem, is_document_path};

/// Body of a cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Listing(Vec<ListingItem>),
    Document(String),
}

impl Content {
    pub fn as_listing(&self) -> Option<&[ListingItem]> {
        match self {
            Content::Listing(items) => Some(items),
            Content::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&str> {
        match self {
            Content::Document(text) => Some(text),
            Content::Listing(_) => None,
        }
    }
}

/// A cached entity, at most one per path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Empty for the root directory.
    pub path: String,
    pub content: Content,
    /// When the resource was fetched.
    pub timestamp: DateTime<Utc>,
}

impl Resource {
    pub fn new(path: &str, content: Content) -> Self {
        Self {
            path: path.to_string(),
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn is_directory(&self, extension: &str) -> bool {
        !is_document_path(&self.path, extension)
    }
}
