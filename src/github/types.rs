// GitHub contents API types.
// Listing entries and the path rules that decide directory vs document.

use serde::{Deserialize, Serialize};

/// Entry type reported by the contents API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Dir,
    File,
    /// Symlinks, submodules and anything else.
    #[serde(other)]
    Other,
}

/// One child of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

impl ListingItem {
    pub fn dir(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            item_type: ItemType::Dir,
        }
    }

    pub fn file(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            item_type: ItemType::File,
        }
    }

    /// Directories can be navigated into.
    pub fn is_navigable(&self) -> bool {
        self.item_type == ItemType::Dir
    }

    /// Files are only actionable when they carry the document extension.
    pub fn is_document(&self, extension: &str) -> bool {
        self.item_type == ItemType::File && self.name.ends_with(extension)
    }
}

/// Whether a path names a leaf document. Decided from the path string alone.
pub fn is_document_path(path: &str, extension: &str) -> bool {
    !path.is_empty() && path.ends_with(extension)
}

/// Display name of a path: its final segment.
pub fn display_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Sort for display: directories first, then files, each by name.
pub fn sort_listing(items: &mut [ListingItem]) {
    items.sort_by(|a, b| match (a.is_navigable(), b.is_navigable()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_contents_response() {
        let json = r#"[
            {"name": "coding", "path": "coding", "type": "dir", "sha": "abc"},
            {"name": "intro.md", "path": "intro.md", "type": "file", "size": 12},
            {"name": "vendor", "path": "vendor", "type": "submodule"}
        ]"#;
        let items: Vec<ListingItem> = serde_json::from_str(json).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0], ListingItem::dir("coding", "coding"));
        assert_eq!(items[1], ListingItem::file("intro.md", "intro.md"));
        assert_eq!(items[2].item_type, ItemType::Other);
        assert!(!items[2].is_navigable());
        assert!(!items[2].is_document(".md"));
    }

    #[test]
    fn test_is_document_path() {
        assert!(is_document_path("a/b/c.md", ".md"));
        assert!(!is_document_path("", ".md"));
        assert!(!is_document_path("a/b", ".md"));
        assert!(!is_document_path("notes.txt", ".md"));
    }

    #[test]
    fn test_document_requires_file_type() {
        assert!(ListingItem::file("a.md", "x/a.md").is_document(".md"));
        assert!(!ListingItem::file("a.txt", "x/a.txt").is_document(".md"));
        assert!(!ListingItem::dir("odd.md", "odd.md").is_document(".md"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("tools/git/rebase.md"), "rebase.md");
        assert_eq!(display_name("top.md"), "top.md");
    }

    #[test]
    fn test_sort_listing_dirs_first() {
        let mut items = vec![
            ListingItem::file("b.md", "b.md"),
            ListingItem::dir("zeta", "zeta"),
            ListingItem::file("a.md", "a.md"),
            ListingItem::dir("alpha", "alpha"),
        ];
        sort_listing(&mut items);

        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta", "a.md", "b.md"]);
    }
}
