// GitHub API module.
// Contents API and raw-content endpoints for a single repository.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{GitHubClient, RepoRef};
pub use endpoints::RemoteSource;
pub use types::*;
