//! Offline-first viewer cache for Markdown prompts kept in a GitHub repository.
//!
//! Directory listings and documents are resolved through [`engine::ResolutionEngine`],
//! which reads through to a local [`cache::Store`]. A background [`worker`] intercepts
//! every request and keeps its own URL-keyed cache of primed documents.

pub mod app;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod github;
pub mod net;
pub mod primer;
pub mod status;
pub mod tasks;
pub mod worker;

#[cfg(test)]
mod testing;

pub use app::App;
pub use config::AppConfig;
pub use error::{PromptError, Result};
