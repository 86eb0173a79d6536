// Cache module for the persisted local store.
// Holds fetched resources and the recently viewed list for offline access.

pub mod paths;
pub mod recent;
pub mod resource;
pub mod store;

pub use recent::{RecencyTracker, RecentEntry};
pub use resource::{Content, Resource};
pub use store::{PROMPTS, RECENTLY_VIEWED, Record, SCHEMA_VERSION, Store};
