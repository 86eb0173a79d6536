pub mod clients;
pub mod messages;
pub mod policy;
pub mod registration;
pub mod service;
pub mod storage;

pub use clients::{ClientConnection, Clients};
pub use messages::{ClientId, Envelope, WorkerCommand, WorkerReply};
pub use policy::{FetchPolicy, PolicyRules, Request};
pub use registration::{ControlledTransport, Registration, WorkerState};
pub use service::{PROMPT_CACHE, SHELL_CACHE, WorkerHandle, WorkerSettings};
pub use storage::CacheStorage;
