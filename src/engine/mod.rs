// Resolution engine module.
// Decides per request whether to serve from the store, the network, or both.

pub mod resolve;
pub mod session;

pub use resolve::{Origin, ResolutionEngine, Resolved, Revalidation, listing_changed};
pub use session::Session;
