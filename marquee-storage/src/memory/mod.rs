//! In-process adapters for every gateway.
//!
//! These back the local binary and the test suites. They honour the same
//! contracts as production adapters.

mod cache;
mod index;
mod queue;
mod store;

pub use cache::InMemoryCache;
pub use index::InMemorySearchIndex;
pub use queue::{InMemoryTaskQueue, QueueStats};
pub use store::InMemoryPrimaryStore;
