//! Infrastructure adapters for the shared task collection.

pub mod store;

pub use store::{FileTaskStore, InMemoryTaskStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteTaskStore;
