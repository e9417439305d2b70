//! Task store backends.

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::FileTaskStore;
pub use memory::InMemoryTaskStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTaskStore;
