//! Storage layer
//!
//! Handles persistence of the serialized document tree.
//!
//! ## Architecture
//!
//! - **Store** (`crate::store`): owns the in-memory tree and decides when
//!   to persist
//! - **StorageBackend**: moves the serialized tree to and from durable
//!   storage, with no knowledge of its contents
//!
//! Two backends ship with the crate: [`FileBackend`] for a single JSON file
//! written atomically, and [`MemoryBackend`] for tests.

pub mod error;
pub mod memory;
pub mod persistence;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use persistence::FileBackend;

/// Raw I/O for the serialized tree.
///
/// Implementations must be safe to share between threads; the store
/// serializes all calls behind its own lock.
pub trait StorageBackend: Send + Sync {
    /// Read the stored document.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet.
    fn load(&self) -> StoreResult<Option<String>>;

    /// Replace the stored document.
    ///
    /// Must never leave a partially written document behind.
    fn save(&self, contents: &str) -> StoreResult<()>;

    /// Move an unreadable document out of the way.
    ///
    /// Returns a description of where the old contents went, or `None` if
    /// there was nothing to move.
    fn quarantine(&self) -> StoreResult<Option<String>>;

    /// Human-readable location, for logs and status output
    fn location(&self) -> String;
}
