//! In-memory storage backend
//!
//! Keeps the serialized tree in a shared buffer. Clones share the same
//! buffer, so a test can hand one clone to a `Store` and inspect what was
//! persisted through another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{StorageBackend, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Slots {
    document: Option<String>,
    quarantined: Option<String>,
    saves: usize,
    fail_writes: bool,
}

/// Storage backend for testing logic without filesystem I/O
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slots: Arc<Mutex<Slots>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds `contents`
    pub fn with_contents(contents: impl Into<String>) -> Self {
        let backend = Self::default();
        backend.slots().document = Some(contents.into());
        backend
    }

    /// What was last persisted
    pub fn contents(&self) -> Option<String> {
        self.slots().document.clone()
    }

    /// What `quarantine` set aside, if anything
    pub fn quarantined(&self) -> Option<String> {
        self.slots().quarantined.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.slots().saves
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_fail_writes(&self, fail: bool) {
        self.slots().fail_writes = fail;
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Option<String>> {
        Ok(self.slots().document.clone())
    }

    fn save(&self, contents: &str) -> StoreResult<()> {
        let mut slots = self.slots();
        if slots.fail_writes {
            return Err(StoreError::Backend("Simulated write error".to_string()));
        }
        slots.document = Some(contents.to_string());
        slots.saves += 1;
        Ok(())
    }

    fn quarantine(&self) -> StoreResult<Option<String>> {
        let mut slots = self.slots();
        match slots.document.take() {
            Some(old) => {
                slots.quarantined = Some(old);
                Ok(Some("memory://quarantine".to_string()))
            }
            None => Ok(None),
        }
    }

    fn location(&self) -> String {
        "memory://classbook".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();

        backend.save("{}").unwrap();
        assert_eq!(observer.contents().as_deref(), Some("{}"));
        assert_eq!(observer.save_count(), 1);
    }

    #[test]
    fn test_simulated_write_error() {
        let backend = MemoryBackend::with_contents("{\"a\": 1}");
        backend.set_fail_writes(true);

        assert!(matches!(backend.save("{}"), Err(StoreError::Backend(_))));
        assert_eq!(backend.contents().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_quarantine() {
        let backend = MemoryBackend::with_contents("garbage");
        assert!(backend.quarantine().unwrap().is_some());
        assert!(backend.load().unwrap().is_none());
        assert_eq!(backend.quarantined().as_deref(), Some("garbage"));
        assert!(backend.quarantine().unwrap().is_none());
    }
}
