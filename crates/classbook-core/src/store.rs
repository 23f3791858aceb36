//! Unified storage interface
//!
//! The `Store` owns the document tree and coordinates between:
//! - the in-memory tree (source of truth while running)
//! - a `StorageBackend` (durable copy of the whole tree)
//!
//! ## Locking and persistence
//!
//! One mutex guards the tree and its persisted mirror, so operations never
//! interleave. Every mutation writes the full tree before returning. Callers
//! issuing many mutations at once use [`Store::batch`], which holds the lock
//! for the whole closure and persists once at the end.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open(&config)?;
//!
//! store.put("school_years/2025_2026/name", json!("2025/2026"))?;
//! let key = store.push("grades/2025_2026/winter/math/u1")?;
//!
//! let years = store.children("school_years");
//! ```

use std::fmt;
use std::io::{Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::access::TreeAccess;
use crate::config::Config;
use crate::document::{self, PathConflictPolicy};
use crate::path;
use crate::schema;
use crate::storage::{FileBackend, MemoryBackend, StorageBackend, StoreResult};

/// Options controlling store behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// What a write does when an intermediate segment is not an object
    pub path_conflict: PathConflictPolicy,
    /// Set an unreadable document aside before replacing it
    pub backup_corrupt: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path_conflict: PathConflictPolicy::Overwrite,
            backup_corrupt: true,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            path_conflict: config.path_conflict,
            backup_corrupt: config.backup_corrupt,
        }
    }
}

/// How the tree was obtained when the store was opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// An existing document was read
    Loaded,
    /// No document existed; a default tree was created
    Created,
    /// The stored document was unreadable and was replaced by a default tree
    Recovered {
        /// Why the document could not be used
        reason: String,
        /// Where the unreadable document was moved, if it was kept
        backup: Option<String>,
    },
}

impl LoadOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, LoadOutcome::Recovered { .. })
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Loaded => f.write_str("loaded"),
            LoadOutcome::Created => f.write_str("created"),
            LoadOutcome::Recovered { reason, backup } => {
                write!(f, "recovered from unreadable document ({})", reason)?;
                if let Some(backup) = backup {
                    write!(f, ", backup at {}", backup)?;
                }
                Ok(())
            }
        }
    }
}

/// Path-addressed document store
///
/// Create one per process and share it by reference (or `Arc`).
pub struct Store {
    tree: Mutex<Value>,
    backend: Box<dyn StorageBackend>,
    options: StoreOptions,
    outcome: LoadOutcome,
}

impl Store {
    /// Open the file-backed store described by the configuration
    ///
    /// On first run a default tree is created and saved. An unreadable
    /// document does not fail the open; see [`Store::load_outcome`].
    pub fn open(config: &Config) -> StoreResult<Self> {
        Self::with_backend(FileBackend::from_config(config), StoreOptions::from(config))
    }

    /// Open a store with nothing behind it but memory
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_backend(MemoryBackend::new(), StoreOptions::default())
    }

    /// Open a store on an arbitrary backend
    pub fn with_backend(
        backend: impl StorageBackend + 'static,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let (tree, outcome) = load_tree(&backend, &options)?;

        Ok(Self {
            tree: Mutex::new(tree),
            backend: Box::new(backend),
            options,
            outcome,
        })
    }

    /// How the tree was obtained when this store was opened
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.outcome
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Where the tree is persisted
    pub fn location(&self) -> String {
        self.backend.location()
    }

    // ==================== Reads ====================

    /// Clone of the node at `path`
    pub fn read(&self, path: &str) -> Option<Value> {
        let segments = path::parse(path);
        let tree = self.lock();
        document::resolve(&tree, &segments).cloned()
    }

    /// Whether `path` holds any non-null value
    pub fn exists(&self, path: &str) -> bool {
        let segments = path::parse(path);
        let tree = self.lock();
        document::resolve(&tree, &segments).is_some()
    }

    /// Ordered child keys of the object at `path`
    pub fn children(&self, path: &str) -> Vec<String> {
        let segments = path::parse(path);
        let tree = self.lock();
        document::child_keys(&tree, &segments)
    }

    // ==================== Writes ====================

    /// Set the value at `path` and persist
    pub fn put(&self, path: &str, value: impl Into<Value>) -> StoreResult<()> {
        let segments = path::parse(path);
        let mut tree = self.lock();
        document::insert(&mut tree, &segments, value.into(), self.options.path_conflict)?;
        self.persist(&tree)
    }

    /// Delete the value at `path` and persist
    pub fn remove(&self, path: &str) -> StoreResult<()> {
        let segments = path::parse(path);
        let mut tree = self.lock();
        document::delete(&mut tree, &segments);
        self.persist(&tree)
    }

    /// Create an empty object under a fresh key at `path` and persist
    pub fn push(&self, path: &str) -> StoreResult<String> {
        let key = document::new_push_key();
        let mut segments = path::parse(path);
        segments.push(key.clone());

        let mut tree = self.lock();
        document::insert(
            &mut tree,
            &segments,
            Value::Object(Map::new()),
            self.options.path_conflict,
        )?;
        self.persist(&tree)?;
        Ok(key)
    }

    /// Run several operations under one lock and persist once.
    ///
    /// If the closure fails, the tree is rolled back to its state before
    /// the batch and nothing is persisted. If persisting fails, the tree is
    /// rolled back as well.
    pub fn batch<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Batch<'_>) -> StoreResult<T>,
    {
        let mut tree = self.lock();
        let snapshot = tree.clone();

        let mut batch = Batch {
            tree: &mut *tree,
            policy: self.options.path_conflict,
            dirty: false,
        };
        let result = f(&mut batch);
        let dirty = batch.dirty;

        match result {
            Ok(value) => {
                if dirty {
                    if let Err(e) = self.persist(&tree) {
                        *tree = snapshot;
                        return Err(e);
                    }
                }
                Ok(value)
            }
            Err(e) => {
                if dirty {
                    debug!("Batch failed, rolling back: {}", e);
                    *tree = snapshot;
                }
                Err(e)
            }
        }
    }

    // ==================== Export / Import ====================

    /// Write the whole tree as pretty-printed JSON
    pub fn export_to<W: Write>(&self, writer: W) -> StoreResult<()> {
        let tree = self.lock();
        serde_json::to_writer_pretty(writer, &*tree)?;
        Ok(())
    }

    /// The whole tree as pretty-printed JSON
    pub fn export_json(&self) -> StoreResult<String> {
        let tree = self.lock();
        Ok(serde_json::to_string_pretty(&*tree)?)
    }

    /// Replace the whole tree with the given JSON and persist.
    ///
    /// The input is parsed before anything changes, so invalid input leaves
    /// both the tree and the persisted copy untouched.
    pub fn import_json(&self, json: &str) -> StoreResult<()> {
        let incoming = document::parse_tree(json)?;

        let mut tree = self.lock();
        let previous = std::mem::replace(&mut *tree, incoming);
        if let Err(e) = self.persist(&tree) {
            *tree = previous;
            return Err(e);
        }

        info!("Imported document into {}", self.backend.location());
        Ok(())
    }

    /// Read JSON from `reader` and replace the whole tree with it
    pub fn import_from<R: Read>(&self, mut reader: R) -> StoreResult<()> {
        let mut json = String::new();
        reader.read_to_string(&mut json)?;
        self.import_json(&json)
    }

    // ==================== Internals ====================

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, tree: &Value) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(tree)?;
        self.backend.save(&json)?;
        debug!(
            "Persisted document to {} ({} bytes)",
            self.backend.location(),
            json.len()
        );
        Ok(())
    }
}

/// Read the stored tree, falling back to a fresh default tree.
fn load_tree(
    backend: &dyn StorageBackend,
    options: &StoreOptions,
) -> StoreResult<(Value, LoadOutcome)> {
    let reason = match backend.load() {
        Ok(Some(json)) => match document::parse_tree(&json) {
            Ok(tree) => {
                info!("Loaded document from {}", backend.location());
                return Ok((tree, LoadOutcome::Loaded));
            }
            Err(e) => e.to_string(),
        },
        Ok(None) => {
            let tree = schema::default_tree();
            backend.save(&serde_json::to_string_pretty(&tree)?)?;
            info!("Created new document at {}", backend.location());
            return Ok((tree, LoadOutcome::Created));
        }
        Err(e) => e.to_string(),
    };

    warn!(
        "Document at {} is unreadable, starting from a default tree: {}",
        backend.location(),
        reason
    );

    let backup = if options.backup_corrupt {
        match backend.quarantine() {
            Ok(backup) => backup,
            Err(e) => {
                warn!("Could not set the unreadable document aside: {}", e);
                None
            }
        }
    } else {
        None
    };

    let tree = schema::default_tree();
    backend.save(&serde_json::to_string_pretty(&tree)?)?;

    Ok((tree, LoadOutcome::Recovered { reason, backup }))
}

/// Coalesced view of the tree inside [`Store::batch`]
///
/// Mutations apply to the tree immediately; persistence happens once when
/// the batch ends.
pub struct Batch<'a> {
    tree: &'a mut Value,
    policy: PathConflictPolicy,
    dirty: bool,
}

impl Batch<'_> {
    /// Whether anything has been written in this batch
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl TreeAccess for Batch<'_> {
    fn read(&self, path: &str) -> Option<Value> {
        document::resolve(self.tree, &path::parse(path)).cloned()
    }

    fn exists(&self, path: &str) -> bool {
        document::resolve(self.tree, &path::parse(path)).is_some()
    }

    fn children(&self, path: &str) -> Vec<String> {
        document::child_keys(self.tree, &path::parse(path))
    }

    fn put(&mut self, path: &str, value: Value) -> StoreResult<()> {
        document::insert(self.tree, &path::parse(path), value, self.policy)?;
        self.dirty = true;
        Ok(())
    }

    fn remove(&mut self, path: &str) -> StoreResult<()> {
        if document::delete(self.tree, &path::parse(path)).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn push(&mut self, path: &str) -> StoreResult<String> {
        let key = document::new_push_key();
        let mut segments = path::parse(path);
        segments.push(key.clone());
        document::insert(self.tree, &segments, Value::Object(Map::new()), self.policy)?;
        self.dirty = true;
        Ok(key)
    }
}

impl TreeAccess for Store {
    fn read(&self, path: &str) -> Option<Value> {
        Store::read(self, path)
    }

    fn exists(&self, path: &str) -> bool {
        Store::exists(self, path)
    }

    fn children(&self, path: &str) -> Vec<String> {
        Store::children(self, path)
    }

    fn put(&mut self, path: &str, value: Value) -> StoreResult<()> {
        Store::put(self, path, value)
    }

    fn remove(&mut self, path: &str) -> StoreResult<()> {
        Store::remove(self, path)
    }

    fn push(&mut self, path: &str) -> StoreResult<String> {
        Store::push(self, path)
    }
}

/// Shared handles write through the store's own lock
impl TreeAccess for &Store {
    fn read(&self, path: &str) -> Option<Value> {
        Store::read(self, path)
    }

    fn exists(&self, path: &str) -> bool {
        Store::exists(self, path)
    }

    fn children(&self, path: &str) -> Vec<String> {
        Store::children(self, path)
    }

    fn put(&mut self, path: &str, value: Value) -> StoreResult<()> {
        Store::put(self, path, value)
    }

    fn remove(&mut self, path: &str) -> StoreResult<()> {
        Store::remove(self, path)
    }

    fn push(&mut self, path: &str) -> StoreResult<String> {
        Store::push(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Scalar;
    use crate::storage::StoreError;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn memory_store() -> (Store, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = Store::with_backend(backend.clone(), StoreOptions::default()).unwrap();
        (store, backend)
    }

    #[test]
    fn test_open_creates_default_document() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = Store::open(&config).unwrap();

        assert_eq!(*store.load_outcome(), LoadOutcome::Created);
        assert!(config.data_path().exists());
        assert!(store.children("").contains(&"students".to_string()));
    }

    #[test]
    fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        {
            let store = Store::open(&config).unwrap();
            store.put("students/u1/name", "Jane").unwrap();
        }

        let store = Store::open(&config).unwrap();
        assert_eq!(*store.load_outcome(), LoadOutcome::Loaded);
        assert_eq!(store.get_string("students/u1/name").as_deref(), Some("Jane"));
    }

    #[test]
    fn test_corrupt_file_is_backed_up_and_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        std::fs::write(config.data_path(), "{ not json").unwrap();

        let store = Store::open(&config).unwrap();

        match store.load_outcome() {
            LoadOutcome::Recovered { backup, .. } => {
                let backup = backup.as_ref().unwrap();
                assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
            }
            other => panic!("unexpected outcome: {other}"),
        }
        assert!(store.exists("school_years"));

        // The replacement is readable on the next open
        drop(store);
        let store = Store::open(&config).unwrap();
        assert_eq!(*store.load_outcome(), LoadOutcome::Loaded);
    }

    #[test]
    fn test_non_object_root_is_recovered_without_backup() {
        let backend = MemoryBackend::with_contents("[1, 2, 3]");
        let options = StoreOptions {
            backup_corrupt: false,
            ..StoreOptions::default()
        };

        let store = Store::with_backend(backend.clone(), options).unwrap();

        assert!(store.load_outcome().is_recovered());
        assert!(backend.quarantined().is_none());
        assert!(store.exists("students"));
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let (store, _) = memory_store();

        let record = json!({ "name": "Jane", "email": "jane@example.com" });
        store.put("students/u1", record.clone()).unwrap();
        store.put("settings/locale", "en").unwrap();
        store.put("settings/max_marks", 12).unwrap();

        assert_eq!(store.get("students/u1").map(Value::Object), Some(record));
        assert_eq!(store.get_scalar("settings/locale"), Some(Scalar::from("en")));
        assert_eq!(store.get_scalar("settings/max_marks").and_then(|s| s.as_i64()), Some(12));
    }

    #[test]
    fn test_get_wrong_type_is_none() {
        let (store, _) = memory_store();
        store.put("settings/locale", "en").unwrap();
        store.put("settings/weekdays", json!(["mon", "tue"])).unwrap();

        assert!(store.get("settings/locale").is_none());
        assert!(store.get_scalar("settings").is_none());
        assert!(store.get_array("settings/locale").is_none());
        assert_eq!(store.get_array("settings/weekdays").map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_exists_counts_falsy_values() {
        let (store, _) = memory_store();
        store.put("admins/u1", false).unwrap();
        store.put("settings/count", 0).unwrap();
        store.put("settings/cleared", Value::Null).unwrap();

        assert!(store.exists("admins/u1"));
        assert!(store.exists("settings/count"));
        assert!(!store.exists("settings/cleared"));
        assert!(store.children("settings").contains(&"cleared".to_string()));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (store, _) = memory_store();
        store.put("grades/y/winter/math/u1/m1", json!({ "grade": "A" })).unwrap();

        store.remove("grades/y/winter/math/u1/m1").unwrap();
        let once = store.export_json().unwrap();
        store.remove("grades/y/winter/math/u1/m1").unwrap();
        let twice = store.export_json().unwrap();

        assert_eq!(once, twice);
        assert!(!store.exists("grades/y/winter/math/u1/m1"));
    }

    #[test]
    fn test_remove_under_scalar_is_noop() {
        let (store, _) = memory_store();
        store.put("settings/locale", "en").unwrap();

        store.remove("settings/locale/x").unwrap();
        assert_eq!(store.get_string("settings/locale").as_deref(), Some("en"));
    }

    #[test]
    fn test_push_creates_empty_object() {
        let (store, _) = memory_store();
        let key = store.push("days_off").unwrap();

        assert!(!key.is_empty());
        assert_eq!(store.get(&format!("days_off/{}", key)), Some(Map::new()));
    }

    #[test]
    fn test_push_keys_are_unique() {
        let (store, _) = memory_store();
        let keys: HashSet<String> = store
            .batch(|tx| (0..10_000).map(|_| tx.push("grades/bulk")).collect())
            .unwrap();

        assert_eq!(keys.len(), 10_000);
        assert_eq!(store.children("grades/bulk").len(), 10_000);
    }

    #[test]
    fn test_every_mutation_persists() {
        let (store, backend) = memory_store();
        let after_open = backend.save_count();

        store.put("admins/u1", true).unwrap();
        store.push("days_off").unwrap();
        store.remove("admins/u1").unwrap();

        assert_eq!(backend.save_count(), after_open + 3);
        let persisted: Value = serde_json::from_str(&backend.contents().unwrap()).unwrap();
        assert!(persisted["admins"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_persisted_file_uses_two_space_indent() {
        let (store, backend) = memory_store();
        store.put("teachers/t1", "t@example.com, Tom").unwrap();

        let persisted = backend.contents().unwrap();
        assert!(persisted.contains("\n  \"teachers\": {\n    \"t1\""));
        assert_eq!(persisted, store.export_json().unwrap());
    }

    #[test]
    fn test_path_conflict_policies() {
        let (store, _) = memory_store();
        store.put("settings/theme", "dark").unwrap();
        store.put("settings/theme/color", "red").unwrap();
        assert_eq!(store.get_string("settings/theme/color").as_deref(), Some("red"));

        let strict = Store::with_backend(
            MemoryBackend::new(),
            StoreOptions {
                path_conflict: PathConflictPolicy::Reject,
                ..StoreOptions::default()
            },
        )
        .unwrap();
        strict.put("settings/theme", "dark").unwrap();
        let err = strict.put("settings/theme/color", "red").unwrap_err();
        assert!(matches!(err, StoreError::PathConflict { .. }));
        assert_eq!(strict.get_string("settings/theme").as_deref(), Some("dark"));
    }

    #[test]
    fn test_batch_persists_once() {
        let (store, backend) = memory_store();
        let before = backend.save_count();

        store
            .batch(|tx| {
                tx.put("students/u1/name", json!("Jane"))?;
                tx.put("students/u2/name", json!("John"))?;
                tx.remove("students/u1")?;
                Ok(())
            })
            .unwrap();

        assert_eq!(backend.save_count(), before + 1);
        assert!(!store.exists("students/u1"));
        assert!(store.exists("students/u2/name"));
    }

    #[test]
    fn test_batch_without_changes_does_not_persist() {
        let (store, backend) = memory_store();
        let before = backend.save_count();

        let count = store.batch(|tx| Ok(tx.children("students").len())).unwrap();

        assert_eq!(count, 0);
        assert_eq!(backend.save_count(), before);
    }

    #[test]
    fn test_batch_rolls_back_on_error() {
        let (store, backend) = memory_store();
        store.put("students/u1/name", "Jane").unwrap();
        let persisted = backend.contents();

        let result: StoreResult<()> = store.batch(|tx| {
            tx.remove("students/u1")?;
            tx.put("students/u2/name", json!("John"))?;
            Err(StoreError::Backend("abort".to_string()))
        });

        assert!(result.is_err());
        assert!(store.exists("students/u1/name"));
        assert!(!store.exists("students/u2"));
        assert_eq!(backend.contents(), persisted);
    }

    #[test]
    fn test_batch_rolls_back_when_persist_fails() {
        let (store, backend) = memory_store();
        backend.set_fail_writes(true);

        let result = store.batch(|tx| tx.put("admins/u1", json!(true)));

        assert!(result.is_err());
        assert!(!store.exists("admins/u1"));
    }

    #[test]
    fn test_export_import_round_trip() {
        let (source, _) = memory_store();
        source.put("school_years/2025_2026/name", "2025/2026").unwrap();
        let mut exported = Vec::new();
        source.export_to(&mut exported).unwrap();

        let (target, backend) = memory_store();
        target.put("admins/u9", true).unwrap();
        target.import_from(exported.as_slice()).unwrap();

        // Import replaces, never merges
        assert!(!target.exists("admins/u9"));
        assert_eq!(
            target.get_string("school_years/2025_2026/name").as_deref(),
            Some("2025/2026")
        );
        assert_eq!(backend.contents().unwrap(), source.export_json().unwrap());
    }

    #[test]
    fn test_failed_import_leaves_state_untouched() {
        let (store, backend) = memory_store();
        store.put("admins/u1", true).unwrap();
        let before = backend.contents();

        assert!(matches!(
            store.import_json("{ truncated"),
            Err(StoreError::InvalidFormat { .. })
        ));
        assert!(matches!(
            store.import_json("\"just a string\""),
            Err(StoreError::InvalidFormat { .. })
        ));

        assert!(store.exists("admins/u1"));
        assert_eq!(backend.contents(), before);
    }

    #[test]
    fn test_shared_store_serializes_writers() {
        let store = Arc::new(Store::in_memory().unwrap());

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .put(&format!("settings/w{}/{}", worker, i), i)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for worker in 0..4 {
            assert_eq!(store.children(&format!("settings/w{}", worker)).len(), 25);
        }
    }

    #[test]
    fn test_shared_reference_implements_tree_access() {
        let store = Store::in_memory().unwrap();
        let mut handle = &store;

        let key = TreeAccess::push(&mut handle, "consultation_bookings").unwrap();
        assert!(store.exists(&format!("consultation_bookings/{}", key)));
    }
}
