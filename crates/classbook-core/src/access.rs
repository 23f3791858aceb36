//! Accessor API
//!
//! [`TreeAccess`] is the seam every higher layer talks to. The store
//! implements it for write-through use, [`crate::store::Batch`] implements
//! it for coalesced writes, and a remote tree database mirroring the same
//! path conventions would implement it too.
//!
//! Absence is normal: reads return `None` or an empty list for missing or
//! wrong-typed paths instead of failing.

use serde_json::Value;

use crate::document::{Object, Scalar};
use crate::storage::StoreResult;

/// Path-addressed reads and writes over a document tree
pub trait TreeAccess {
    /// Clone of the node at `path`, or `None` if absent or the null sentinel
    fn read(&self, path: &str) -> Option<Value>;

    /// Whether `path` resolves to any non-null value.
    ///
    /// A stored `false` or `0` exists.
    fn exists(&self, path: &str) -> bool;

    /// Ordered keys of the object at `path`, empty if absent or not an object
    fn children(&self, path: &str) -> Vec<String>;

    /// Set the value at `path`, creating intermediate objects
    fn put(&mut self, path: &str, value: Value) -> StoreResult<()>;

    /// Delete the value at `path`; absent paths are a no-op
    fn remove(&mut self, path: &str) -> StoreResult<()>;

    /// Create an empty object under a fresh key at `path` and return the key
    fn push(&mut self, path: &str) -> StoreResult<String>;

    /// The object at `path`
    fn get(&self, path: &str) -> Option<Object> {
        match self.read(path)? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The scalar at `path`
    fn get_scalar(&self, path: &str) -> Option<Scalar> {
        self.read(path).as_ref().and_then(Scalar::from_value)
    }

    /// The array at `path`
    fn get_array(&self, path: &str) -> Option<Vec<Value>> {
        match self.read(path)? {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The string at `path`
    fn get_string(&self, path: &str) -> Option<String> {
        match self.read(path)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Set a scalar at `path`
    fn put_scalar(&mut self, path: &str, value: impl Into<Scalar>) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.put(path, value.into().into_value())
    }
}

impl<T: TreeAccess + ?Sized> TreeAccess for &mut T {
    fn read(&self, path: &str) -> Option<Value> {
        (**self).read(path)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }

    fn children(&self, path: &str) -> Vec<String> {
        (**self).children(path)
    }

    fn put(&mut self, path: &str, value: Value) -> StoreResult<()> {
        (**self).put(path, value)
    }

    fn remove(&mut self, path: &str) -> StoreResult<()> {
        (**self).remove(path)
    }

    fn push(&mut self, path: &str) -> StoreResult<String> {
        (**self).push(path)
    }
}
