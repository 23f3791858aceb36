//! Document tree
//!
//! The tree is a `serde_json::Value` whose root is always an object. Objects
//! keep insertion order (`preserve_order`), so child listings come back in
//! the order keys were written.
//!
//! Traversal only descends through objects. An array or scalar met before
//! the last segment ends the walk as "not found". A stored `null` is the
//! null sentinel: it occupies its key but never counts as existing.
//!
//! The functions here operate on a bare tree. The `Store` wraps them with
//! locking and persistence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::warn;
use uuid::Uuid;

use crate::storage::{StoreError, StoreResult};

/// An object node in the tree
pub type Object = Map<String, Value>;

/// A leaf value: string, number, or boolean
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
}

impl Scalar {
    /// Extract a scalar from a tree value.
    ///
    /// Returns `None` for objects, arrays, and the null sentinel.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::String(s.clone())),
            Value::Number(n) => Some(Scalar::Number(n.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Scalar::String(s) => Value::String(s),
            Scalar::Number(n) => Value::Number(n),
            Scalar::Bool(b) => Value::Bool(b),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        scalar.into_value()
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

/// What a write does when an intermediate segment holds a non-object value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathConflictPolicy {
    /// Replace the value with an empty object and keep descending
    #[default]
    Overwrite,
    /// Fail with [`StoreError::PathConflict`] and leave the tree untouched
    Reject,
}

impl PathConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathConflictPolicy::Overwrite => "overwrite",
            PathConflictPolicy::Reject => "reject",
        }
    }
}

impl FromStr for PathConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(PathConflictPolicy::Overwrite),
            "reject" => Ok(PathConflictPolicy::Reject),
            other => Err(format!(
                "unknown path conflict policy '{}' (expected 'overwrite' or 'reject')",
                other
            )),
        }
    }
}

impl fmt::Display for PathConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a fresh push key.
///
/// Keys are random v4 UUIDs, the same shape the remote database hands out
/// for auto-ids, so domain code can address either backend.
pub fn new_push_key() -> String {
    Uuid::new_v4().to_string()
}

/// Short type name for diagnostics
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse serialized JSON into a tree, requiring an object root
pub fn parse_tree(json: &str) -> StoreResult<Value> {
    let value: Value = serde_json::from_str(json).map_err(|e| StoreError::InvalidFormat {
        details: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(StoreError::InvalidFormat {
            details: format!("top level is a {}, expected an object", kind_of(&value)),
        });
    }
    Ok(value)
}

/// Walk `segments` from `root`.
///
/// Returns `None` as soon as a segment is missing or the walk hits a
/// non-object before the end. The null sentinel resolves to `None` as well.
pub fn resolve<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

/// Ordered child keys of the object at `segments`
pub fn child_keys(root: &Value, segments: &[String]) -> Vec<String> {
    match resolve(root, segments) {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Set the value at `segments`, creating intermediate objects as needed.
///
/// Writing to the empty path replaces the whole tree, which must then be an
/// object. A `null` value is stored as the null sentinel.
pub fn insert(
    root: &mut Value,
    segments: &[String],
    value: Value,
    policy: PathConflictPolicy,
) -> StoreResult<()> {
    let Some((last, parents)) = segments.split_last() else {
        if !value.is_object() {
            return Err(StoreError::InvalidFormat {
                details: format!("cannot replace the root with a {}", kind_of(&value)),
            });
        }
        *root = value;
        return Ok(());
    };

    if policy == PathConflictPolicy::Reject {
        check_conflicts(root, segments)?;
    }

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let object = coerce_object(current, &segments[..depth])?;
        current = object
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let parent = coerce_object(current, parents)?;
    parent.insert(last.clone(), value);
    Ok(())
}

/// Delete the key at `segments`.
///
/// A missing or non-object parent makes this a no-op, as does the empty
/// path. Returns the removed value, if any.
pub fn delete(root: &mut Value, segments: &[String]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = root;
    for segment in parents {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    current.as_object_mut()?.shift_remove(last)
}

/// Find the first intermediate segment that a write would clobber.
fn check_conflicts(root: &Value, segments: &[String]) -> StoreResult<()> {
    let parents = &segments[..segments.len().saturating_sub(1)];
    let mut current = root;
    for segment in parents {
        let Some(object) = current.as_object() else {
            break;
        };
        match object.get(segment) {
            Some(next @ Value::Object(_)) => current = next,
            Some(Value::Null) | None => return Ok(()),
            Some(other) => {
                return Err(StoreError::PathConflict {
                    path: segments.join("/"),
                    segment: segment.clone(),
                    found: kind_of(other),
                })
            }
        }
    }
    Ok(())
}

/// Make sure `value` is an object, replacing whatever was there.
///
/// Callers that must not clobber data run [`check_conflicts`] first, so any
/// replacement that reaches this point is the intended overwrite.
fn coerce_object<'a>(value: &'a mut Value, at: &[String]) -> StoreResult<&'a mut Object> {
    if !value.is_object() {
        if !value.is_null() {
            warn!(
                "Replacing {} at '{}' with an object to complete a write",
                kind_of(value),
                at.join("/")
            );
        }
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::PathConflict {
            path: at.join("/"),
            segment: at.last().cloned().unwrap_or_default(),
            found: kind_of(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse;
    use serde_json::json;

    fn tree() -> Value {
        json!({
            "students": {
                "u1": { "name": "Jane", "active": false, "age": 0 }
            },
            "settings": { "theme": "dark", "flags": [1, 2] },
            "nothing": null
        })
    }

    #[test]
    fn test_resolve_nested() {
        let root = tree();
        assert_eq!(resolve(&root, &parse("students/u1/name")), Some(&json!("Jane")));
    }

    #[test]
    fn test_resolve_root() {
        let root = tree();
        assert_eq!(resolve(&root, &[]), Some(&root));
    }

    #[test]
    fn test_resolve_stops_at_scalar_or_array() {
        let root = tree();
        assert!(resolve(&root, &parse("settings/theme/color")).is_none());
        assert!(resolve(&root, &parse("settings/flags/0")).is_none());
    }

    #[test]
    fn test_resolve_falsy_values_exist() {
        let root = tree();
        assert_eq!(resolve(&root, &parse("students/u1/active")), Some(&json!(false)));
        assert_eq!(resolve(&root, &parse("students/u1/age")), Some(&json!(0)));
    }

    #[test]
    fn test_resolve_null_sentinel_is_absent() {
        let root = tree();
        assert!(resolve(&root, &parse("nothing")).is_none());
    }

    #[test]
    fn test_child_keys_in_insertion_order() {
        let mut root = json!({});
        for key in ["zeta", "alpha", "mid"] {
            insert(&mut root, &parse(&format!("list/{}", key)), json!(1), PathConflictPolicy::Overwrite).unwrap();
        }
        assert_eq!(child_keys(&root, &parse("list")), vec!["zeta", "alpha", "mid"]);
        assert!(child_keys(&root, &parse("list/zeta")).is_empty());
        assert!(child_keys(&root, &parse("missing")).is_empty());
    }

    #[test]
    fn test_insert_creates_intermediates() {
        let mut root = json!({});
        insert(&mut root, &parse("a/b/c"), json!("x"), PathConflictPolicy::Overwrite).unwrap();
        assert_eq!(root, json!({ "a": { "b": { "c": "x" } } }));
    }

    #[test]
    fn test_insert_overwrite_replaces_scalar_intermediate() {
        let mut root = tree();
        insert(&mut root, &parse("settings/theme/color"), json!("red"), PathConflictPolicy::Overwrite).unwrap();
        assert_eq!(resolve(&root, &parse("settings/theme")), Some(&json!({ "color": "red" })));
    }

    #[test]
    fn test_insert_reject_leaves_tree_untouched() {
        let mut root = tree();
        let before = root.clone();
        let err = insert(&mut root, &parse("settings/flags/0/x"), json!(1), PathConflictPolicy::Reject)
            .unwrap_err();
        match err {
            StoreError::PathConflict { segment, found, .. } => {
                assert_eq!(segment, "flags");
                assert_eq!(found, "array");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(root, before);
    }

    #[test]
    fn test_insert_reject_allows_null_intermediate() {
        let mut root = tree();
        insert(&mut root, &parse("nothing/inner"), json!(true), PathConflictPolicy::Reject).unwrap();
        assert_eq!(resolve(&root, &parse("nothing/inner")), Some(&json!(true)));
    }

    #[test]
    fn test_insert_root_requires_object() {
        let mut root = tree();
        assert!(insert(&mut root, &[], json!([1]), PathConflictPolicy::Overwrite).is_err());
        insert(&mut root, &[], json!({ "fresh": {} }), PathConflictPolicy::Overwrite).unwrap();
        assert_eq!(root, json!({ "fresh": {} }));
    }

    #[test]
    fn test_delete() {
        let mut root = tree();
        assert_eq!(delete(&mut root, &parse("students/u1/name")), Some(json!("Jane")));
        assert!(resolve(&root, &parse("students/u1/name")).is_none());
        assert!(delete(&mut root, &parse("students/u1/name")).is_none());
    }

    #[test]
    fn test_delete_preserves_sibling_order() {
        let mut root = json!({ "a": 1, "b": 2, "c": 3 });
        delete(&mut root, &parse("a"));
        let keys: Vec<_> = root.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_delete_through_scalar_is_noop() {
        let mut root = tree();
        let before = root.clone();
        assert!(delete(&mut root, &parse("settings/theme/color")).is_none());
        assert!(delete(&mut root, &[]).is_none());
        assert_eq!(root, before);
    }

    #[test]
    fn test_parse_tree_requires_object() {
        assert!(parse_tree("{\"a\": 1}").is_ok());
        assert!(matches!(parse_tree("[1, 2]"), Err(StoreError::InvalidFormat { .. })));
        assert!(matches!(parse_tree("{broken"), Err(StoreError::InvalidFormat { .. })));
    }

    #[test]
    fn test_scalar_from_value() {
        assert_eq!(Scalar::from_value(&json!("x")), Some(Scalar::from("x")));
        assert_eq!(Scalar::from_value(&json!(false)), Some(Scalar::Bool(false)));
        assert_eq!(Scalar::from_value(&json!(3)).and_then(|s| s.as_i64()), Some(3));
        assert!(Scalar::from_value(&Value::Null).is_none());
        assert!(Scalar::from_value(&json!([])).is_none());
        assert!(Scalar::from_value(&json!({})).is_none());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Reject".parse::<PathConflictPolicy>().unwrap(), PathConflictPolicy::Reject);
        assert_eq!("overwrite".parse::<PathConflictPolicy>().unwrap(), PathConflictPolicy::Overwrite);
        assert!("merge".parse::<PathConflictPolicy>().is_err());
    }

    #[test]
    fn test_push_keys_distinct() {
        assert_ne!(new_push_key(), new_push_key());
    }
}
