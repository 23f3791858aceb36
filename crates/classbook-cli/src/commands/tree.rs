//! Path command handlers

use anyhow::{bail, Context, Result};
use serde_json::Value;

use classbook_core::{tree_path, Store};

use crate::output::Output;

/// Print the value at a path
pub fn get(store: &Store, path: &str, output: &Output) -> Result<()> {
    let Some(value) = store.read(path) else {
        bail!("Nothing stored at '{}'", path);
    };
    output.print_value(&value);
    Ok(())
}

/// Set the value at a path
pub fn put(store: &Store, path: &str, raw: &str, output: &Output) -> Result<()> {
    if classbook_core::path::parse(path).is_empty() {
        bail!("Refusing to replace the whole tree; use `classbook import` instead");
    }

    let value = parse_value(raw);
    store
        .put(path, value)
        .with_context(|| format!("Failed to write '{}'", path))?;

    output.success(&format!("Set {}", path));
    Ok(())
}

/// Remove the value at a path
pub fn remove(store: &Store, path: &str, output: &Output) -> Result<()> {
    let existed = store.exists(path);
    store
        .remove(path)
        .with_context(|| format!("Failed to remove '{}'", path))?;

    if existed {
        output.success(&format!("Removed {}", path));
    } else {
        output.success(&format!("Nothing at {}", path));
    }
    Ok(())
}

/// Create an empty object under a generated key
pub fn push(store: &Store, path: &str, output: &Output) -> Result<()> {
    let key = store
        .push(path)
        .with_context(|| format!("Failed to push under '{}'", path))?;
    output.key(&key);
    Ok(())
}

/// List child keys at a path
pub fn list(store: &Store, path: &str, output: &Output) -> Result<()> {
    let children: Vec<(String, Option<Value>)> = store
        .children(path)
        .into_iter()
        .map(|key| {
            let value = store.read(&tree_path![path, key]);
            (key, value)
        })
        .collect();

    output.print_children(&children);
    Ok(())
}

/// Interpret a command-line value as JSON, falling back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
