//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use classbook_core::document::kind_of;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a tree node
    pub fn print_value(&self, value: &Value) {
        match self.format {
            OutputFormat::Human => match value {
                Value::String(s) => println!("{}", s),
                other => println!("{:#}", other),
            },
            OutputFormat::Json => println!("{:#}", value),
            OutputFormat::Quiet => match value {
                Value::String(s) => println!("{}", s),
                other => println!("{}", other),
            },
        }
    }

    /// Print the children of a node with a short preview of each
    pub fn print_children(&self, children: &[(String, Option<Value>)]) {
        match self.format {
            OutputFormat::Human => {
                if children.is_empty() {
                    println!("No keys found.");
                    return;
                }
                let width = children.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
                for (key, value) in children {
                    println!("{:<width$}  {}", key, preview(value.as_ref()), width = width);
                }
                println!("\n{} key(s)", children.len());
            }
            OutputFormat::Json => {
                let keys: Vec<&str> = children.iter().map(|(key, _)| key.as_str()).collect();
                println!("{}", serde_json::json!(keys));
            }
            OutputFormat::Quiet => {
                for (key, _) in children {
                    println!("{}", key);
                }
            }
        }
    }

    /// Print a serializable report, with a human rendering
    pub fn print_report<T: Serialize>(&self, report: &T, human: impl FnOnce()) -> Result<()> {
        match self.format {
            OutputFormat::Human => human(),
            OutputFormat::Json => println!("{:#}", serde_json::to_value(report)?),
            OutputFormat::Quiet => {}
        }
        Ok(())
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a generated key (always printed, even in quiet mode)
    pub fn key(&self, key: &str) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "key": key })),
            OutputFormat::Human | OutputFormat::Quiet => println!("{}", key),
        }
    }
}

/// One-line summary of a node for listings
fn preview(value: Option<&Value>) -> String {
    match value {
        None => "(null)".to_string(),
        Some(Value::Object(map)) => format!("{{{} key(s)}}", map.len()),
        Some(Value::Array(items)) => format!("[{} item(s)]", items.len()),
        Some(Value::String(s)) => truncate(&format!("{:?}", s), 50),
        Some(other) => format!("{} ({})", other, kind_of(other)),
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
