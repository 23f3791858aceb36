//! Status command handler

use anyhow::Result;
use serde_json::Value;

use classbook_core::document::kind_of;
use classbook_core::{Config, LoadOutcome, Store};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &Store, config: &Config, output: &Output) -> Result<()> {
    let sections: Vec<(String, &'static str, usize)> = store
        .children("")
        .into_iter()
        .map(|key| {
            let (kind, count) = match store.read(&key) {
                Some(Value::Object(map)) => ("object", map.len()),
                Some(Value::Array(items)) => ("array", items.len()),
                Some(other) => (kind_of(&other), 1),
                None => ("null", 0),
            };
            (key, kind, count)
        })
        .collect();

    match output.format {
        OutputFormat::Json => {
            let counts: serde_json::Map<String, Value> = sections
                .iter()
                .map(|(key, _, count)| (key.clone(), Value::from(*count)))
                .collect();
            println!(
                "{:#}",
                serde_json::json!({
                    "location": store.location(),
                    "load_outcome": store.load_outcome().to_string(),
                    "path_conflict": config.path_conflict,
                    "run_migrations_on_open": config.run_migrations_on_open,
                    "sections": counts
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", store.location());
        }
        OutputFormat::Human => {
            println!("Data file:     {}", store.location());
            println!("Opened:        {}", store.load_outcome());
            if let LoadOutcome::Recovered { .. } = store.load_outcome() {
                println!("               (previous contents were unreadable)");
            }
            println!("Path conflict: {}", config.path_conflict);
            println!(
                "Migrations:    {}",
                if config.run_migrations_on_open {
                    "run on open"
                } else {
                    "manual"
                }
            );
            println!();
            println!("Sections:");
            for (key, kind, count) in &sections {
                match *kind {
                    "object" => println!("  {:<24} {}", key, count),
                    _ => println!("  {:<24} {} ({})", key, count, kind),
                }
            }
        }
    }

    Ok(())
}
