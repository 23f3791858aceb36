//! Export and import command handlers

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use classbook_core::Store;

use crate::output::Output;

/// Write the whole tree to a file, or to stdout
pub fn export(store: &Store, file: Option<&PathBuf>, output: &Output) -> Result<()> {
    match file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            store.export_to(&mut writer).context("Failed to export")?;
            writer.flush()?;
            output.success(&format!("Exported to {}", path.display()));
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            store.export_to(&mut writer).context("Failed to export")?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Replace the whole tree with the contents of a file
pub fn import(store: &Store, file: &PathBuf, output: &Output) -> Result<()> {
    let reader = File::open(file)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    store
        .import_from(reader)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    output.success(&format!("Imported {} into {}", file.display(), store.location()));
    Ok(())
}
