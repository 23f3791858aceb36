//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use classbook_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config: &Config, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            println!(
                "{:#}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "data_file": config.data_file,
                    "data_path": config.data_path(),
                    "log_file": config.log_file,
                    "path_conflict": config.path_conflict,
                    "run_migrations_on_open": config.run_migrations_on_open,
                    "backup_corrupt": config.backup_corrupt
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_path().display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:               {}", config.data_dir.display());
            println!("  data_file:              {}", config.data_file);
            println!(
                "  log_file:               {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(stderr)".to_string())
            );
            println!("  path_conflict:          {}", config.path_conflict);
            println!("  run_migrations_on_open: {}", config.run_migrations_on_open);
            println!("  backup_corrupt:         {}", config.backup_corrupt);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Write the effective configuration to the config file
pub fn init(config: &Config, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);

    if save_path.exists() {
        bail!("Config file already exists: {}", save_path.display());
    }

    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Wrote {}", save_path.display()));
    Ok(())
}
