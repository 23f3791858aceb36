//! Classbook CLI
//!
//! Command-line administration for the classbook document store: inspect
//! and edit paths, export and import the tree, and run migrations.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use classbook_core::{Config, LoadOutcome, Migrator, SemesterScope, Store, StoreError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "classbook")]
#[command(about = "Classbook - inspect and maintain the school document store")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log more detail to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to an alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value at a path
    Get {
        /// Slash-separated path, e.g. students/u1
        path: String,
    },
    /// Set the value at a path
    Put {
        path: String,
        /// JSON value; anything that is not valid JSON is stored as a string
        value: String,
    },
    /// Remove the value at a path
    #[command(alias = "remove")]
    Rm { path: String },
    /// Create an empty object under a generated key and print the key
    Push { path: String },
    /// List child keys at a path
    #[command(alias = "list")]
    Ls {
        /// Defaults to the root
        #[arg(default_value = "")]
        path: String,
    },
    /// Write the whole tree as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Replace the whole tree with the contents of a JSON file
    Import { file: PathBuf },
    /// Run schema migrations
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },
    /// Show store status
    Status,
    /// Show or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Hoist legacy subjects into years and consolidate per-year students
    Startup,
    /// Move a subject's data after its semester scope changed
    Semester {
        /// Subject key
        #[arg(long)]
        subject: String,
        /// Previous scope (both, winter, summer)
        #[arg(long)]
        from: SemesterScope,
        /// New scope (both, winter, summer)
        #[arg(long)]
        to: SemesterScope,
        /// Only this school year; also updates the subject's stored scope
        #[arg(long)]
        year: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Write the effective configuration to the config file
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli, &output);
    if let Err(e) = &result {
        print_hint(e, &output);
    }
    result
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_ref();

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    // Commands that don't need the store
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&config, config_path, output),
            Some(ConfigCommands::Init) => commands::config::init(&config, config_path, output),
        };
    }

    // Explicit migration commands report what they did, so skip the implicit run
    let migrate_on_open =
        config.run_migrations_on_open && !matches!(cli.command, Commands::Migrate { .. });
    let store = open_store(&config, migrate_on_open, output)?;

    match cli.command {
        Commands::Get { path } => commands::tree::get(&store, &path, output),
        Commands::Put { path, value } => commands::tree::put(&store, &path, &value, output),
        Commands::Rm { path } => commands::tree::remove(&store, &path, output),
        Commands::Push { path } => commands::tree::push(&store, &path, output),
        Commands::Ls { path } => commands::tree::list(&store, &path, output),
        Commands::Export { output: file } => {
            commands::transfer::export(&store, file.as_ref(), output)
        }
        Commands::Import { file } => commands::transfer::import(&store, &file, output),
        Commands::Migrate { command } => handle_migrate_command(command, &store, output),
        Commands::Status => commands::status::show(&store, &config, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_migrate_command(command: MigrateCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        MigrateCommands::Startup => commands::migrate::startup(store, output),
        MigrateCommands::Semester {
            subject,
            from,
            to,
            year,
        } => commands::migrate::semester(store, subject, from, to, year, output),
    }
}

/// Point at a fix for storage errors that have a known one
fn print_hint(error: &anyhow::Error, output: &Output) {
    if output.is_quiet() {
        return;
    }
    let hint = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StoreError>())
        .and_then(StoreError::recovery_suggestion);
    if let Some(hint) = hint {
        eprintln!("Hint: {}", hint);
    }
}

/// Open the store and, if configured, bring it up to the current layout
fn open_store(config: &Config, migrate: bool, output: &Output) -> Result<Store> {
    let store = Store::open(config)
        .with_context(|| format!("Failed to open {}", config.data_path().display()))?;

    if let LoadOutcome::Recovered { reason, backup } = store.load_outcome() {
        if !output.is_quiet() {
            eprintln!("Warning: data file was unreadable ({}).", reason);
            eprintln!("Started from an empty document.");
            if let Some(backup) = backup {
                eprintln!("The unreadable file was kept at {}", backup);
            }
        }
    }

    if migrate {
        let report = Migrator::new(&store)
            .run_startup()
            .context("Startup migrations failed")?;
        if report.changed_anything() {
            info!("Startup migrations updated {}", store.location());
        }
    }

    Ok(store)
}

/// Initialize tracing.
///
/// Logs go to `config.log_file` when set, otherwise to stderr. `RUST_LOG`
/// overrides the level chosen by `--verbose`.
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("classbook_core={0},classbook={0}", level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore errors if a subscriber is already installed
    match &config.log_file {
        Some(log_path) => {
            match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(file) => {
                    let _ = builder
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .try_init();
                }
                Err(e) => {
                    let _ = builder.with_writer(std::io::stderr).try_init();
                    warn!("Could not open log file {:?}: {}", log_path, e);
                }
            }
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_semester_migration() {
        let cli = Cli::try_parse_from([
            "classbook", "migrate", "semester", "--subject", "math", "--from", "winter", "--to",
            "both", "--year", "2025_2026",
        ])
        .unwrap();

        match cli.command {
            Commands::Migrate {
                command:
                    MigrateCommands::Semester {
                        subject,
                        from,
                        to,
                        year,
                    },
            } => {
                assert_eq!(subject, "math");
                assert_eq!(from, SemesterScope::Winter);
                assert_eq!(to, SemesterScope::Both);
                assert_eq!(year.as_deref(), Some("2025_2026"));
            }
            _ => panic!("expected migrate semester"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_scope() {
        let result = Cli::try_parse_from([
            "classbook", "migrate", "semester", "--subject", "math", "--from", "spring", "--to",
            "both",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["classbook", "ls", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Ls { ref path } if path.is_empty()));
    }

    #[test]
    fn test_open_store_runs_startup_migrations() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        std::fs::write(
            config.data_path(),
            r#"{ "students": { "2025_2026": { "u1": { "name": "Jane" } } } }"#,
        )
        .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        let store = open_store(&config, true, &output).unwrap();

        assert!(store.exists("students/u1/name"));
        assert!(!store.exists("students/2025_2026"));
    }
}
