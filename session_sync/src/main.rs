//! session_sync CLI
//!
//! Inspect the live schema of a database or bring it up to a set of table models.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use session_sync::utils::init_logging;
use session_sync::{config, Database, MigrationMode, TableModel};

/// Transactional SQL sessions and additive schema synchronization.
#[derive(Parser)]
#[command(name = "session_sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "session_sync.toml")]
    config: PathBuf,

    /// Enable verbose output when the configuration has no [logging] section.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the existing tables as JSON table models.
    Inspect {
        /// Only these tables (all user tables if not specified).
        #[arg(short, long)]
        table: Vec<String>,
    },

    /// Create missing tables, columns and indexes.
    Sync {
        /// Table models as JSON or TOML, with a top-level `tables` list.
        #[arg(short, long)]
        models: PathBuf,

        /// Override the configured migration mode (off, create_only, full).
        #[arg(long)]
        mode: Option<MigrationMode>,

        /// Show SQL without executing.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Deserialize)]
struct ModelFile {
    tables: Vec<TableModel>,
}

fn load_models(path: &Path) -> anyhow::Result<Vec<TableModel>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read models from {}", path.display()))?;

    let file: ModelFile = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text)?,
        _ => serde_json::from_str(&text)?,
    };
    Ok(file.tables)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.to_string_lossy().into_owned();
    let mut config = config::load_from_file(&config_path)?;

    if config.logging.is_some() {
        init_logging(&config.logging)?;
    } else {
        let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    match cli.command {
        Commands::Inspect { table } => {
            let db = Database::connect(&config).await?;
            let names: Vec<&str> = table.iter().map(String::as_str).collect();
            let filter = if names.is_empty() {
                None
            } else {
                Some(names.as_slice())
            };

            let tables = db.schema().get_tables(filter).await?;
            println!("{}", serde_json::to_string_pretty(&tables)?);
        }

        Commands::Sync {
            models,
            mode,
            dry_run,
        } => {
            let tables = load_models(&models)?;
            if dry_run {
                config.migrations.dry_run = true;
            }
            let mode = mode.unwrap_or(config.migrations.mode);

            let db = Database::connect(&config).await?;
            let report = db.schema().set_tables(mode, &tables).await?;
            print!("{}", report);

            if !report.is_success() {
                bail!("{} schema statement(s) failed", report.failures().len());
            }
        }
    }

    Ok(())
}
