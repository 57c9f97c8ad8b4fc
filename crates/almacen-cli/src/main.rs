mod commands;

use std::path::PathBuf;

use almacen_config::{ConfigLoader, LoggingConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "almacen", version, about = "Inventory management backend")]
struct Cli {
    /// Path to config.toml (defaults to ~/.almacen/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured path.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending schema migrations and exit.
    Migrate,
    /// Show the ledger state of every known migration.
    Status,
    /// Print the live column set of a table.
    Schema { table: String },
    /// Run the explicit down operation of one migration.
    Revert { name: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());

    match cli.command {
        Command::Migrate => commands::migrate(&db_path),
        Command::Status => commands::status(&db_path),
        Command::Schema { table } => commands::schema(&db_path, &table),
        Command::Revert { name } => commands::revert(&db_path, &name),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
