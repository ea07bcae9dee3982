//! Audex CLI
//!
//! Command-line access to a SQLite audit log

use audex_core::logging_facility;
use audex_core::AuditSettings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "audex")]
#[command(about = "Audex - audit log inspection and maintenance", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit structured logs using the configured profile
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the grouped history of an entity
    History(commands::history::HistoryArgs),
    /// Move log entries from one actor to another
    MergeActor(commands::actor::MergeActorArgs),
    /// Remove an actor from the log entries attributed to it
    ForgetActor(commands::actor::ForgetActorArgs),
    /// Delete all entries targeting or anchored to an entity type
    PurgeType(commands::purge::PurgeTypeArgs),
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match &cli.config {
        Some(path) => AuditSettings::load(path)?,
        None => AuditSettings::default(),
    };
    if cli.verbose {
        logging_facility::init(settings.log_profile);
    }

    match cli.command {
        Commands::History(args) => commands::history::execute(args, &settings),
        Commands::MergeActor(args) => commands::actor::execute_merge(args),
        Commands::ForgetActor(args) => commands::actor::execute_forget(args),
        Commands::PurgeType(args) => commands::purge::execute(args),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
