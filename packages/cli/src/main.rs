mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, diff, stats, CheckArgs, DiffArgs, StatsArgs};
use std::path::PathBuf;

/// Folio CLI - inspect and compare serialized editor states
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Editor config file (defaults to folio.config.json in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output from the editor pipeline
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load state files and report structural problems
    Check(CheckArgs),

    /// Print the view patches turning one state into another
    Diff(DiffArgs),

    /// Summarize the nodes of a state
    Stats(StatsArgs),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let editor_config = config::load(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Command::Check(args) => check(args, &editor_config),
        Command::Diff(args) => diff(args, &editor_config),
        Command::Stats(args) => stats(args, &editor_config),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
