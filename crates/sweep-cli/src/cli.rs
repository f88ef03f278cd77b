//! Command-line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sweep",
    version,
    disable_help_subcommand = true,
    about = "Resumable headless-browser lookups over a list of identifiers",
    after_help = "Settings are resolved in order by explicit flag, SWEEP_* environment variables, the config file, then defaults."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process every pending item and print one line per item
    Run(RunArgs),
    /// Print the stored results of a run, or list runs when no id is given
    Show(ShowArgs),
}

/// Site-specific lookup to run for each item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractorKind {
    /// Pet microchip registry status
    Microchip,
    /// Vehicle mileage from a classified listing
    Mileage,
    /// Lodging registration address lookup
    Registration,
}

impl ExtractorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Microchip => "microchip",
            Self::Mileage => "mileage",
            Self::Registration => "registration",
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, value_enum, help = "Lookup to run for each item")]
    pub extractor: ExtractorKind,
    #[arg(
        long,
        value_name = "FILE",
        help = "Input file with one item per line; blank lines are kept as N/A"
    )]
    pub input: PathBuf,
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "checkpoint",
        help = "SQLite database for resumable results (defaults to storage.database_path)"
    )]
    pub db: Option<PathBuf>,
    #[arg(
        long = "run-id",
        value_name = "ID",
        conflicts_with = "checkpoint",
        help = "Run identifier in the database; resumes when it already exists"
    )]
    pub run_id: Option<String>,
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON checkpoint file to resume from and write to"
    )]
    pub checkpoint: Option<PathBuf>,
    #[arg(long = "batch-size", value_name = "N", help = "Items between checkpoints")]
    pub batch_size: Option<usize>,
    #[arg(
        long = "recycle-every",
        value_name = "N",
        help = "Items between browser restarts"
    )]
    pub recycle_every: Option<usize>,
    #[arg(long, value_name = "N", help = "Extra attempts per item")]
    pub retries: Option<u32>,
    #[arg(
        long = "init-url",
        value_name = "URL",
        help = "Page to open right after each browser launch"
    )]
    pub init_url: Option<String>,
    #[arg(
        long = "chunk-size",
        value_name = "N",
        help = "Process items N at a time on parallel pages"
    )]
    pub chunk_size: Option<usize>,
    #[arg(
        long = "keep-failed",
        help = "Do not retry items that failed or stayed ambiguous in an earlier run"
    )]
    pub keep_failed: bool,
    #[arg(long, value_name = "FILE", help = "Config file instead of the default location")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(
        long,
        value_name = "PATH",
        help = "SQLite database (defaults to storage.database_path)"
    )]
    pub db: Option<PathBuf>,
    #[arg(long = "run-id", value_name = "ID", help = "Run to print")]
    pub run_id: Option<String>,
    #[arg(long, value_name = "FILE", help = "Config file instead of the default location")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "sweep",
            "run",
            "--extractor",
            "mileage",
            "--input",
            "ids.txt",
            "--db",
            "sweep.db",
            "--run-id",
            "olx-march",
            "--chunk-size",
            "4",
        ])
        .expect("parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.extractor, ExtractorKind::Mileage);
        assert_eq!(args.run_id.as_deref(), Some("olx-march"));
        assert_eq!(args.chunk_size, Some(4));
        assert!(args.batch_size.is_none());
        assert!(!args.keep_failed);
    }

    #[test]
    fn test_checkpoint_conflicts_with_db() {
        let result = Cli::try_parse_from([
            "sweep",
            "run",
            "--extractor",
            "microchip",
            "--input",
            "chips.txt",
            "--db",
            "sweep.db",
            "--checkpoint",
            "chips.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_extractor_rejected() {
        let result = Cli::try_parse_from([
            "sweep",
            "run",
            "--extractor",
            "weather",
            "--input",
            "x.txt",
        ]);
        assert!(result.is_err());
    }
}
