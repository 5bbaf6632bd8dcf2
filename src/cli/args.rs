use crate::processors::TableStrategy;
use crate::readers::{ReadMode, ScanStrategy};
use crate::utils::constants::DEFAULT_INPUT_FILE;
use crate::writers::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brc-processor")]
#[command(about = "Parallel min/mean/max aggregation of station measurement files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Hide the progress spinner")]
    pub quiet: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Settings file (toml, json or yaml)")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate a measurements file and print the per-station summary
    Process {
        #[arg(short, long, default_value = DEFAULT_INPUT_FILE)]
        input_file: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Run the whole pipeline and print a run report instead of the summary
    Validate {
        #[arg(short, long, default_value = DEFAULT_INPUT_FILE)]
        input_file: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },
}

/// Per-run overrides; anything left unset comes from the settings layers.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOptions {
    #[arg(short, long, help = "Worker threads [default: available cores]")]
    pub workers: Option<usize>,

    #[arg(long, value_enum)]
    pub read_mode: Option<ReadMode>,

    #[arg(long, value_enum)]
    pub scanner: Option<ScanStrategy>,

    #[arg(long, value_enum)]
    pub table: Option<TableStrategy>,

    #[arg(long, help = "Merge worker tables pairwise in parallel")]
    pub tree_merge: bool,

    #[arg(
        long,
        help = "Stop key discovery once this many distinct stations are seen"
    )]
    pub expected_stations: Option<usize>,

    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_overrides() {
        let cli = Cli::try_parse_from([
            "brc-processor",
            "--quiet",
            "process",
            "-i",
            "data.txt",
            "--workers",
            "4",
            "--scanner",
            "lanes",
            "--table",
            "open-addressing",
            "--read-mode",
            "buffered",
            "--format",
            "json",
        ])
        .unwrap();

        assert!(cli.quiet);
        match cli.command {
            Commands::Process {
                input_file,
                options,
            } => {
                assert_eq!(input_file, PathBuf::from("data.txt"));
                assert_eq!(options.workers, Some(4));
                assert_eq!(options.scanner, Some(ScanStrategy::Lanes));
                assert_eq!(options.table, Some(TableStrategy::OpenAddressing));
                assert_eq!(options.read_mode, Some(ReadMode::Buffered));
                assert_eq!(options.format, Some(OutputFormat::Json));
                assert!(!options.tree_merge);
            }
            Commands::Validate { .. } => panic!("expected process"),
        }
    }

    #[test]
    fn test_default_input_file() {
        let cli = Cli::try_parse_from(["brc-processor", "validate"]).unwrap();
        match cli.command {
            Commands::Validate { input_file, .. } => {
                assert_eq!(input_file, PathBuf::from(DEFAULT_INPUT_FILE))
            }
            Commands::Process { .. } => panic!("expected validate"),
        }
    }
}
