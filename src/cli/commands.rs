use crate::cli::args::{Cli, Commands, RunOptions};
use crate::cli::settings::Settings;
use crate::error::Result;
use crate::processors::ProcessingOutcome;
use crate::utils::progress::ProgressReporter;
use crate::writers::{OutputFormat, SummaryWriter};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::subscriber::NoSubscriber;
use tracing::{info, warn, Level};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Process {
            input_file,
            options,
        } => {
            let settings = resolve_settings(cli.config.as_deref(), &options)?;
            let outcome = execute(&settings, input_file, cli.quiet).await?;

            let writer = SummaryWriter::new(settings.format);
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            writer.write_summary(&outcome.summary, &mut out)?;

            info!(
                "Processing complete: {} stations from {} records",
                outcome.summary.len(),
                outcome.summary.total_count()
            );
        }

        Commands::Validate {
            input_file,
            options,
        } => {
            let settings = resolve_settings(cli.config.as_deref(), &options)?;
            let outcome = execute(&settings, input_file, cli.quiet).await?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            match settings.format {
                OutputFormat::Text => {
                    write!(out, "{}", outcome.report)?;
                    writeln!(out, "All records passed validation")?;
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&outcome.report)
                        .map_err(io::Error::from)?;
                    writeln!(out, "{}", json)?;
                }
            }
            out.flush()?;
        }
    }

    Ok(())
}

fn resolve_settings(config_file: Option<&Path>, options: &RunOptions) -> Result<Settings> {
    Settings::load(config_file)?
        .apply_overrides(options)
        .validated()
}

/// The scan is CPU bound, so it runs on the blocking pool while the spinner ticks.
async fn execute(settings: &Settings, input: PathBuf, quiet: bool) -> Result<ProcessingOutcome> {
    let processor = settings.to_processor();
    info!(
        "Processing {} with {} workers",
        input.display(),
        processor.max_workers()
    );

    let outcome = tokio::task::spawn_blocking(move || {
        let progress = ProgressReporter::new_spinner("Processing measurements...", quiet);
        let result = processor.process_file(&input, Some(&progress));
        match &result {
            Ok(outcome) => progress.finish_with_message(&format!(
                "Aggregated {} stations",
                outcome.summary.len()
            )),
            Err(_) => progress.finish_and_clear(),
        }
        result
    })
    .await??;

    info!(
        "Aggregated {} bytes in {:.3?}",
        outcome.report.input_bytes, outcome.report.elapsed
    );
    Ok(outcome)
}

/// Diagnostics go to stderr or a log file, never stdout.
///
/// An already installed subscriber is kept, and `log_file` is then left untouched.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    if subscriber_installed() {
        if let Some(path) = log_file {
            warn!(
                "A log subscriber is already installed; not writing to {}",
                path.display()
            );
        }
        return Ok(());
    }

    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    let installed = match log_file {
        Some(path) => builder
            .with_writer(Mutex::new(File::create(path)?))
            .with_ansi(false)
            .try_init(),
        None => builder.with_writer(io::stderr).try_init(),
    };
    if let Err(e) = installed {
        eprintln!("warning: could not install log subscriber: {}", e);
    }
    Ok(())
}

fn subscriber_installed() -> bool {
    !tracing::dispatcher::get_default(|current| current.is::<NoSubscriber>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_validate_command_runs() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"Tokyo;23.4\nParis;5.0\nTokyo;18.1\n")?;
        file.flush()?;

        let cli = Cli::try_parse_from([
            "brc-processor",
            "--quiet",
            "validate",
            "--workers",
            "2",
            "--input-file",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        run(cli).await
    }

    #[tokio::test]
    async fn test_process_command_runs() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"Oslo;-3.0\nOslo;0.7\nLima;19.9")?;
        file.flush()?;

        let cli = Cli::try_parse_from([
            "brc-processor",
            "--quiet",
            "process",
            "--workers",
            "3",
            "--format",
            "json",
            "--table",
            "open-addressing",
            "--input-file",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        run(cli).await
    }

    #[test]
    fn test_log_file_untouched_when_subscriber_installed() -> Result<()> {
        let _ = tracing_subscriber::fmt().with_writer(io::sink).try_init();
        assert!(subscriber_installed());

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("brc.log");
        init_logging(true, Some(&path))?;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_input_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("measurements.txt");
        let cli = Cli::try_parse_from([
            "brc-processor",
            "--quiet",
            "process",
            "-w",
            "2",
            "-i",
            missing.to_str().unwrap(),
        ])
        .unwrap();

        let err = run(cli).await.unwrap_err();
        assert_eq!(err.kind(), "IOError");
        assert_eq!(err.exit_code(), 74);
    }

    #[tokio::test]
    async fn test_invalid_worker_count_reports_config_error() {
        let cli = Cli::try_parse_from(["brc-processor", "--quiet", "process", "-w", "0"]).unwrap();
        let err = run(cli).await.unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }
}
