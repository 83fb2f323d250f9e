// LogSift - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading and logging initialisation (debug mode support)
// 3. Classifier chain assembly (built-in + user rules)
// 4. The classification run with console progress
// 5. Report output and optional CSV/JSON export

use clap::Parser;
use logsift::app::processor::LogProcessor;
use logsift::app::report;
use logsift::core::export;
use logsift::core::lifecycle::ChannelSink;
use logsift::core::model::{AnalysisResult, ProcessingProgress, RunStatus};
use logsift::platform::config::{self, AppConfig, PlatformPaths};
use logsift::util::error::{ExportError, LogSiftError};
use logsift::util::{constants, logging};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// LogSift - parallel log line classifier.
///
/// Classifies every line of a log file into signals, exceptions and error
/// lines using an ordered chain of rules, then prints a statistics report.
#[derive(Parser, Debug)]
#[command(name = "logsift", version, about)]
struct Cli {
    /// Log file to classify.
    file: PathBuf,

    /// Additional rule file appended after the built-in rules.
    #[arg(short = 'r', long = "rules")]
    rules: Option<PathBuf>,

    /// Worker threads (0 = one per core).
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Skip lines not yet started after this many seconds.
    #[arg(long = "deadline-secs")]
    deadline_secs: Option<u64>,

    /// Write the full result as JSON to this path.
    #[arg(long = "json")]
    json: Option<PathBuf>,

    /// Write classified lines as CSV to this path.
    #[arg(long = "csv")]
    csv: Option<PathBuf>,

    /// Config file (defaults to config.toml in the platform config directory).
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Suppress progress output.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

/// Exit code when the run stopped before every line was classified.
const EXIT_INCOMPLETE: i32 = 2;

fn main() {
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "LogSift failed");
            eprintln!("Error: {e}");
            1
        }
    };
    std::process::exit(code);
}

/// Full CLI run. Returns the process exit code; fatal errors propagate.
fn run(cli: &Cli) -> Result<i32, LogSiftError> {
    let paths = PlatformPaths::resolve();

    // Config is loaded before logging so its level can apply; its warnings
    // are reported once the subscriber exists.
    let (mut app_config, warnings): (AppConfig, Vec<String>) = match cli.config.as_deref() {
        Some(path) => match config::load_config_file(path) {
            Ok((c, rejected)) => (
                c,
                rejected
                    .iter()
                    .map(|e| format!("{e}. Using default."))
                    .collect(),
            ),
            Err(e) => {
                logging::init(cli.debug, None);
                return Err(e.into());
            }
        },
        None => config::load_config(&paths.config_file()),
    };

    logging::init(cli.debug, app_config.log_level.as_deref());
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        file = %cli.file.display(),
        "LogSift starting"
    );

    apply_overrides(cli, &mut app_config);

    // Rule file: CLI > config > rules.toml in the config directory if present.
    let default_rules = paths.user_rules_file();
    let user_rules = cli
        .rules
        .as_deref()
        .or(app_config.user_rules_file.as_deref())
        .or_else(|| default_rules.is_file().then_some(default_rules.as_path()));

    let (mut processor, rule_errors) = LogProcessor::from_config(&app_config, user_rules);
    for err in &rule_errors {
        tracing::warn!(error = %err, "Rule loading warning");
        eprintln!("Warning: {err}");
    }

    let (sink, rx) = ChannelSink::channel();
    processor.set_sink(Arc::new(sink));
    let quiet = cli.quiet;
    let progress = std::thread::Builder::new()
        .name("logsift-progress".to_string())
        .spawn(move || print_progress(rx, quiet));

    let outcome = processor.process(&cli.file);
    // Dropping the processor drops the last sender and ends the progress thread.
    drop(processor);
    match progress {
        Ok(handle) => {
            let _ = handle.join();
        }
        Err(e) => tracing::warn!(error = %e, "Progress thread could not be started"),
    }

    let result = outcome?;
    print!("{}", report::format_report(&result));

    // Both exports are attempted even if the first one fails.
    let mut export_failed = false;
    if let Some(ref path) = cli.json {
        export_failed |= !report_export(
            write_export(path, |f| export::export_json(&result, f, path)),
            path,
            "JSON",
        );
    }
    if let Some(ref path) = cli.csv {
        export_failed |= !report_export(
            write_export(path, |f| export::export_csv(&result, f, path)),
            path,
            "CSV",
        );
    }

    Ok(exit_code(&result, export_failed))
}

fn apply_overrides(cli: &Cli, app_config: &mut AppConfig) {
    if let Some(workers) = cli.workers {
        app_config.worker_threads = workers.min(constants::MAX_WORKER_THREADS);
    }
    if let Some(secs) = cli.deadline_secs {
        app_config.deadline = Some(Duration::from_secs(
            secs.min(constants::MAX_DEADLINE_SECS),
        ));
    }
}

fn print_progress(rx: Receiver<ProcessingProgress>, quiet: bool) {
    for event in rx {
        if quiet {
            continue;
        }
        match event {
            ProcessingProgress::Started {
                source,
                total_lines,
            } => eprintln!("Classifying {} ({total_lines} lines)", source.display()),
            ProcessingProgress::LineCompleted {
                completed,
                total_lines,
                ..
            } if completed % constants::PROGRESS_REPORT_INTERVAL == 0 => {
                eprintln!("  {completed}/{total_lines} lines");
            }
            ProcessingProgress::LineCompleted { .. } => {}
            ProcessingProgress::Finished { completed, .. } => {
                eprintln!("Done: {completed} lines classified");
            }
        }
    }
}

/// Create `path` and run `write` on it.
fn write_export<F>(path: &Path, write: F) -> Result<usize, LogSiftError>
where
    F: FnOnce(BufWriter<File>) -> Result<usize, ExportError>,
{
    let file = File::create(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(write(BufWriter::new(file))?)
}

/// Log the outcome of one export. Returns false on failure.
fn report_export(outcome: Result<usize, LogSiftError>, path: &Path, label: &str) -> bool {
    match outcome {
        Ok(count) => {
            tracing::info!(path = %path.display(), count, format = label, "Export written");
            eprintln!("{label} export: {count} results -> {}", path.display());
            true
        }
        Err(e) => {
            tracing::error!(error = %e, format = label, "Export failed");
            eprintln!("Error: {e}");
            false
        }
    }
}

fn exit_code(result: &AnalysisResult, export_failed: bool) -> i32 {
    if export_failed {
        1
    } else if result.status != RunStatus::Completed {
        EXIT_INCOMPLETE
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_export_missing_directory_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.csv");
        let err = write_export(&path, |_| Ok(0)).unwrap_err();
        assert!(matches!(err, LogSiftError::Export(ExportError::Io { .. })));
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
        assert!(!report_export(Err(err), &path, "CSV"));
    }

    #[test]
    fn test_write_export_propagates_writer_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        assert_eq!(write_export(&path, |_| Ok(3)).unwrap(), 3);
        assert!(path.is_file());
    }

    #[test]
    fn test_bad_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[processing\nworker_threads = ").unwrap();
        let cli = Cli::parse_from(["logsift", "app.log", "--config", path.to_str().unwrap()]);
        let err = run(&cli).unwrap_err();
        assert!(matches!(err, LogSiftError::Config(_)));
    }
}
