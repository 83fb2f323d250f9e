// LogSift - platform/config.rs
//
// Platform directory resolution and config.toml loading with startup
// validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for LogSift configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logsift/ or %APPDATA%\LogSift\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }

    /// Default location of the user rule file, loaded when present.
    pub fn user_rules_file(&self) -> PathBuf {
        self.config_dir.join(constants::USER_RULES_FILE_NAME)
    }
}

// =============================================================================
// config.toml
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are ignored so a newer config file still loads.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub processing: ProcessingSection,
    pub rules: RulesSection,
    pub logging: LoggingSection,
}

/// `[processing]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    /// Number of worker threads (0 = one per core).
    pub worker_threads: Option<usize>,
    /// Run deadline in seconds (absent = unbounded).
    pub deadline_secs: Option<u64>,
    /// Lines longer than this are flagged as malformed.
    pub max_line_length: Option<usize>,
    /// Cap on continuation lines collected per exception.
    pub max_stack_lines: Option<usize>,
    /// Files at or above this size are memory-mapped.
    pub large_file_threshold_bytes: Option<u64>,
}

/// `[rules]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RulesSection {
    /// User rule file appended after the built-in rules.
    pub user_rules_file: Option<String>,
    /// Set false to run only user rules.
    pub builtin: Option<bool>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub worker_threads: usize,
    pub deadline: Option<Duration>,
    pub max_line_length: usize,
    pub max_stack_lines: usize,
    pub large_file_threshold: u64,
    pub user_rules_file: Option<PathBuf>,
    pub builtin_rules: bool,
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_threads: constants::DEFAULT_WORKER_THREADS,
            deadline: None,
            max_line_length: constants::DEFAULT_MAX_LINE_LENGTH,
            max_stack_lines: constants::DEFAULT_MAX_STACK_LINES,
            large_file_threshold: constants::DEFAULT_LARGE_FILE_THRESHOLD,
            user_rules_file: None,
            builtin_rules: true,
            log_level: None,
        }
    }
}

fn out_of_range(field: &str, value: impl ToString, expected: String) -> ConfigError {
    ConfigError::ValueOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Parse and validate config text.
///
/// A syntax error is fatal. Out-of-range values are returned alongside the
/// config, which keeps the default for each rejected field.
pub fn parse_config(
    content: &str,
    config_path: &Path,
) -> Result<(AppConfig, Vec<ConfigError>), ConfigError> {
    let raw: RawConfig = toml::from_str(content).map_err(|e| ConfigError::TomlParse {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    let mut config = AppConfig::default();
    let mut rejected = Vec::new();

    if let Some(n) = raw.processing.worker_threads {
        if n <= constants::MAX_WORKER_THREADS {
            config.worker_threads = n;
        } else {
            rejected.push(out_of_range(
                "processing.worker_threads",
                n,
                format!("0-{} (0 = one per core)", constants::MAX_WORKER_THREADS),
            ));
        }
    }

    if let Some(secs) = raw.processing.deadline_secs {
        if (1..=constants::MAX_DEADLINE_SECS).contains(&secs) {
            config.deadline = Some(Duration::from_secs(secs));
        } else {
            rejected.push(out_of_range(
                "processing.deadline_secs",
                secs,
                format!("1-{}", constants::MAX_DEADLINE_SECS),
            ));
        }
    }

    if let Some(len) = raw.processing.max_line_length {
        if len >= constants::MIN_MAX_LINE_LENGTH {
            config.max_line_length = len;
        } else {
            rejected.push(out_of_range(
                "processing.max_line_length",
                len,
                format!("at least {}", constants::MIN_MAX_LINE_LENGTH),
            ));
        }
    }

    if let Some(n) = raw.processing.max_stack_lines {
        if n <= constants::ABSOLUTE_MAX_STACK_LINES {
            config.max_stack_lines = n;
        } else {
            rejected.push(out_of_range(
                "processing.max_stack_lines",
                n,
                format!("0-{}", constants::ABSOLUTE_MAX_STACK_LINES),
            ));
        }
    }

    if let Some(bytes) = raw.processing.large_file_threshold_bytes {
        if bytes > 0 {
            config.large_file_threshold = bytes;
        } else {
            rejected.push(out_of_range(
                "processing.large_file_threshold_bytes",
                bytes,
                "greater than 0".to_string(),
            ));
        }
    }

    if let Some(file) = raw.rules.user_rules_file.filter(|f| !f.is_empty()) {
        config.user_rules_file = Some(PathBuf::from(file));
    }
    if let Some(builtin) = raw.rules.builtin {
        config.builtin_rules = builtin;
    }

    if let Some(level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            rejected.push(out_of_range(
                "logging.level",
                &level,
                "one of error, warn, info, debug, trace".to_string(),
            ));
        }
    }

    Ok((config, rejected))
}

/// Load a config file that must exist (e.g. passed with `--config`).
pub fn load_config_file(config_path: &Path) -> Result<(AppConfig, Vec<ConfigError>), ConfigError> {
    let content = std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
        path: config_path.to_path_buf(),
        source: e,
    })?;
    let loaded = parse_config(&content, config_path)?;
    tracing::info!(path = %config_path.display(), "Loaded config.toml");
    Ok(loaded)
}

/// Load and validate the default `config.toml`.
///
/// Returns the config and a list of non-fatal warnings. A missing file is a
/// first run: defaults, no warnings. An unreadable or unparseable file also
/// yields defaults, with the failure reported as a warning.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    match load_config_file(config_path) {
        Ok((config, rejected)) => {
            let warnings: Vec<String> = rejected
                .iter()
                .map(|e| format!("{e}. Using default."))
                .collect();
            if !warnings.is_empty() {
                tracing::warn!(count = warnings.len(), "Config validation produced warnings");
            }
            (config, warnings)
        }
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            (AppConfig::default(), vec![msg])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> (AppConfig, Vec<ConfigError>) {
        parse_config(content, Path::new("config.toml")).unwrap()
    }

    #[test]
    fn test_empty_config_is_default() {
        let (config, rejected) = parse("");
        assert_eq!(config, AppConfig::default());
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_valid_values_applied() {
        let (config, rejected) = parse(
            r#"
[processing]
worker_threads = 4
deadline_secs = 30
max_stack_lines = 10

[rules]
user_rules_file = "/etc/logsift/rules.toml"
builtin = false

[logging]
level = "DEBUG"
"#,
        );
        assert!(rejected.is_empty());
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.deadline, Some(Duration::from_secs(30)));
        assert_eq!(config.max_stack_lines, 10);
        assert_eq!(
            config.user_rules_file,
            Some(PathBuf::from("/etc/logsift/rules.toml"))
        );
        assert!(!config.builtin_rules);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let (config, rejected) = parse(
            r#"
[processing]
worker_threads = 100000
max_line_length = 10
deadline_secs = 0

[logging]
level = "loud"
"#,
        );
        assert_eq!(rejected.len(), 4);
        assert_eq!(config.worker_threads, constants::DEFAULT_WORKER_THREADS);
        assert_eq!(config.max_line_length, constants::DEFAULT_MAX_LINE_LENGTH);
        assert_eq!(config.deadline, None);
        assert_eq!(config.log_level, None);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (_, rejected) = parse("[ui]\ntheme = \"dark\"\n");
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let err = parse_config("[processing\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
    }

    #[test]
    fn test_load_missing_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(&dir.path().join("config.toml"));
        assert_eq!(config, AppConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_unparseable_config_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let (config, warnings) = load_config(&path);
        assert_eq!(config, AppConfig::default());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_load_config_file_missing_is_error() {
        let err = load_config_file(Path::new("/nonexistent/logsift.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
