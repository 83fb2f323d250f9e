// LogSift - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation between layers.
// All errors preserve the causal chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogSift operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogSiftError {
    /// The log source could not be opened or read.
    Source(SourceError),

    /// The classification run could not be dispatched.
    Dispatch(DispatchError),

    /// Export operation failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),
}

impl fmt::Display for LogSiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(e) => write!(f, "Source error: {e}"),
            Self::Dispatch(e) => write!(f, "Dispatch error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for LogSiftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(e) => Some(e),
            Self::Dispatch(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl LogSiftError {
    /// The underlying I/O error kind, if this error was caused by I/O.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Source(e) | Self::Dispatch(DispatchError::Source(e)) => {
                Some(e.io_error().kind())
            }
            Self::Export(ExportError::Io { source, .. })
            | Self::Config(ConfigError::Io { source, .. }) => Some(source.kind()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

/// Errors related to classifier rule loading and validation. Never fatal:
/// the failing rule is skipped and the error is reported as a warning.
#[derive(Debug)]
pub enum RulesError {
    /// TOML file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Rule file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// A required field is missing from the rule definition.
    MissingField {
        rule_id: String,
        field: &'static str,
    },

    /// The rule's pattern lacks a capture group its kind requires.
    MissingCaptureGroup {
        rule_id: String,
        group: &'static str,
    },

    /// A regex pattern in the rule is invalid.
    InvalidRegex {
        rule_id: String,
        field: &'static str,
        pattern: String,
        source: regex::Error,
    },

    /// A regex pattern exceeds the maximum allowed length.
    RegexTooLong {
        rule_id: String,
        field: &'static str,
        length: usize,
        max_length: usize,
    },

    /// Two rules share the same ID.
    DuplicateId { id: String },

    /// Maximum number of rules exceeded.
    TooManyRules { count: usize, max: usize },

    /// I/O error reading a rule file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for RulesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Rule file '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::MissingField { rule_id, field } => {
                write!(f, "Rule '{rule_id}': missing required field '{field}'")
            }
            Self::MissingCaptureGroup { rule_id, group } => write!(
                f,
                "Rule '{rule_id}': pattern has no '(?P<{group}>...)' capture group"
            ),
            Self::InvalidRegex {
                rule_id,
                field,
                pattern,
                source,
            } => write!(
                f,
                "Rule '{rule_id}': invalid regex in '{field}' ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                rule_id,
                field,
                length,
                max_length,
            } => write!(
                f,
                "Rule '{rule_id}': regex in '{field}' is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::DuplicateId { id } => write!(f, "Duplicate rule ID '{id}'"),
            Self::TooManyRules { count, max } => {
                write!(f, "Too many rules loaded ({count}), maximum is {max}")
            }
            Self::Io { path, source } => {
                write!(f, "I/O error reading rules '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for RulesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Errors opening or reading a log source. Always fatal to the run.
#[derive(Debug)]
pub enum SourceError {
    /// The log file could not be opened.
    Open { path: PathBuf, source: io::Error },

    /// File metadata (size) could not be read.
    Metadata { path: PathBuf, source: io::Error },

    /// Reading a line failed part-way through the file.
    Read {
        path: PathBuf,
        line_number: u64,
        source: io::Error,
    },
}

impl SourceError {
    /// The I/O error that caused this failure.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::Open { source, .. }
            | Self::Metadata { source, .. }
            | Self::Read { source, .. } => source,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open '{}': {source}", path.display())
            }
            Self::Metadata { path, source } => {
                write!(f, "Cannot read metadata of '{}': {source}", path.display())
            }
            Self::Read {
                path,
                line_number,
                source,
            } => write!(
                f,
                "'{}' line {line_number}: read failed: {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.io_error())
    }
}

impl From<SourceError> for LogSiftError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

// ---------------------------------------------------------------------------
// Classify errors
// ---------------------------------------------------------------------------

/// A classifier failed on a specific line. Never fatal: the dispatcher turns
/// it into an error-line entry and carries on with the remaining lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// The classifier's predicate matched but a required field was absent.
    MissingField {
        classifier: String,
        line_number: u64,
        field: &'static str,
    },

    /// The classifier rejected the line for another reason.
    Invalid {
        classifier: String,
        line_number: u64,
        reason: String,
    },

    /// The classifier panicked while handling the line.
    Panicked {
        classifier: String,
        line_number: u64,
        message: String,
    },
}

impl ClassifyError {
    /// Line number the failure happened on.
    pub fn line_number(&self) -> u64 {
        match self {
            Self::MissingField { line_number, .. }
            | Self::Invalid { line_number, .. }
            | Self::Panicked { line_number, .. } => *line_number,
        }
    }

    /// ID of the classifier that failed.
    pub fn classifier(&self) -> &str {
        match self {
            Self::MissingField { classifier, .. }
            | Self::Invalid { classifier, .. }
            | Self::Panicked { classifier, .. } => classifier,
        }
    }
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField {
                classifier,
                line_number,
                field,
            } => write!(
                f,
                "classifier '{classifier}' line {line_number}: missing field '{field}'"
            ),
            Self::Invalid {
                classifier,
                line_number,
                reason,
            } => write!(f, "classifier '{classifier}' line {line_number}: {reason}"),
            Self::Panicked {
                classifier,
                line_number,
                message,
            } => write!(
                f,
                "classifier '{classifier}' panicked on line {line_number}: {message}"
            ),
        }
    }
}

impl std::error::Error for ClassifyError {}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors that abort a classification run before any line is dispatched.
#[derive(Debug)]
pub enum DispatchError {
    /// The source failed while being drained.
    Source(SourceError),

    /// The worker pool could not be created.
    PoolBuild {
        workers: usize,
        source: rayon::ThreadPoolBuildError,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(e) => write!(f, "{e}"),
            Self::PoolBuild { workers, source } => {
                write!(f, "Cannot start worker pool of {workers} threads: {source}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(e) => Some(e),
            Self::PoolBuild { source, .. } => Some(source),
        }
    }
}

impl From<SourceError> for DispatchError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

impl From<DispatchError> for LogSiftError {
    fn from(e: DispatchError) -> Self {
        match e {
            // Source failures keep their own category so callers can match on them.
            DispatchError::Source(s) => Self::Source(s),
            other => Self::Dispatch(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for LogSiftError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogSiftError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
