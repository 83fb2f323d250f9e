// LogSift - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogSift";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogSift";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Dispatch
// =============================================================================

/// Default number of worker threads for classification.
/// 0 means auto-detect (use available CPU cores).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Hard upper bound on the configured worker count.
pub const MAX_WORKER_THREADS: usize = 256;

/// Maximum user-configurable run deadline (seconds). 24 hours.
pub const MAX_DEADLINE_SECS: u64 = 86_400;

// =============================================================================
// Source reading
// =============================================================================

/// File size in bytes above which the log file is memory-mapped instead of
/// read through a buffered reader.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024; // 100 MB

/// Read buffer capacity for the buffered line reader.
pub const READ_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

// =============================================================================
// Classification limits
// =============================================================================

/// Lines longer than this (in bytes) are recorded as error lines by the
/// malformed-line classifier.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024; // 64 KB

/// Minimum user-configurable maximum line length.
pub const MIN_MAX_LINE_LENGTH: usize = 256;

/// Maximum number of continuation lines collected into an exception's stack
/// excerpt.
pub const DEFAULT_MAX_STACK_LINES: usize = 50;

/// Hard upper bound on the stack excerpt length.
pub const ABSOLUTE_MAX_STACK_LINES: usize = 1_000;

/// Length cap for raw text copied into a classification result.
pub const MAX_RAW_TEXT_LEN: usize = 4 * 1024;

// =============================================================================
// Rule limits
// =============================================================================

/// Maximum number of classifier rules that can be loaded (built-in + user).
pub const MAX_RULES: usize = 200;

/// Maximum size of a rules TOML file in bytes.
pub const MAX_RULE_FILE_SIZE: u64 = 64 * 1024; // 64 KB

/// Maximum regex pattern length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
/// Prevents accidental exposure of sensitive data in long lines.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Reporting
// =============================================================================

/// Bytes per megabyte used for throughput figures (decimal, matches `ls -h --si`).
pub const BYTES_PER_MB: f64 = 1_000_000.0;

/// Every Nth completed line is echoed by the CLI progress printer.
pub const PROGRESS_REPORT_INTERVAL: u64 = 10_000;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// User rules file name (looked up in the config directory).
pub const USER_RULES_FILE_NAME: &str = "rules.toml";
