// LogSift - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies.
//
// These types are the shared vocabulary across all layers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Logline (input record)
// =============================================================================

/// One physical line of a log source.
///
/// `number` is 1-based and is the identity key of any classification result
/// produced from this line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Logline {
    /// 1-based position of the line in its source.
    pub number: u64,

    /// Line text with the trailing newline (and carriage return) removed.
    pub text: String,
}

impl Logline {
    pub fn new(number: u64, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

// =============================================================================
// Classification results
// =============================================================================

/// Discriminant of a `ClassificationResult`, used to route results into
/// the matching aggregate map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Signal,
    Exception,
    ErrorLine,
}

impl ResultKind {
    /// Returns all variants in report order.
    pub fn all() -> &'static [ResultKind] {
        &[ResultKind::Signal, ResultKind::Exception, ResultKind::ErrorLine]
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ResultKind::Signal => "Signal",
            ResultKind::Exception => "Exception",
            ResultKind::ErrorLine => "Error line",
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// An operational signal extracted from a line (e.g. `retries=3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalModel {
    /// Identity key; set to `line` when the result is aggregated.
    pub id: u64,
    pub line: u64,
    /// ID of the classifier that produced this result.
    pub classifier: String,
    pub name: String,
    pub value: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub raw_text: String,
}

/// An exception or error-level event, with any stack excerpt that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionModel {
    pub id: u64,
    pub line: u64,
    pub classifier: String,
    pub exception_type: String,
    pub message: String,
    /// Continuation lines collected after the exception line, in order.
    pub stack: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub raw_text: String,
}

/// A structurally invalid line, or a line whose classifier failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLine {
    pub id: u64,
    pub line: u64,
    /// ID of the classifier that flagged (or failed on) the line.
    pub classifier: String,
    pub reason: String,
    pub raw_text: String,
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationResult {
    Signal(SignalModel),
    Exception(ExceptionModel),
    ErrorLine(ErrorLine),
}

impl ClassificationResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Signal(_) => ResultKind::Signal,
            Self::Exception(_) => ResultKind::Exception,
            Self::ErrorLine(_) => ResultKind::ErrorLine,
        }
    }

    /// Source line number this result was produced from.
    pub fn line(&self) -> u64 {
        match self {
            Self::Signal(m) => m.line,
            Self::Exception(m) => m.line,
            Self::ErrorLine(m) => m.line,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Signal(m) => m.id,
            Self::Exception(m) => m.id,
            Self::ErrorLine(m) => m.id,
        }
    }

    pub fn set_id(&mut self, id: u64) {
        match self {
            Self::Signal(m) => m.id = id,
            Self::Exception(m) => m.id = id,
            Self::ErrorLine(m) => m.id = id,
        }
    }

    pub fn classifier(&self) -> &str {
        match self {
            Self::Signal(m) => &m.classifier,
            Self::Exception(m) => &m.classifier,
            Self::ErrorLine(m) => &m.classifier,
        }
    }
}

/// Copy `text` for storage in a result, capped at `MAX_RAW_TEXT_LEN` bytes.
pub fn clip_raw_text(text: &str) -> String {
    let max = crate::util::constants::MAX_RAW_TEXT_LEN;
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut clipped = text[..end].to_string();
    clipped.push_str("... [truncated]");
    clipped
}

// =============================================================================
// Run outcome
// =============================================================================

/// How a classification run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every line went through the classifier chain.
    #[default]
    Completed,

    /// The cancel token was set; remaining lines were skipped.
    Cancelled,

    /// The run deadline passed; remaining lines were skipped.
    DeadlineExceeded,
}

/// Throughput statistics for a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingSummary {
    /// Size of the source in bytes.
    pub bytes: u64,

    /// Lines produced by the source.
    pub lines: u64,

    /// Worker threads used.
    pub workers: usize,

    /// Wall-clock duration from source open to final aggregate.
    pub elapsed: Duration,
}

impl ProcessingSummary {
    pub fn size_mb(&self) -> f64 {
        self.bytes as f64 / crate::util::constants::BYTES_PER_MB
    }

    /// Throughput in MB/s. Zero when the run took no measurable time.
    pub fn throughput_mb_s(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.size_mb() / secs
        } else {
            0.0
        }
    }
}

// =============================================================================
// Analysis result (frozen aggregate)
// =============================================================================

/// The aggregate of one run: one ordered map per result category, keyed by
/// line number, plus the line numbers that produced no result.
///
/// Every map iterates in ascending line order, independent of the order in
/// which worker threads completed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    pub log_file: PathBuf,
    pub(crate) signals: BTreeMap<u64, SignalModel>,
    pub(crate) exceptions: BTreeMap<u64, ExceptionModel>,
    pub(crate) error_lines: BTreeMap<u64, ErrorLine>,
    pub(crate) unclassified: BTreeSet<u64>,
    pub(crate) skipped: BTreeSet<u64>,
    pub total_lines: u64,
    pub status: RunStatus,
    pub summary: ProcessingSummary,
}

impl AnalysisResult {
    pub fn signals(&self) -> &BTreeMap<u64, SignalModel> {
        &self.signals
    }

    pub fn exceptions(&self) -> &BTreeMap<u64, ExceptionModel> {
        &self.exceptions
    }

    pub fn error_lines(&self) -> &BTreeMap<u64, ErrorLine> {
        &self.error_lines
    }

    /// Line numbers no classifier matched, ascending.
    pub fn unclassified(&self) -> &BTreeSet<u64> {
        &self.unclassified
    }

    /// Line numbers never classified because the run stopped early, ascending.
    pub fn skipped(&self) -> &BTreeSet<u64> {
        &self.skipped
    }

    pub fn signal(&self, line: u64) -> Option<&SignalModel> {
        self.signals.get(&line)
    }

    pub fn exception(&self, line: u64) -> Option<&ExceptionModel> {
        self.exceptions.get(&line)
    }

    pub fn error_line(&self, line: u64) -> Option<&ErrorLine> {
        self.error_lines.get(&line)
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    pub fn error_count(&self) -> usize {
        self.error_lines.len()
    }

    pub fn unclassified_count(&self) -> usize {
        self.unclassified.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn count(&self, kind: ResultKind) -> usize {
        match kind {
            ResultKind::Signal => self.signal_count(),
            ResultKind::Exception => self.exception_count(),
            ResultKind::ErrorLine => self.error_count(),
        }
    }

    /// Category a line was classified into, if any.
    pub fn kind_of(&self, line: u64) -> Option<ResultKind> {
        if self.signals.contains_key(&line) {
            Some(ResultKind::Signal)
        } else if self.exceptions.contains_key(&line) {
            Some(ResultKind::Exception)
        } else if self.error_lines.contains_key(&line) {
            Some(ResultKind::ErrorLine)
        } else {
            None
        }
    }

    /// Every line was accounted for exactly once across all buckets.
    pub fn is_balanced(&self) -> bool {
        let accounted = self.signal_count()
            + self.exception_count()
            + self.error_count()
            + self.unclassified_count()
            + self.skipped_count();
        accounted as u64 == self.total_lines
    }
}

// =============================================================================
// Processing progress (for CLI / UI consumers)
// =============================================================================

/// Lifecycle messages forwarded from worker threads by `ChannelSink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingProgress {
    /// Dispatch is about to begin.
    Started { source: PathBuf, total_lines: u64 },

    /// One line finished (in completion order, not line order).
    LineCompleted {
        line_number: u64,
        completed: u64,
        total_lines: u64,
    },

    /// Every task has been drained.
    Finished {
        source: PathBuf,
        completed: u64,
        total_lines: u64,
    },
}
