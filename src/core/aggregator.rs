// LogSift - core/aggregator.rs
//
// Thread-safe ordered aggregation of classification results.
//
// One mutex-guarded BTreeMap per result category, keyed by source line
// number. Workers call `submit` concurrently; each insert holds only the lock
// of its own category, so calls for different categories never contend and
// calls for different lines never interfere. BTreeMap keeps iteration in
// ascending line order regardless of completion order.

use crate::core::model::{
    clip_raw_text, AnalysisResult, ClassificationResult, ErrorLine, ExceptionModel, Logline,
    ProcessingSummary, RunStatus, SignalModel,
};
use crate::util::error::ClassifyError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Concurrency-safe container merging per-line outcomes.
///
/// Lives for the duration of one run and is consumed into an
/// `AnalysisResult` once every task has been drained.
#[derive(Debug, Default)]
pub struct Aggregator {
    signals: Mutex<BTreeMap<u64, SignalModel>>,
    exceptions: Mutex<BTreeMap<u64, ExceptionModel>>,
    error_lines: Mutex<BTreeMap<u64, ErrorLine>>,
    unclassified: Mutex<BTreeSet<u64>>,
    skipped: Mutex<BTreeSet<u64>>,
}

/// Lock a mutex, recovering the guard if another worker panicked while
/// holding it. A single BTreeMap insert leaves the map consistent either way.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex.into_inner().unwrap_or_else(PoisonError::into_inner)
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a result into the map matching its kind, keyed by its line.
    ///
    /// The result's id is set to its line number. A second result for the
    /// same line replaces the first (last write wins).
    pub fn submit(&self, mut result: ClassificationResult) {
        let line = result.line();
        result.set_id(line);

        let replaced = match result {
            ClassificationResult::Signal(m) => lock(&self.signals).insert(line, m).is_some(),
            ClassificationResult::Exception(m) => {
                lock(&self.exceptions).insert(line, m).is_some()
            }
            ClassificationResult::ErrorLine(m) => {
                lock(&self.error_lines).insert(line, m).is_some()
            }
        };

        if replaced {
            tracing::warn!(line, "Result for line submitted twice; keeping the latest");
        }
    }

    /// Record `line` as structurally invalid.
    ///
    /// Keyed by the line's own number so an error line can never collide
    /// with another line's entry.
    pub fn record_error_line(&self, line: &Logline, classifier: &str, reason: impl Into<String>) {
        self.submit(ClassificationResult::ErrorLine(ErrorLine {
            id: line.number,
            line: line.number,
            classifier: classifier.to_string(),
            reason: reason.into(),
            raw_text: clip_raw_text(&line.text),
        }));
    }

    /// Record a classifier failure as an error line.
    pub fn record_failure(&self, line: &Logline, error: &ClassifyError) {
        self.record_error_line(line, error.classifier(), error.to_string());
    }

    /// Record a line that no classifier matched.
    pub fn record_unclassified(&self, line_number: u64) {
        lock(&self.unclassified).insert(line_number);
    }

    /// Record a line that was not classified because the run stopped early.
    pub fn record_skipped(&self, line_number: u64) {
        lock(&self.skipped).insert(line_number);
    }

    pub fn signal_count(&self) -> usize {
        lock(&self.signals).len()
    }

    pub fn exception_count(&self) -> usize {
        lock(&self.exceptions).len()
    }

    pub fn error_count(&self) -> usize {
        lock(&self.error_lines).len()
    }

    pub fn unclassified_count(&self) -> usize {
        lock(&self.unclassified).len()
    }

    pub fn skipped_count(&self) -> usize {
        lock(&self.skipped).len()
    }

    /// Freeze the aggregate into an immutable `AnalysisResult`.
    pub fn into_result(
        self,
        log_file: PathBuf,
        total_lines: u64,
        status: RunStatus,
        summary: ProcessingSummary,
    ) -> AnalysisResult {
        AnalysisResult {
            log_file,
            signals: into_inner(self.signals),
            exceptions: into_inner(self.exceptions),
            error_lines: into_inner(self.error_lines),
            unclassified: into_inner(self.unclassified),
            skipped: into_inner(self.skipped),
            total_lines,
            status,
            summary,
        }
    }
}
