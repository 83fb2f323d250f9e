// LogSift - app/report.rs
//
// Plain-text run report for the console.

use crate::core::model::{AnalysisResult, ResultKind, RunStatus};
use std::fmt::Write;

/// Maximum exceptions listed individually in the report.
const MAX_LISTED_EXCEPTIONS: usize = 10;

/// Render the statistics block and the first few exceptions of a run.
pub fn format_report(result: &AnalysisResult) -> String {
    let summary = &result.summary;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "File:          {}", result.log_file.display());
    let _ = writeln!(out, "Size:          {:.2} MB", summary.size_mb());
    let _ = writeln!(out, "Lines:         {}", result.total_lines);
    let _ = writeln!(out, "Workers:       {}", summary.workers);
    let _ = writeln!(
        out,
        "Elapsed:       {:.3} s ({:.2} MB/s)",
        summary.elapsed.as_secs_f64(),
        summary.throughput_mb_s()
    );
    let _ = writeln!(out, "Status:        {}", status_label(result.status));
    let _ = writeln!(out);

    for kind in ResultKind::all() {
        let _ = writeln!(out, "{:<14} {}", format!("{}s:", kind.label()), result.count(*kind));
    }
    let _ = writeln!(out, "{:<14} {}", "Unclassified:", result.unclassified_count());
    if result.skipped_count() > 0 {
        let _ = writeln!(out, "{:<14} {}", "Skipped:", result.skipped_count());
    }

    if result.exception_count() > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Exceptions:");
        for e in result.exceptions().values().take(MAX_LISTED_EXCEPTIONS) {
            let _ = write!(out, "  line {:>6}  {}: {}", e.line, e.exception_type, e.message);
            if !e.stack.is_empty() {
                let _ = write!(out, " (+{} stack lines)", e.stack.len());
            }
            let _ = writeln!(out);
        }
        let more = result.exception_count().saturating_sub(MAX_LISTED_EXCEPTIONS);
        if more > 0 {
            let _ = writeln!(out, "  ... and {more} more");
        }
    }

    out
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => "completed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::DeadlineExceeded => "deadline exceeded",
    }
}
