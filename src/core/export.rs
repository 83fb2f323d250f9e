// LogSift - core/export.rs
//
// CSV and JSON export of an analysis result.
// Core layer: writes to any Write implementor; callers own the file.

use crate::core::model::{AnalysisResult, ResultKind};
use crate::util::error::ExportError;
use std::io::Write;
use std::path::Path;

/// One flattened CSV row.
struct Row<'a> {
    line: u64,
    kind: ResultKind,
    classifier: &'a str,
    label: &'a str,
    detail: String,
    timestamp: String,
}

fn rows(result: &AnalysisResult) -> Vec<Row<'_>> {
    let fmt_ts = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.to_rfc3339()).unwrap_or_default()
    };

    let mut rows: Vec<Row<'_>> = Vec::with_capacity(
        result.signal_count() + result.exception_count() + result.error_count(),
    );
    rows.extend(result.signals().values().map(|s| Row {
        line: s.line,
        kind: ResultKind::Signal,
        classifier: &s.classifier,
        label: &s.name,
        detail: s.value.clone(),
        timestamp: fmt_ts(s.timestamp),
    }));
    rows.extend(result.exceptions().values().map(|e| Row {
        line: e.line,
        kind: ResultKind::Exception,
        classifier: &e.classifier,
        label: &e.exception_type,
        detail: if e.stack.is_empty() {
            e.message.clone()
        } else {
            format!("{} (+{} stack lines)", e.message, e.stack.len())
        },
        timestamp: fmt_ts(e.timestamp),
    }));
    rows.extend(result.error_lines().values().map(|e| Row {
        line: e.line,
        kind: ResultKind::ErrorLine,
        classifier: &e.classifier,
        label: "",
        detail: e.reason.clone(),
        timestamp: String::new(),
    }));

    // Each line lives in exactly one map, so the key is unique.
    rows.sort_unstable_by_key(|r| r.line);
    rows
}

/// Export every classified line to CSV, in ascending line order.
///
/// Columns: line, kind, classifier, label, detail, timestamp.
/// Returns the number of data rows written.
pub fn export_csv<W: Write>(
    result: &AnalysisResult,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(["line", "kind", "classifier", "label", "detail", "timestamp"])
        .map_err(csv_err)?;

    let rows = rows(result);
    for row in &rows {
        csv_writer
            .write_record([
                row.line.to_string().as_str(),
                row.kind.label(),
                row.classifier,
                row.label,
                row.detail.as_str(),
                row.timestamp.as_str(),
            ])
            .map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(path = %export_path.display(), rows = rows.len(), "CSV export written");
    Ok(rows.len())
}

/// Export the full result (all maps, status and summary) as pretty JSON.
///
/// Returns the number of classified lines in the document.
pub fn export_json<W: Write>(
    result: &AnalysisResult,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    serde_json::to_writer_pretty(writer, result).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    let count = result.signal_count() + result.exception_count() + result.error_count();
    tracing::debug!(path = %export_path.display(), results = count, "JSON export written");
    Ok(count)
}
