// LogSift - core/source.rs
//
// Log source abstraction. The core consumes lines and the byte size; it
// never parses file syntax or touches the filesystem itself. The
// filesystem-backed implementation lives in platform::fs.

use crate::core::model::Logline;
use crate::util::error::SourceError;
use std::path::{Path, PathBuf};

/// A producer of `Logline` records.
///
/// `next_line` yields each physical line exactly once, in original order,
/// numbered from 1. After `None` the source is exhausted.
pub trait LogSource {
    /// Path (or pseudo-path) identifying the source in reports.
    fn path(&self) -> &Path;

    /// Size of the underlying data in bytes, for throughput reporting.
    fn size_bytes(&self) -> u64;

    /// Produce the next line, or `None` once the source is exhausted.
    fn next_line(&mut self) -> Option<Result<Logline, SourceError>>;

    /// Release any underlying handle. Further `next_line` calls return `None`.
    fn close(&mut self) {}
}

/// Read every remaining line from `source` and close it.
///
/// The first read failure aborts the drain and is returned.
pub fn drain(source: &mut dyn LogSource) -> Result<Vec<Logline>, SourceError> {
    let mut lines = Vec::new();
    while let Some(next) = source.next_line() {
        match next {
            Ok(line) => lines.push(line),
            Err(e) => {
                source.close();
                return Err(e);
            }
        }
    }
    source.close();

    tracing::debug!(
        source = %source.path().display(),
        lines = lines.len(),
        "Source drained"
    );
    Ok(lines)
}

// =============================================================================
// In-memory source
// =============================================================================

/// A source backed by lines already held in memory.
#[derive(Debug)]
pub struct MemorySource {
    path: PathBuf,
    lines: std::vec::IntoIter<String>,
    next_number: u64,
    size: u64,
}

impl MemorySource {
    pub fn new<I, S>(path: impl Into<PathBuf>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        // Each line plus its newline.
        let size = lines.iter().map(|l| l.len() as u64 + 1).sum();
        Self {
            path: path.into(),
            lines: lines.into_iter(),
            next_number: 1,
            size,
        }
    }

    /// Split `text` on line endings (`\n` or `\r\n`).
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        let mut source = Self::new(path, text.lines());
        source.size = text.len() as u64;
        source
    }
}

impl LogSource for MemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size_bytes(&self) -> u64 {
        self.size
    }

    fn next_line(&mut self) -> Option<Result<Logline, SourceError>> {
        let text = self.lines.next()?;
        let line = Logline::new(self.next_number, text);
        self.next_number += 1;
        Some(Ok(line))
    }

    fn close(&mut self) {
        self.lines = Vec::new().into_iter();
    }
}
