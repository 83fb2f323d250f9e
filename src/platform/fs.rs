// LogSift - platform/fs.rs
//
// Filesystem-backed log source.
//
// Small files are streamed through a buffered reader. Files at or above the
// configured threshold are memory-mapped and split in place, which avoids
// one read syscall per buffer refill on multi-gigabyte logs.
//
// Lines are decoded as lossy UTF-8: invalid sequences become U+FFFD and are
// left for the malformed-line classifier to flag.

use crate::core::model::Logline;
use crate::core::source::LogSource;
use crate::util::constants;
use crate::util::error::SourceError;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry delays for transient open failures.
const OPEN_RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

enum Backend {
    Buffered(BufReader<File>),
    Mapped { map: memmap2::Mmap, pos: usize },
    Closed,
}

/// A log file opened for line-by-line reading.
pub struct LogFile {
    path: PathBuf,
    size: u64,
    backend: Backend,
    next_number: u64,
    buf: Vec<u8>,
}

impl std::fmt::Debug for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Buffered(_) => "buffered",
            Backend::Mapped { .. } => "mapped",
            Backend::Closed => "closed",
        };
        f.debug_struct("LogFile")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("backend", &backend)
            .field("next_number", &self.next_number)
            .finish()
    }
}

fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

fn open_with_retry(path: &Path) -> io::Result<File> {
    let mut attempt = 0;
    loop {
        match File::open(path) {
            Ok(f) => return Ok(f),
            Err(e) if is_transient_error(&e) && attempt < OPEN_RETRY_DELAYS_MS.len() => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error opening log, retrying"
                );
                std::thread::sleep(Duration::from_millis(OPEN_RETRY_DELAYS_MS[attempt]));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Strip a trailing `\n` and an optional `\r` before it.
fn trim_line_ending(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

impl LogFile {
    /// Open `path`. Files of `large_threshold` bytes or more are mapped.
    pub fn open(path: &Path, large_threshold: u64) -> Result<Self, SourceError> {
        let file = open_with_retry(path).map_err(|e| SourceError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let size = file
            .metadata()
            .map_err(|e| SourceError::Metadata {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();

        // An empty file cannot be mapped on every platform.
        let backend = if size >= large_threshold && size > 0 {
            // SAFETY: the map is read-only and never mutated. A file truncated
            // by another process while mapped can fault; log files being
            // classified are treated as already written.
            let map = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| SourceError::Open {
                path: path.to_path_buf(),
                source: e,
            })?;
            Backend::Mapped { map, pos: 0 }
        } else {
            Backend::Buffered(BufReader::with_capacity(constants::READ_BUFFER_SIZE, file))
        };

        tracing::debug!(
            file = %path.display(),
            size,
            mapped = matches!(backend, Backend::Mapped { .. }),
            "Log file opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            size,
            backend,
            next_number: 1,
            buf: Vec::new(),
        })
    }

    /// Whether the file is being read through a memory map.
    pub fn is_mapped(&self) -> bool {
        matches!(self.backend, Backend::Mapped { .. })
    }

    fn emit(&mut self, bytes: &[u8]) -> Logline {
        let text = String::from_utf8_lossy(trim_line_ending(bytes)).into_owned();
        let line = Logline::new(self.next_number, text);
        self.next_number += 1;
        line
    }
}

impl LogSource for LogFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size_bytes(&self) -> u64 {
        self.size
    }

    fn next_line(&mut self) -> Option<Result<Logline, SourceError>> {
        match &mut self.backend {
            Backend::Closed => None,
            Backend::Buffered(reader) => {
                self.buf.clear();
                match reader.read_until(b'\n', &mut self.buf) {
                    Ok(0) => None,
                    Ok(_) => {
                        let bytes = std::mem::take(&mut self.buf);
                        let line = self.emit(&bytes);
                        self.buf = bytes;
                        Some(Ok(line))
                    }
                    Err(e) => Some(Err(SourceError::Read {
                        path: self.path.clone(),
                        line_number: self.next_number,
                        source: e,
                    })),
                }
            }
            Backend::Mapped { map, pos } => {
                let rest = map.get(*pos..)?;
                if rest.is_empty() {
                    return None;
                }
                let end = rest
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(rest.len(), |i| i + 1);
                let text =
                    String::from_utf8_lossy(trim_line_ending(&rest[..end])).into_owned();
                *pos += end;
                let line = Logline::new(self.next_number, text);
                self.next_number += 1;
                Some(Ok(line))
            }
        }
    }

    fn close(&mut self) {
        self.backend = Backend::Closed;
    }
}
