// LogSift - core/lifecycle.rs
//
// Lifecycle notifications for a classification run: start, one progress
// event per completed line, and end.
//
// The progress event fires from whichever worker finished the line, in
// completion order. Sinks must therefore be Send + Sync; the notifier itself
// holds only an immutable sink reference and an atomic completion counter.
// A sink that panics loses that one event; the run carries on.

use crate::core::model::ProcessingProgress;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

/// Context passed with every lifecycle notification.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    /// The source being processed.
    pub source: &'a Path,

    /// Lines produced by the source.
    pub total_lines: u64,

    /// Lines finished so far, including the one this event reports.
    pub completed_lines: u64,

    /// Line that just completed (progress events only).
    pub line_number: Option<u64>,
}

/// Consumer of lifecycle notifications. Every method defaults to a no-op.
pub trait LifecycleSink: Send + Sync {
    fn start_processing(&self, _ctx: &EventContext<'_>) {}

    /// Called once per line from arbitrary worker threads.
    fn progress_of_processing(&self, _ctx: &EventContext<'_>) {}

    fn end_of_processing(&self, _ctx: &EventContext<'_>) {}
}

/// Per-run relay from the dispatcher to an optional sink.
pub struct Notifier<'a> {
    sink: Option<&'a dyn LifecycleSink>,
    source: &'a Path,
    total_lines: u64,
    completed: AtomicU64,
}

impl fmt::Debug for Notifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("has_sink", &self.sink.is_some())
            .field("source", &self.source)
            .field("total_lines", &self.total_lines)
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<'a> Notifier<'a> {
    pub fn new(sink: Option<&'a dyn LifecycleSink>, source: &'a Path, total_lines: u64) -> Self {
        Self {
            sink,
            source,
            total_lines,
            completed: AtomicU64::new(0),
        }
    }

    fn context(&self, completed_lines: u64, line_number: Option<u64>) -> EventContext<'a> {
        EventContext {
            source: self.source,
            total_lines: self.total_lines,
            completed_lines,
            line_number,
        }
    }

    /// Run one sink callback, containing any panic it raises.
    fn deliver<F>(&self, event: &'static str, ctx: &EventContext<'_>, call: F)
    where
        F: FnOnce(&dyn LifecycleSink, &EventContext<'_>),
    {
        let Some(sink) = self.sink else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| call(sink, ctx))) {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::warn!(
                event,
                line = ?ctx.line_number,
                panic = %message,
                "Lifecycle sink panicked; event dropped"
            );
        }
    }

    pub fn start(&self) {
        self.deliver("start", &self.context(0, None), |sink, ctx| {
            sink.start_processing(ctx)
        });
    }

    /// Count `line_number` as completed and notify the sink.
    pub fn progress(&self, line_number: u64) {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        self.deliver(
            "progress",
            &self.context(completed, Some(line_number)),
            |sink, ctx| sink.progress_of_processing(ctx),
        );
    }

    pub fn end(&self) {
        self.deliver("end", &self.context(self.completed(), None), |sink, ctx| {
            sink.end_of_processing(ctx)
        });
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}

// =============================================================================
// Channel sink
// =============================================================================

/// Forwards lifecycle events as `ProcessingProgress` messages.
///
/// Send errors are ignored: a dropped receiver means nobody is listening.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProcessingProgress>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ProcessingProgress>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<ProcessingProgress>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl LifecycleSink for ChannelSink {
    fn start_processing(&self, ctx: &EventContext<'_>) {
        let _ = self.tx.send(ProcessingProgress::Started {
            source: ctx.source.to_path_buf(),
            total_lines: ctx.total_lines,
        });
    }

    fn progress_of_processing(&self, ctx: &EventContext<'_>) {
        let _ = self.tx.send(ProcessingProgress::LineCompleted {
            line_number: ctx.line_number.unwrap_or_default(),
            completed: ctx.completed_lines,
            total_lines: ctx.total_lines,
        });
    }

    fn end_of_processing(&self, ctx: &EventContext<'_>) {
        let _ = self.tx.send(ProcessingProgress::Finished {
            source: ctx.source.to_path_buf(),
            completed: ctx.completed_lines,
            total_lines: ctx.total_lines,
        });
    }
}
