// LogSift - core/dispatcher.rs
//
// Parallel fan-out of one classification task per line.
//
// Architecture:
//   - The source is drained up front; a read failure aborts the run before
//     anything is dispatched.
//   - A fixed-size rayon pool (one thread per core unless configured) runs
//     the tasks. `ThreadPool::scope` is the only barrier: it blocks until
//     every spawned task has finished, with no polling.
//   - Every task gets immutable references to the chain, the source context,
//     the notifier, and the aggregator. The aggregator is the only state
//     mutated concurrently.
//   - A `CancelToken` and an optional deadline are checked when a task starts,
//     before the chain runs. Lines not classified for that reason are
//     recorded as skipped.
//
// All lines are enqueued eagerly; queue memory grows with input size.

use crate::core::aggregator::Aggregator;
use crate::core::classifier::{ChainOutcome, ClassifierChain, SourceContext};
use crate::core::lifecycle::{LifecycleSink, Notifier};
use crate::core::model::{AnalysisResult, Logline, ProcessingSummary, RunStatus};
use crate::core::source::{self, LogSource};
use crate::util::constants;
use crate::util::error::DispatchError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

// =============================================================================
// Run control
// =============================================================================

/// Cooperative cancellation flag shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Tasks that have not yet started skip their line.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run dispatch options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Worker thread count; 0 means one per available core.
    pub workers: usize,

    /// Lines whose task starts after this much time are skipped.
    pub deadline: Option<Duration>,

    pub cancel: Option<CancelToken>,
}

/// Phases of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Idle,
    Dispatching,
    Draining,
    Complete,
}

fn enter(phase: &mut RunPhase, next: RunPhase) {
    debug_assert!(next > *phase, "run phase moved backwards");
    tracing::debug!(from = ?*phase, to = ?next, "Run phase");
    *phase = next;
}

/// Resolve a configured worker count (0 = auto) to a concrete thread count.
pub fn resolve_workers(configured: usize) -> usize {
    let n = if configured == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        configured
    };
    n.clamp(1, constants::MAX_WORKER_THREADS)
}

/// Why a task skipped its line instead of classifying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    DeadlineExceeded,
}

struct StopCheck<'a> {
    cancel: Option<&'a CancelToken>,
    deadline: Option<Instant>,
    /// First reason any task observed; decides the run status.
    first: OnceLock<StopReason>,
}

impl<'a> StopCheck<'a> {
    fn new(cancel: Option<&'a CancelToken>, deadline: Option<Instant>) -> Self {
        Self {
            cancel,
            deadline,
            first: OnceLock::new(),
        }
    }

    fn check(&self) -> Option<StopReason> {
        let reason = if self.cancel.is_some_and(CancelToken::is_cancelled) {
            StopReason::Cancelled
        } else {
            match self.deadline {
                Some(deadline) if Instant::now() >= deadline => StopReason::DeadlineExceeded,
                _ => return None,
            }
        };
        Some(*self.first.get_or_init(|| reason))
    }

    fn status(&self) -> RunStatus {
        match self.first.get() {
            None => RunStatus::Completed,
            Some(StopReason::Cancelled) => RunStatus::Cancelled,
            Some(StopReason::DeadlineExceeded) => RunStatus::DeadlineExceeded,
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Runs a classifier chain over a source on a worker pool.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    options: RunOptions,
}

impl Dispatcher {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Thread count this dispatcher will use.
    pub fn worker_count(&self) -> usize {
        resolve_workers(self.options.workers)
    }

    /// Classify every line of `source` and return the frozen aggregate.
    ///
    /// Blocks until every line's task has completed. Fails only if the source
    /// cannot be read or the pool cannot be started; per-line failures are
    /// recorded as error lines.
    pub fn run(
        &self,
        source: &mut dyn LogSource,
        chain: &ClassifierChain,
        sink: Option<&dyn LifecycleSink>,
    ) -> Result<AnalysisResult, DispatchError> {
        let started = Instant::now();
        let mut phase = RunPhase::Idle;

        let path = source.path().to_path_buf();
        let bytes = source.size_bytes();
        let lines = source::drain(source)?;
        let total_lines = lines.len() as u64;

        let workers = self.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("logsift-worker-{i}"))
            .build()
            .map_err(|e| DispatchError::PoolBuild { workers, source: e })?;

        let aggregator = Aggregator::new();
        let notifier = Notifier::new(sink, &path, total_lines);
        let ctx = SourceContext::new(&path, &lines);
        let stop = StopCheck::new(
            self.options.cancel.as_ref(),
            self.options.deadline.map(|d| started + d),
        );

        tracing::debug!(
            source = %path.display(),
            lines = total_lines,
            workers,
            classifiers = chain.len(),
            "Dispatching"
        );

        enter(&mut phase, RunPhase::Dispatching);
        notifier.start();

        pool.scope(|scope| {
            for line in &lines {
                let (aggregator, notifier, ctx, stop) = (&aggregator, &notifier, &ctx, &stop);
                scope.spawn(move |_| {
                    classify_line(line, chain, ctx, aggregator, stop);
                    notifier.progress(line.number);
                });
            }
            enter(&mut phase, RunPhase::Draining);
        });

        enter(&mut phase, RunPhase::Complete);
        notifier.end();

        let status = stop.status();

        let summary = ProcessingSummary {
            bytes,
            lines: total_lines,
            workers,
            elapsed: started.elapsed(),
        };

        let result = aggregator.into_result(path, total_lines, status, summary);

        tracing::info!(
            source = %result.log_file.display(),
            lines = total_lines,
            signals = result.signal_count(),
            exceptions = result.exception_count(),
            errors = result.error_count(),
            unclassified = result.unclassified_count(),
            skipped = result.skipped_count(),
            status = ?status,
            elapsed_ms = result.summary.elapsed.as_millis() as u64,
            "Classification complete"
        );

        Ok(result)
    }
}

/// Body of one task: classify `line` and route the outcome.
fn classify_line(
    line: &Logline,
    chain: &ClassifierChain,
    ctx: &SourceContext<'_>,
    aggregator: &Aggregator,
    stop: &StopCheck<'_>,
) {
    if let Some(reason) = stop.check() {
        tracing::trace!(line = line.number, reason = ?reason, "Line skipped");
        aggregator.record_skipped(line.number);
        return;
    }

    match chain.classify(line, ctx) {
        ChainOutcome::Matched(result) => aggregator.submit(result),
        ChainOutcome::NoMatch => {
            tracing::trace!(line = line.number, "No classifier matched");
            aggregator.record_unclassified(line.number);
        }
        ChainOutcome::Failed(error) => {
            tracing::warn!(error = %error, "Classifier failed; recording error line");
            aggregator.record_failure(line, &error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::FnClassifier;
    use crate::core::lifecycle::EventContext;
    use crate::core::model::{ClassificationResult, ExceptionModel, SignalModel};
    use crate::core::source::MemorySource;
    use crate::util::error::ClassifyError;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn exception(l: &Logline) -> ClassificationResult {
        ClassificationResult::Exception(ExceptionModel {
            id: 0,
            line: l.number,
            classifier: "is-exception".to_string(),
            exception_type: "ERROR".to_string(),
            message: l.text.clone(),
            stack: Vec::new(),
            timestamp: None,
            raw_text: l.text.clone(),
        })
    }

    fn signal(l: &Logline) -> ClassificationResult {
        ClassificationResult::Signal(SignalModel {
            id: 0,
            line: l.number,
            classifier: "is-signal".to_string(),
            name: "value".to_string(),
            value: l.text.clone(),
            timestamp: None,
            raw_text: l.text.clone(),
        })
    }

    fn scenario_chain() -> ClassifierChain {
        let mut chain = ClassifierChain::new();
        chain.register(FnClassifier::new(
            "is-exception",
            |l: &Logline| l.text.starts_with("ERROR"),
            |l: &Logline, _: &SourceContext<'_>| Ok(exception(l)),
        ));
        chain.register(FnClassifier::new(
            "is-signal",
            |l: &Logline| l.text.contains('='),
            |l: &Logline, _: &SourceContext<'_>| Ok(signal(l)),
        ));
        chain
    }

    fn run(lines: &[&str], chain: &ClassifierChain, options: RunOptions) -> AnalysisResult {
        let mut source = MemorySource::new("test.log", lines.iter().copied());
        Dispatcher::new(options).run(&mut source, chain, None).unwrap()
    }

    #[test]
    fn test_scenario_exception_signal_unclassified() {
        let result = run(
            &["INFO ok", "ERROR boom", "INFO value=5"],
            &scenario_chain(),
            RunOptions::default(),
        );
        assert_eq!(result.exceptions().keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(result.signals().keys().copied().collect::<Vec<_>>(), vec![3]);
        assert!(result.unclassified().contains(&1));
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.is_balanced());
    }

    #[test]
    fn test_empty_source() {
        let result = run(&[], &scenario_chain(), RunOptions::default());
        assert_eq!(result.total_lines, 0);
        assert_eq!(result.signal_count(), 0);
        assert_eq!(result.exception_count(), 0);
        assert_eq!(result.error_count(), 0);
        assert_eq!(result.unclassified_count(), 0);
    }

    #[test]
    fn test_failing_classifier_isolated_to_its_line() {
        let mut chain = ClassifierChain::new();
        chain.register(FnClassifier::new(
            "fragile",
            |l: &Logline| l.text.contains("poison"),
            |l: &Logline, _: &SourceContext<'_>| -> Result<ClassificationResult, ClassifyError> {
                if l.text.contains("panic") {
                    panic!("fragile classifier blew up");
                }
                Err(ClassifyError::Invalid {
                    classifier: "fragile".to_string(),
                    line_number: l.number,
                    reason: "poisoned input".to_string(),
                })
            },
        ));
        chain.register(FnClassifier::new(
            "is-signal",
            |l: &Logline| l.text.contains('='),
            |l: &Logline, _: &SourceContext<'_>| Ok(signal(l)),
        ));

        let result = run(
            &["a=1", "poison", "b=2", "poison panic", "c=3"],
            &chain,
            RunOptions {
                workers: 3,
                ..RunOptions::default()
            },
        );
        assert_eq!(result.signal_count(), 3);
        assert_eq!(result.error_lines().keys().copied().collect::<Vec<_>>(), vec![2, 4]);
        assert!(result.error_line(4).unwrap().reason.contains("blew up"));
        assert!(result.is_balanced());
    }

    #[test]
    fn test_pre_cancelled_run_skips_every_line() {
        let token = CancelToken::new();
        token.cancel();
        let result = run(
            &["ERROR a", "x=1", "ok"],
            &scenario_chain(),
            RunOptions {
                cancel: Some(token),
                ..RunOptions::default()
            },
        );
        assert_eq!(result.status, RunStatus::Cancelled);
        assert_eq!(result.skipped_count(), 3);
        assert!(result.is_balanced());
    }

    #[test]
    fn test_zero_deadline_skips_every_line() {
        let result = run(
            &["ERROR a", "x=1"],
            &scenario_chain(),
            RunOptions {
                deadline: Some(Duration::ZERO),
                ..RunOptions::default()
            },
        );
        assert_eq!(result.status, RunStatus::DeadlineExceeded);
        assert_eq!(result.skipped_count(), 2);
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
        progressed: Mutex<HashSet<u64>>,
    }

    impl LifecycleSink for RecordingSink {
        fn start_processing(&self, ctx: &EventContext<'_>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start:{}", ctx.total_lines));
        }

        fn progress_of_processing(&self, ctx: &EventContext<'_>) {
            self.progressed
                .lock()
                .unwrap()
                .insert(ctx.line_number.unwrap());
        }

        fn end_of_processing(&self, ctx: &EventContext<'_>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("end:{}", ctx.completed_lines));
        }
    }

    #[test]
    fn test_sink_sees_start_one_progress_per_line_and_end() {
        let sink = RecordingSink::default();
        let lines: Vec<String> = (0..200).map(|i| format!("k{i}={i}")).collect();
        let mut source = MemorySource::new("sink.log", lines);
        Dispatcher::new(RunOptions {
            workers: 4,
            ..RunOptions::default()
        })
        .run(&mut source, &scenario_chain(), Some(&sink))
        .unwrap();

        assert_eq!(*sink.events.lock().unwrap(), vec!["start:200", "end:200"]);
        let progressed = sink.progressed.lock().unwrap();
        assert_eq!(progressed.len(), 200);
        assert!((1..=200).all(|n| progressed.contains(&n)));
    }

    /// Panics on one progress event, and on start and end.
    struct PanickingSink {
        panic_on: u64,
        progressed: Mutex<HashSet<u64>>,
    }

    impl LifecycleSink for PanickingSink {
        fn start_processing(&self, _ctx: &EventContext<'_>) {
            panic!("sink start failed");
        }

        fn progress_of_processing(&self, ctx: &EventContext<'_>) {
            let line = ctx.line_number.unwrap();
            if line == self.panic_on {
                panic!("sink failed on line {line}");
            }
            self.progressed.lock().unwrap().insert(line);
        }

        fn end_of_processing(&self, _ctx: &EventContext<'_>) {
            panic!("sink end failed");
        }
    }

    #[test]
    fn test_panicking_sink_does_not_abort_run() {
        let sink = PanickingSink {
            panic_on: 2,
            progressed: Mutex::new(HashSet::new()),
        };
        let mut source = MemorySource::new("sink.log", ["a", "ERROR b", "c=1"]);
        let result = Dispatcher::new(RunOptions {
            workers: 2,
            ..RunOptions::default()
        })
        .run(&mut source, &scenario_chain(), Some(&sink))
        .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.is_balanced());
        assert_eq!(result.exception_count(), 1);
        assert_eq!(result.signal_count(), 1);
        assert_eq!(result.unclassified_count(), 1);
        let progressed = sink.progressed.lock().unwrap();
        assert_eq!(*progressed, HashSet::from([1, 3]));
    }

    /// Cancels the shared token once every task has finished.
    struct CancelAtEnd(CancelToken);

    impl LifecycleSink for CancelAtEnd {
        fn end_of_processing(&self, _ctx: &EventContext<'_>) {
            self.0.cancel();
        }
    }

    #[test]
    fn test_status_uses_first_stop_reason_seen() {
        let token = CancelToken::new();
        let sink = CancelAtEnd(token.clone());
        let mut source = MemorySource::new("late.log", ["a", "b", "c"]);
        let result = Dispatcher::new(RunOptions {
            workers: 2,
            deadline: Some(Duration::ZERO),
            cancel: Some(token.clone()),
        })
        .run(&mut source, &scenario_chain(), Some(&sink))
        .unwrap();

        assert!(token.is_cancelled());
        assert_eq!(result.status, RunStatus::DeadlineExceeded);
        assert_eq!(result.skipped_count(), 3);
    }

    fn mixed_lines(n: usize) -> Vec<String> {
        (1..=n)
            .map(|i| match i % 4 {
                0 => format!("ERROR failure {i}"),
                1 => format!("metric_{i}={i}"),
                _ => format!("plain text {i}"),
            })
            .collect()
    }

    fn run_owned(lines: &[String], chain: &ClassifierChain, workers: usize) -> AnalysisResult {
        let mut source = MemorySource::new("big.log", lines.iter().cloned());
        Dispatcher::new(RunOptions {
            workers,
            ..RunOptions::default()
        })
        .run(&mut source, chain, None)
        .unwrap()
    }

    #[test]
    fn test_parallel_matches_single_threaded() {
        let lines = mixed_lines(10_000);
        let chain = scenario_chain();
        let serial = run_owned(&lines, &chain, 1);
        let parallel = run_owned(&lines, &chain, 8);

        assert_eq!(serial.signals(), parallel.signals());
        assert_eq!(serial.exceptions(), parallel.exceptions());
        assert_eq!(serial.error_lines(), parallel.error_lines());
        assert_eq!(serial.unclassified(), parallel.unclassified());
        assert_eq!(parallel.exception_count(), 2_500);
        assert_eq!(parallel.signal_count(), 2_500);
        assert!(parallel.is_balanced());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        /// Random per-line delays make tasks finish out of order; the result
        /// still iterates in line order.
        #[test]
        fn prop_result_order_independent_of_completion_order(
            delays in prop::collection::vec(0u64..3, 1..48),
        ) {
            let delays = Arc::new(delays);
            let table = Arc::clone(&delays);
            let mut chain = ClassifierChain::new();
            chain.register(FnClassifier::new(
                "slow-signal",
                |l: &Logline| l.text.contains('='),
                move |l: &Logline, _: &SourceContext<'_>| {
                    let ms = table[(l.number - 1) as usize];
                    std::thread::sleep(Duration::from_millis(ms));
                    Ok(signal(l))
                },
            ));
            let lines: Vec<String> = (0..delays.len()).map(|i| format!("k{i}={i}")).collect();
            let result = run_owned(&lines, &chain, 8);

            let keys: Vec<u64> = result.signals().keys().copied().collect();
            prop_assert_eq!(keys, (1..=delays.len() as u64).collect::<Vec<_>>());
            prop_assert!(result.signals().iter().all(|(k, s)| *k == s.id && *k == s.line));
        }
    }

    #[test]
    fn test_repeat_runs_are_identical() {
        let lines = mixed_lines(500);
        let chain = scenario_chain();
        let first = run_owned(&lines, &chain, 4);
        let second = run_owned(&lines, &chain, 4);
        assert_eq!(first.signals(), second.signals());
        assert_eq!(first.exceptions(), second.exceptions());
        assert_eq!(first.error_lines(), second.error_lines());
        assert_eq!(first.unclassified(), second.unclassified());
    }

    #[test]
    fn test_all_unmatched_source() {
        let result = run(&["one", "two", "three"], &scenario_chain(), RunOptions::default());
        assert_eq!(result.unclassified_count(), 3);
        assert_eq!(result.signal_count() + result.exception_count(), 0);
        assert_eq!(result.status, RunStatus::Completed);
    }

    #[test]
    fn test_resolve_workers() {
        assert!(resolve_workers(0) >= 1);
        assert_eq!(resolve_workers(3), 3);
        assert_eq!(resolve_workers(100_000), constants::MAX_WORKER_THREADS);
    }

    #[test]
    fn test_summary_records_workers_and_bytes() {
        let result = run(
            &["a=1", "b=2"],
            &scenario_chain(),
            RunOptions {
                workers: 2,
                ..RunOptions::default()
            },
        );
        assert_eq!(result.summary.workers, 2);
        assert_eq!(result.summary.lines, 2);
        assert_eq!(result.summary.bytes, 8);
    }
}
