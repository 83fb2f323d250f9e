// LogSift - core/classifier.rs
//
// Ordered, first-match-wins chain of line classifiers.
// Core layer: pure logic, no I/O.
//
// The chain is built once before a run and shared read-only by every worker.
// A classifier that errors or panics is isolated to its own line: the chain
// reports the failure instead of unwinding into the worker pool.

use crate::core::model::{ClassificationResult, Logline};
use crate::util::error::ClassifyError;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

// =============================================================================
// Source context (read-only lookback / lookahead)
// =============================================================================

/// Read-only view of the whole source, handed to classifiers that need
/// neighbouring lines (e.g. to collect a stack trace).
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    path: &'a Path,
    lines: &'a [Logline],
}

impl<'a> SourceContext<'a> {
    /// `lines` must be in source order, numbered from 1 without gaps.
    pub fn new(path: &'a Path, lines: &'a [Logline]) -> Self {
        Self { path, lines }
    }

    pub fn path(&self) -> &'a Path {
        self.path
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn index_of(&self, number: u64) -> Option<usize> {
        let idx = usize::try_from(number.checked_sub(1)?).ok()?;
        match self.lines.get(idx) {
            Some(line) if line.number == number => Some(idx),
            _ => self.lines.binary_search_by_key(&number, |l| l.number).ok(),
        }
    }

    /// The line with the given 1-based number.
    pub fn line(&self, number: u64) -> Option<&'a Logline> {
        self.index_of(number).map(|i| &self.lines[i])
    }

    /// All lines after `number`, in order.
    pub fn following(&self, number: u64) -> &'a [Logline] {
        match self.index_of(number) {
            Some(i) => &self.lines[i + 1..],
            None => &[],
        }
    }

    /// All lines before `number`, in order.
    pub fn preceding(&self, number: u64) -> &'a [Logline] {
        match self.index_of(number) {
            Some(i) => &self.lines[..i],
            None => &[],
        }
    }
}

// =============================================================================
// Classifier trait
// =============================================================================

/// A predicate + transform pair recognising one kind of line.
///
/// Implementations must not mutate shared state: the same instance is called
/// concurrently from every worker thread.
pub trait Classifier: Send + Sync {
    /// Stable identifier used in results and diagnostics.
    fn id(&self) -> &str;

    /// Cheap test of whether this classifier handles `line`.
    fn can_handle(&self, line: &Logline) -> bool;

    /// Extract a result from a line `can_handle` accepted.
    fn classify(
        &self,
        line: &Logline,
        ctx: &SourceContext<'_>,
    ) -> Result<ClassificationResult, ClassifyError>;
}

/// A classifier assembled from a predicate closure and a transform closure.
pub struct FnClassifier<P, T> {
    id: String,
    predicate: P,
    transform: T,
}

impl<P, T> FnClassifier<P, T>
where
    P: Fn(&Logline) -> bool + Send + Sync,
    T: Fn(&Logline, &SourceContext<'_>) -> Result<ClassificationResult, ClassifyError>
        + Send
        + Sync,
{
    pub fn new(id: impl Into<String>, predicate: P, transform: T) -> Self {
        Self {
            id: id.into(),
            predicate,
            transform,
        }
    }
}

impl<P, T> Classifier for FnClassifier<P, T>
where
    P: Fn(&Logline) -> bool + Send + Sync,
    T: Fn(&Logline, &SourceContext<'_>) -> Result<ClassificationResult, ClassifyError>
        + Send
        + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, line: &Logline) -> bool {
        (self.predicate)(line)
    }

    fn classify(
        &self,
        line: &Logline,
        ctx: &SourceContext<'_>,
    ) -> Result<ClassificationResult, ClassifyError> {
        (self.transform)(line, ctx)
    }
}

// =============================================================================
// Chain
// =============================================================================

/// Outcome of running the chain against one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// The first classifier whose predicate accepted the line produced this.
    Matched(ClassificationResult),

    /// No classifier accepted the line.
    NoMatch,

    /// The accepting classifier failed (error, panic, or wrong line number).
    Failed(ClassifyError),
}

/// Ordered list of classifiers. Registration is append-only.
#[derive(Default)]
pub struct ClassifierChain {
    classifiers: Vec<Box<dyn Classifier>>,
}

impl fmt::Debug for ClassifierChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl ClassifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a classifier to the end of the chain.
    pub fn register<C: Classifier + 'static>(&mut self, classifier: C) {
        self.register_boxed(Box::new(classifier));
    }

    pub fn register_boxed(&mut self, classifier: Box<dyn Classifier>) {
        tracing::debug!(
            classifier = classifier.id(),
            position = self.classifiers.len(),
            "Classifier registered"
        );
        self.classifiers.push(classifier);
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Classifier IDs in evaluation order.
    pub fn ids(&self) -> Vec<&str> {
        self.classifiers.iter().map(|c| c.id()).collect()
    }

    /// Walk the chain in registration order; the first classifier whose
    /// predicate accepts `line` decides the outcome. Later classifiers are
    /// not evaluated.
    pub fn classify(&self, line: &Logline, ctx: &SourceContext<'_>) -> ChainOutcome {
        for classifier in &self.classifiers {
            let id = classifier.id();

            let accepted = panic::catch_unwind(AssertUnwindSafe(|| classifier.can_handle(line)));
            let accepted = match accepted {
                Ok(accepted) => accepted,
                Err(payload) => return ChainOutcome::Failed(panicked(id, line, payload)),
            };
            if !accepted {
                continue;
            }

            return match panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(line, ctx))) {
                Ok(Ok(result)) if result.line() == line.number => ChainOutcome::Matched(result),
                Ok(Ok(result)) => ChainOutcome::Failed(ClassifyError::Invalid {
                    classifier: id.to_string(),
                    line_number: line.number,
                    reason: format!("result reports line {} instead", result.line()),
                }),
                Ok(Err(e)) => ChainOutcome::Failed(e),
                Err(payload) => ChainOutcome::Failed(panicked(id, line, payload)),
            };
        }
        ChainOutcome::NoMatch
    }
}

fn panicked(classifier: &str, line: &Logline, payload: Box<dyn Any + Send>) -> ClassifyError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    ClassifyError::Panicked {
        classifier: classifier.to_string(),
        line_number: line.number,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ErrorLine, ExceptionModel, SignalModel};
    use std::path::PathBuf;

    fn exception_for(line: &Logline) -> ClassificationResult {
        ClassificationResult::Exception(ExceptionModel {
            id: 0,
            line: line.number,
            classifier: "is-exception".to_string(),
            exception_type: "ERROR".to_string(),
            message: line.text.clone(),
            stack: Vec::new(),
            timestamp: None,
            raw_text: line.text.clone(),
        })
    }

    fn signal_for(line: &Logline) -> ClassificationResult {
        ClassificationResult::Signal(SignalModel {
            id: 0,
            line: line.number,
            classifier: "is-signal".to_string(),
            name: "value".to_string(),
            value: "5".to_string(),
            timestamp: None,
            raw_text: line.text.clone(),
        })
    }

    fn scenario_chain() -> ClassifierChain {
        let mut chain = ClassifierChain::new();
        chain.register(FnClassifier::new(
            "is-exception",
            |l: &Logline| l.text.contains("ERROR"),
            |l: &Logline, _: &SourceContext<'_>| Ok(exception_for(l)),
        ));
        chain.register(FnClassifier::new(
            "is-signal",
            |l: &Logline| l.text.contains('='),
            |l: &Logline, _: &SourceContext<'_>| Ok(signal_for(l)),
        ));
        chain
    }

    fn lines() -> Vec<Logline> {
        vec![
            Logline::new(1, "INFO ok"),
            Logline::new(2, "ERROR boom"),
            Logline::new(3, "INFO value=5"),
        ]
    }

    #[test]
    fn test_first_match_decides() {
        let chain = scenario_chain();
        let lines = lines();
        let path = PathBuf::from("t.log");
        let ctx = SourceContext::new(&path, &lines);

        assert_eq!(chain.classify(&lines[0], &ctx), ChainOutcome::NoMatch);
        assert!(matches!(
            chain.classify(&lines[1], &ctx),
            ChainOutcome::Matched(ClassificationResult::Exception(_))
        ));
        assert!(matches!(
            chain.classify(&lines[2], &ctx),
            ChainOutcome::Matched(ClassificationResult::Signal(_))
        ));
    }

    #[test]
    fn test_later_classifiers_not_evaluated_after_match() {
        let mut chain = ClassifierChain::new();
        chain.register(FnClassifier::new(
            "catch-all",
            |_: &Logline| true,
            |l: &Logline, _: &SourceContext<'_>| Ok(exception_for(l)),
        ));
        chain.register(FnClassifier::new(
            "never-reached",
            |_: &Logline| panic!("second predicate must not run"),
            |l: &Logline, _: &SourceContext<'_>| Ok(signal_for(l)),
        ));
        let lines = lines();
        let path = PathBuf::from("t.log");
        let ctx = SourceContext::new(&path, &lines);
        for line in &lines {
            assert!(matches!(chain.classify(line, &ctx), ChainOutcome::Matched(_)));
        }
    }

    #[test]
    fn test_panicking_transform_becomes_failure() {
        let mut chain = ClassifierChain::new();
        chain.register(FnClassifier::new(
            "explodes",
            |_: &Logline| true,
            |_: &Logline, _: &SourceContext<'_>| -> Result<ClassificationResult, ClassifyError> {
                panic!("bad state")
            },
        ));
        let lines = lines();
        let path = PathBuf::from("t.log");
        let ctx = SourceContext::new(&path, &lines);
        match chain.classify(&lines[0], &ctx) {
            ChainOutcome::Failed(ClassifyError::Panicked {
                classifier,
                line_number,
                message,
            }) => {
                assert_eq!(classifier, "explodes");
                assert_eq!(line_number, 1);
                assert_eq!(message, "bad state");
            }
            other => panic!("expected panic failure, got {other:?}"),
        }
    }

    #[test]
    fn test_result_for_wrong_line_is_rejected() {
        let mut chain = ClassifierChain::new();
        chain.register(FnClassifier::new(
            "off-by-one",
            |_: &Logline| true,
            |l: &Logline, _: &SourceContext<'_>| {
                Ok(ClassificationResult::ErrorLine(ErrorLine {
                    id: 0,
                    line: l.number + 1,
                    classifier: "off-by-one".to_string(),
                    reason: String::new(),
                    raw_text: String::new(),
                }))
            },
        ));
        let lines = lines();
        let path = PathBuf::from("t.log");
        let ctx = SourceContext::new(&path, &lines);
        assert!(matches!(
            chain.classify(&lines[0], &ctx),
            ChainOutcome::Failed(ClassifyError::Invalid { .. })
        ));
    }

    #[test]
    fn test_empty_chain_matches_nothing() {
        let chain = ClassifierChain::new();
        assert!(chain.is_empty());
        let lines = lines();
        let path = PathBuf::from("t.log");
        let ctx = SourceContext::new(&path, &lines);
        assert_eq!(chain.classify(&lines[1], &ctx), ChainOutcome::NoMatch);
    }

    #[test]
    fn test_source_context_lookaround() {
        let lines = lines();
        let path = PathBuf::from("t.log");
        let ctx = SourceContext::new(&path, &lines);
        assert_eq!(ctx.line(2).map(|l| l.text.as_str()), Some("ERROR boom"));
        assert_eq!(ctx.following(2).len(), 1);
        assert_eq!(ctx.preceding(2).len(), 1);
        assert!(ctx.line(0).is_none());
        assert!(ctx.line(4).is_none());
        assert!(ctx.following(9).is_empty());
    }

    #[test]
    fn test_ids_in_registration_order() {
        let chain = scenario_chain();
        assert_eq!(chain.ids(), vec!["is-exception", "is-signal"]);
        assert_eq!(chain.len(), 2);
    }
}
