// LogSift - tests/proptest_invariants.rs
//
// Property tests over randomly generated logs: every line is accounted for
// exactly once, results iterate in line order, and the worker count never
// changes the outcome.

use logsift::app::rules_mgr;
use logsift::core::classifier::ClassifierChain;
use logsift::core::dispatcher::{Dispatcher, RunOptions};
use logsift::core::model::AnalysisResult;
use logsift::core::rules::RuleConfig;
use logsift::core::source::MemorySource;
use proptest::prelude::*;
use std::collections::HashSet;

fn builtin_chain() -> ClassifierChain {
    let (chain, errors) = rules_mgr::build_chain(&RuleConfig::default(), true, None);
    assert!(errors.is_empty());
    chain
}

fn run(lines: &[String], chain: &ClassifierChain, workers: usize) -> AnalysisResult {
    let mut source = MemorySource::new("prop.log", lines.iter().cloned());
    Dispatcher::new(RunOptions {
        workers,
        ..RunOptions::default()
    })
    .run(&mut source, chain, None)
    .unwrap()
}

/// A mix of line shapes the built-in rules do and do not recognise.
fn arb_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,30}",
        "[a-z_]{1,8}=[0-9]{1,4}",
        "ERROR [a-z ]{0,20}",
        "com\\.example\\.[A-Z][a-z]{2,6}Exception: [a-z ]{0,10}",
        "\tat [a-z.]{1,20}\\(X\\.java:[0-9]{1,3}\\)",
        "signal [a-z]{1,6} -> [A-Z]{1,6}",
        "\\[CORRUPT\\] [a-z]{0,8}",
        "[\\x00-\\x1f]{1,3}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_line_accounted_once(lines in prop::collection::vec(arb_line(), 0..200)) {
        let result = run(&lines, &builtin_chain(), 4);

        prop_assert_eq!(result.total_lines, lines.len() as u64);
        prop_assert!(result.is_balanced());

        let mut seen = HashSet::new();
        let all = result
            .signals()
            .keys()
            .chain(result.exceptions().keys())
            .chain(result.error_lines().keys())
            .chain(result.unclassified().iter());
        for line in all {
            prop_assert!(seen.insert(*line), "line {} in two buckets", line);
        }
        prop_assert_eq!(seen.len(), lines.len());
    }

    #[test]
    fn prop_ids_equal_line_numbers(lines in prop::collection::vec(arb_line(), 1..100)) {
        let result = run(&lines, &builtin_chain(), 3);

        for (key, s) in result.signals() {
            prop_assert_eq!(*key, s.id);
            prop_assert_eq!(*key, s.line);
        }
        for (key, e) in result.exceptions() {
            prop_assert_eq!(*key, e.id);
        }
        for (key, e) in result.error_lines() {
            prop_assert_eq!(*key, e.id);
        }
    }

    #[test]
    fn prop_worker_count_invariant(
        lines in prop::collection::vec(arb_line(), 0..150),
        workers in 1usize..9,
    ) {
        let chain = builtin_chain();
        let serial = run(&lines, &chain, 1);
        let parallel = run(&lines, &chain, workers);

        prop_assert_eq!(serial.signals(), parallel.signals());
        prop_assert_eq!(serial.exceptions(), parallel.exceptions());
        prop_assert_eq!(serial.error_lines(), parallel.error_lines());
        prop_assert_eq!(serial.unclassified(), parallel.unclassified());
    }
}
