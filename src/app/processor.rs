// LogSift - app/processor.rs
//
// Entry point for classifying a log file: owns the classifier chain, run
// options and the optional lifecycle sink, and wires them to the dispatcher.

use crate::app::rules_mgr;
use crate::core::classifier::{Classifier, ClassifierChain};
use crate::core::dispatcher::{CancelToken, Dispatcher, RunOptions};
use crate::core::lifecycle::LifecycleSink;
use crate::core::model::AnalysisResult;
use crate::core::rules::RuleConfig;
use crate::core::source::LogSource;
use crate::platform::config::AppConfig;
use crate::platform::fs::LogFile;
use crate::util::constants;
use crate::util::error::{LogSiftError, RulesError};
use std::path::Path;
use std::sync::Arc;

pub struct LogProcessor {
    chain: ClassifierChain,
    options: RunOptions,
    sink: Option<Arc<dyn LifecycleSink>>,
    large_file_threshold: u64,
}

impl std::fmt::Debug for LogProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogProcessor")
            .field("chain", &self.chain)
            .field("options", &self.options)
            .field("has_sink", &self.sink.is_some())
            .field("large_file_threshold", &self.large_file_threshold)
            .finish()
    }
}

impl Default for LogProcessor {
    fn default() -> Self {
        Self::with_chain(ClassifierChain::new())
    }
}

impl LogProcessor {
    /// A processor with an empty chain; every line is unclassified until
    /// classifiers are registered.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(chain: ClassifierChain) -> Self {
        Self {
            chain,
            options: RunOptions::default(),
            sink: None,
            large_file_threshold: constants::DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }

    /// Build a processor from validated configuration: rule chain, worker
    /// count, deadline and mmap threshold.
    ///
    /// `user_rules` overrides the configured user rule file. Rule errors are
    /// non-fatal and returned for reporting.
    pub fn from_config(config: &AppConfig, user_rules: Option<&Path>) -> (Self, Vec<RulesError>) {
        let rule_config = RuleConfig {
            max_stack_lines: config.max_stack_lines,
            max_line_length: config.max_line_length,
        };
        let user_rules = user_rules.or(config.user_rules_file.as_deref());
        let (chain, errors) =
            rules_mgr::build_chain(&rule_config, config.builtin_rules, user_rules);

        let mut processor = Self::with_chain(chain);
        processor.options.workers = config.worker_threads;
        processor.options.deadline = config.deadline;
        processor.large_file_threshold = config.large_file_threshold;
        (processor, errors)
    }

    /// Append a classifier to the end of the chain.
    pub fn register<C: Classifier + 'static>(&mut self, classifier: C) {
        self.chain.register(classifier);
    }

    pub fn chain(&self) -> &ClassifierChain {
        &self.chain
    }

    pub fn set_sink(&mut self, sink: Arc<dyn LifecycleSink>) {
        self.sink = Some(sink);
    }

    pub fn set_options(&mut self, options: RunOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn set_large_file_threshold(&mut self, bytes: u64) {
        self.large_file_threshold = bytes;
    }

    /// Token that cancels runs of this processor. Created on first call.
    pub fn cancel_token(&mut self) -> CancelToken {
        self.options
            .cancel
            .get_or_insert_with(CancelToken::new)
            .clone()
    }

    /// Classify every line of the file at `path`.
    ///
    /// Fails with `LogSiftError::Source` if the file cannot be opened or read.
    pub fn process(&self, path: &Path) -> Result<AnalysisResult, LogSiftError> {
        let mut file = LogFile::open(path, self.large_file_threshold)?;
        self.process_source(&mut file)
    }

    /// Classify every line of an arbitrary source.
    pub fn process_source(
        &self,
        source: &mut dyn LogSource,
    ) -> Result<AnalysisResult, LogSiftError> {
        let dispatcher = Dispatcher::new(self.options.clone());
        let result = dispatcher.run(source, &self.chain, self.sink.as_deref())?;
        Ok(result)
    }
}
