// LogSift - app/rules_mgr.rs
//
// Builds the classifier chain from the built-in rule set (embedded in the
// binary) and an optional user rule file on disk.
//
// Chain order: malformed-line check, built-in rules, then user rules.
// A user rule with the same ID as a built-in replaces it in place.

use crate::core::classifier::{Classifier, ClassifierChain};
use crate::core::rules::{self, MalformedLineClassifier, RuleClassifier, RuleConfig};
use crate::util::constants;
use crate::util::error::RulesError;
use std::collections::HashSet;
use std::path::Path;

/// Assemble the classifier chain.
///
/// Invalid user rules are logged and skipped (non-fatal). Returns the chain
/// and every non-fatal error encountered.
pub fn build_chain(
    config: &RuleConfig,
    builtin: bool,
    user_rules: Option<&Path>,
) -> (ClassifierChain, Vec<RulesError>) {
    let mut errors = Vec::new();
    let mut loaded: Vec<RuleClassifier> = Vec::new();

    if builtin {
        match rules::load_builtin_rules(config) {
            Ok(r) => loaded = r,
            Err(e) => {
                tracing::error!(error = %e, "Built-in rules failed to load");
                errors.push(e);
            }
        }
        tracing::info!(builtin_count = loaded.len(), "Loaded built-in rules");
    }

    if let Some(path) = user_rules {
        let (user, user_errors) = load_user_rules(path, config);
        errors.extend(user_errors);

        for rule in user {
            if let Some(pos) = loaded.iter().position(|r| r.id() == rule.id()) {
                tracing::info!(rule_id = %rule.id(), "User rule overrides built-in");
                loaded[pos] = rule;
            } else {
                tracing::debug!(rule_id = %rule.id(), "Loaded user-defined rule");
                loaded.push(rule);
            }
        }
    }

    if loaded.len() > constants::MAX_RULES {
        tracing::warn!(
            count = loaded.len(),
            max = constants::MAX_RULES,
            "Too many rules loaded, truncating"
        );
        errors.push(RulesError::TooManyRules {
            count: loaded.len(),
            max: constants::MAX_RULES,
        });
        loaded.truncate(constants::MAX_RULES);
    }

    let mut chain = ClassifierChain::new();
    chain.register(MalformedLineClassifier::new(config.max_line_length));
    for rule in loaded {
        chain.register(rule);
    }

    tracing::info!(
        classifiers = chain.len(),
        errors = errors.len(),
        "Classifier chain ready"
    );
    (chain, errors)
}

/// Load and compile rules from a user TOML file.
///
/// Each rule is compiled independently so one bad rule does not discard the
/// rest of the file.
pub fn load_user_rules(path: &Path, config: &RuleConfig) -> (Vec<RuleClassifier>, Vec<RulesError>) {
    let mut compiled = Vec::new();
    let mut errors = Vec::new();

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            errors.push(RulesError::Io {
                path: path.to_path_buf(),
                source: e,
            });
            return (compiled, errors);
        }
    };

    if metadata.len() > constants::MAX_RULE_FILE_SIZE {
        errors.push(RulesError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: constants::MAX_RULE_FILE_SIZE,
        });
        return (compiled, errors);
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            errors.push(RulesError::Io {
                path: path.to_path_buf(),
                source: e,
            });
            return (compiled, errors);
        }
    };

    let file = match rules::parse_rules_toml(&content, path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "User rule file rejected");
            errors.push(e);
            return (compiled, errors);
        }
    };

    let mut seen = HashSet::new();
    for def in file.rules.into_iter().filter(|d| d.enabled) {
        if !seen.insert(def.id.clone()) {
            errors.push(RulesError::DuplicateId { id: def.id });
            continue;
        }
        match rules::compile_rule(def, config) {
            Ok(rule) => compiled.push(rule),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping invalid user rule");
                errors.push(e);
            }
        }
    }

    tracing::info!(
        path = %path.display(),
        count = compiled.len(),
        "Loaded user rules"
    );
    (compiled, errors)
}
