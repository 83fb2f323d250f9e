// LogSift - core/rules.rs
//
// Built-in classifiers: regex rules compiled from TOML, and the
// malformed-line check.
// Core layer: accepts TOML strings, never touches the filesystem.
// I/O is handled by app::rules_mgr which feeds content here.

use crate::core::classifier::{Classifier, SourceContext};
use crate::core::model::{
    clip_raw_text, ClassificationResult, ErrorLine, ExceptionModel, Logline, SignalModel,
};
use crate::core::timestamp::sniff_timestamp;
use crate::util::constants;
use crate::util::error::{ClassifyError, RulesError};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw rule file: a list of `[[rule]]` tables.
#[derive(Debug, Deserialize)]
pub struct RuleFile {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub description: String,
    pub pattern: String,
    #[serde(default)]
    pub stack_pattern: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Result category a rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Signal,
    Exception,
    Error,
}

/// Limits applied to compiled classifiers.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub max_stack_lines: usize,
    pub max_line_length: usize,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            max_stack_lines: constants::DEFAULT_MAX_STACK_LINES,
            max_line_length: constants::DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

// =============================================================================
// Parsing and compilation
// =============================================================================

/// Parse a TOML string into a `RuleFile`.
///
/// `source_path` is used for error messages only.
pub fn parse_rules_toml(toml_content: &str, source_path: &Path) -> Result<RuleFile, RulesError> {
    toml::from_str(toml_content).map_err(|e| RulesError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Validate a rule definition and compile it into a `RuleClassifier`.
///
/// Validates that required fields are present, patterns compile and stay
/// within the length limit, and that the capture groups the rule's kind needs
/// are present.
pub fn compile_rule(
    def: RuleDefinition,
    config: &RuleConfig,
) -> Result<RuleClassifier, RulesError> {
    let id = def.id.trim().to_string();
    if id.is_empty() {
        return Err(RulesError::MissingField {
            rule_id: "(empty)".to_string(),
            field: "rule.id",
        });
    }
    if def.pattern.is_empty() {
        return Err(RulesError::MissingField {
            rule_id: id,
            field: "rule.pattern",
        });
    }

    let pattern = compile_regex(&id, "rule.pattern", &def.pattern)?;
    let stack_pattern = match def.stack_pattern.as_deref() {
        Some(p) if !p.is_empty() => Some(compile_regex(&id, "rule.stack_pattern", p)?),
        _ => None,
    };

    let groups: Vec<&str> = pattern.capture_names().flatten().collect();
    let required: &[&'static str] = match def.kind {
        RuleKind::Signal => &["name", "value"],
        RuleKind::Exception | RuleKind::Error => &[],
    };
    for group in required {
        if !groups.contains(group) {
            return Err(RulesError::MissingCaptureGroup {
                rule_id: id,
                group: *group,
            });
        }
    }

    if stack_pattern.is_some() && def.kind != RuleKind::Exception {
        tracing::warn!(rule_id = %id, "stack_pattern is only used by exception rules; ignored");
    }

    Ok(RuleClassifier {
        id,
        kind: def.kind,
        description: def.description,
        pattern,
        stack_pattern,
        max_stack_lines: config.max_stack_lines,
    })
}

/// Compile every enabled rule in `file`, rejecting duplicate IDs.
pub fn compile_rule_file(
    file: RuleFile,
    config: &RuleConfig,
) -> Result<Vec<RuleClassifier>, RulesError> {
    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(file.rules.len());
    for def in file.rules {
        if !def.enabled {
            tracing::debug!(rule_id = %def.id, "Rule disabled; skipping");
            continue;
        }
        if !seen.insert(def.id.clone()) {
            return Err(RulesError::DuplicateId { id: def.id });
        }
        compiled.push(compile_rule(def, config)?);
    }
    Ok(compiled)
}

/// Compile a regex pattern with length validation to prevent ReDoS.
fn compile_regex(rule_id: &str, field: &'static str, pattern: &str) -> Result<Regex, RulesError> {
    if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
        return Err(RulesError::RegexTooLong {
            rule_id: rule_id.to_string(),
            field,
            length: pattern.len(),
            max_length: constants::MAX_REGEX_PATTERN_LENGTH,
        });
    }

    Regex::new(pattern).map_err(|e| RulesError::InvalidRegex {
        rule_id: rule_id.to_string(),
        field,
        pattern: pattern.to_string(),
        source: e,
    })
}

// =============================================================================
// Rule classifier
// =============================================================================

/// A classifier driven by one compiled regex rule.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    id: String,
    kind: RuleKind,
    description: String,
    pattern: Regex,
    stack_pattern: Option<Regex>,
    max_stack_lines: usize,
}

impl RuleClassifier {
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Collect the continuation lines after `line` that match the stack
    /// pattern, stopping at the first non-matching line.
    fn collect_stack(&self, line: &Logline, ctx: &SourceContext<'_>) -> Vec<String> {
        let Some(stack_pattern) = &self.stack_pattern else {
            return Vec::new();
        };
        ctx.following(line.number)
            .iter()
            .take_while(|l| stack_pattern.is_match(&l.text))
            .take(self.max_stack_lines)
            .map(|l| clip_raw_text(&l.text))
            .collect()
    }
}

impl Classifier for RuleClassifier {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, line: &Logline) -> bool {
        self.pattern.is_match(&line.text)
    }

    fn classify(
        &self,
        line: &Logline,
        ctx: &SourceContext<'_>,
    ) -> Result<ClassificationResult, ClassifyError> {
        let caps = self
            .pattern
            .captures(&line.text)
            .ok_or_else(|| ClassifyError::Invalid {
                classifier: self.id.clone(),
                line_number: line.number,
                reason: "pattern no longer matches".to_string(),
            })?;
        let group = |name: &str| caps.name(name).map(|m| m.as_str().trim());

        let result = match self.kind {
            RuleKind::Signal => {
                let missing = |field| ClassifyError::MissingField {
                    classifier: self.id.clone(),
                    line_number: line.number,
                    field,
                };
                let name = group("name").ok_or_else(|| missing("name"))?;
                let value = group("value").ok_or_else(|| missing("value"))?;
                ClassificationResult::Signal(SignalModel {
                    id: line.number,
                    line: line.number,
                    classifier: self.id.clone(),
                    name: name.to_string(),
                    value: value.trim_matches('"').to_string(),
                    timestamp: sniff_timestamp(&line.text),
                    raw_text: clip_raw_text(&line.text),
                })
            }
            RuleKind::Exception => ClassificationResult::Exception(ExceptionModel {
                id: line.number,
                line: line.number,
                classifier: self.id.clone(),
                exception_type: group("type").unwrap_or(self.id.as_str()).to_string(),
                message: group("message").unwrap_or_default().to_string(),
                stack: self.collect_stack(line, ctx),
                timestamp: sniff_timestamp(&line.text),
                raw_text: clip_raw_text(&line.text),
            }),
            RuleKind::Error => {
                let reason = match group("reason") {
                    Some(r) if !r.is_empty() => r.to_string(),
                    _ if !self.description.is_empty() => self.description.clone(),
                    _ => format!("matched rule '{}'", self.id),
                };
                ClassificationResult::ErrorLine(ErrorLine {
                    id: line.number,
                    line: line.number,
                    classifier: self.id.clone(),
                    reason,
                    raw_text: clip_raw_text(&line.text),
                })
            }
        };

        tracing::trace!(
            rule = %self.id,
            line = line.number,
            text = crate::util::logging::preview(&line.text),
            "Rule matched"
        );
        Ok(result)
    }
}

// =============================================================================
// Malformed-line classifier
// =============================================================================

/// Flags structurally invalid lines: undecodable bytes (replaced with U+FFFD
/// on read), embedded control characters, or excessive length.
#[derive(Debug, Clone)]
pub struct MalformedLineClassifier {
    max_line_length: usize,
}

impl MalformedLineClassifier {
    pub const ID: &'static str = "malformed-line";

    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    fn defect(&self, text: &str) -> Option<String> {
        if text.len() > self.max_line_length {
            return Some(format!(
                "line is {} bytes, exceeds maximum of {}",
                text.len(),
                self.max_line_length
            ));
        }
        if text.contains('\u{FFFD}') {
            return Some("line contains invalid UTF-8".to_string());
        }
        if let Some(c) = text.chars().find(|c| c.is_control() && *c != '\t') {
            return Some(format!("line contains control character U+{:04X}", c as u32));
        }
        None
    }
}

impl Default for MalformedLineClassifier {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Classifier for MalformedLineClassifier {
    fn id(&self) -> &str {
        Self::ID
    }

    fn can_handle(&self, line: &Logline) -> bool {
        self.defect(&line.text).is_some()
    }

    fn classify(
        &self,
        line: &Logline,
        _ctx: &SourceContext<'_>,
    ) -> Result<ClassificationResult, ClassifyError> {
        let reason = self.defect(&line.text).ok_or_else(|| ClassifyError::Invalid {
            classifier: Self::ID.to_string(),
            line_number: line.number,
            reason: "line is well-formed".to_string(),
        })?;
        Ok(ClassificationResult::ErrorLine(ErrorLine {
            id: line.number,
            line: line.number,
            classifier: Self::ID.to_string(),
            reason,
            raw_text: clip_raw_text(&line.text),
        }))
    }
}

// =============================================================================
// Built-in rules (embedded at compile time)
// =============================================================================

/// Embedded TOML content for the built-in rule set.
pub const BUILTIN_RULES: &str = include_str!("../../rules/default.toml");

/// Compile the built-in rule set.
///
/// A failure here is a bug in the embedded file; callers degrade to an empty
/// rule list after logging it.
pub fn load_builtin_rules(config: &RuleConfig) -> Result<Vec<RuleClassifier>, RulesError> {
    let path = Path::new("<builtin>/default.toml");
    let rules = compile_rule_file(parse_rules_toml(BUILTIN_RULES, path)?, config)?;
    tracing::debug!(count = rules.len(), "Loaded built-in rules");
    Ok(rules)
}

// =============================================================================
// Tests
// =============================================================================
