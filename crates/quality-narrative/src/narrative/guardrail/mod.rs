//! Grounding checks wrapped around narrative generation.
//!
//! `preflight` inspects an assembled context before any text is requested.
//! `postflight` inspects generated text against that context. The postflight
//! check is best-effort: it extracts figures, facility-like proper names, and
//! phrases with regular expressions and compares them to the context and to
//! fixed lexicons. It does not understand the text, so a paraphrased claim
//! that avoids every pattern will pass.

mod grounding;
mod lexicon;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::catalog::{Domain, MetricCatalog};
use super::classifier::DirectionLabel;
use super::context::NarrativeContext;
use grounding::{names_facility, GroundingSet};
use lexicon::{formatting_marker, Lexicon};

const DEFAULT_MAX_WORDS: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingMetric,
    DuplicateMetric,
    UnknownMetric,
    MissingDomain,
    MissingVintage,
    NonFiniteValue,
    LabelMismatch,
    UngroundedFigure,
    UnknownFacility,
    UnsupportedTopic,
    CausalLanguage,
    PredictiveLanguage,
    ExternalComparison,
    ToneViolation,
    FormattingViolation,
    LengthExceeded,
    EmptyNarrative,
}

/// One claim, token, or structural gap not traceable to the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub token: String,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            token: token.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub max_words: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

/// Stateless validator; one instance is shared by every request.
#[derive(Debug, Clone)]
pub struct GuardrailValidator {
    config: GuardrailConfig,
    lexicon: Lexicon,
}

impl GuardrailValidator {
    pub fn new(config: GuardrailConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            config,
            lexicon: Lexicon::compile()?,
        })
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Structural completeness of an assembled context.
    pub fn preflight(&self, context: &NarrativeContext, catalog: &MetricCatalog) -> Vec<Violation> {
        let mut violations = Vec::new();

        if context.data_vintage().is_none() {
            violations.push(Violation::new(
                ViolationKind::MissingVintage,
                "data_vintage",
                "context has no data vintage",
            ));
        }

        for domain in Domain::ALL {
            if !context.domains().iter().any(|section| section.domain == domain) {
                violations.push(Violation::new(
                    ViolationKind::MissingDomain,
                    domain.label(),
                    format!("context has no section for {domain}"),
                ));
            }
        }

        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for assessment in context.assessments() {
            *occurrences.entry(assessment.metric_id.as_str()).or_default() += 1;

            if !catalog.contains(&assessment.metric_id) {
                violations.push(Violation::new(
                    ViolationKind::UnknownMetric,
                    &assessment.metric_id,
                    "metric is not in the catalog",
                ));
            }

            let numbers = [
                assessment.facility_value,
                assessment.benchmark_value,
                assessment.delta,
            ];
            if numbers.iter().flatten().any(|value| !value.is_finite()) {
                violations.push(Violation::new(
                    ViolationKind::NonFiniteValue,
                    &assessment.metric_id,
                    "non-finite value must be reported as insufficient data",
                ));
            }

            let complete = assessment.facility_value.is_some()
                && assessment.benchmark_value.is_some()
                && assessment.delta.is_some();
            let consistent = match assessment.label {
                DirectionLabel::InsufficientData => assessment.delta.is_none(),
                _ => complete,
            };
            if !consistent {
                violations.push(Violation::new(
                    ViolationKind::LabelMismatch,
                    &assessment.metric_id,
                    format!(
                        "label '{}' does not match the values present",
                        assessment.label.label()
                    ),
                ));
            }
        }

        for metric in catalog.metrics() {
            match occurrences.get(metric.id.as_str()).copied().unwrap_or(0) {
                0 => violations.push(Violation::new(
                    ViolationKind::MissingMetric,
                    &metric.id,
                    "cataloged metric missing from context",
                )),
                1 => {}
                count => violations.push(Violation::new(
                    ViolationKind::DuplicateMetric,
                    &metric.id,
                    format!("metric appears {count} times"),
                )),
            }
        }

        violations
    }

    /// Check generated text against the context it was supposed to stay within.
    pub fn postflight(&self, context: &NarrativeContext, narrative: &str) -> ValidationResult {
        let mut violations = Vec::new();

        if narrative.trim().is_empty() {
            violations.push(Violation::new(
                ViolationKind::EmptyNarrative,
                "",
                "narrative is empty",
            ));
            return ValidationResult::from_violations(violations);
        }

        let word_count = narrative.split_whitespace().count();
        if word_count > self.config.max_words {
            violations.push(Violation::new(
                ViolationKind::LengthExceeded,
                word_count.to_string(),
                format!("narrative has {word_count} words; limit is {}", self.config.max_words),
            ));
        }

        for line in narrative.lines() {
            if let Some(marker) = formatting_marker(line) {
                violations.push(Violation::new(
                    ViolationKind::FormattingViolation,
                    line.trim(),
                    format!("plain text only; found {marker} markup"),
                ));
            }
        }

        let grounding = GroundingSet::from_context(context, &self.lexicon.number);
        for figure in self.lexicon.number.find_iter(narrative) {
            if !grounding.supports(figure.as_str(), &narrative[figure.end()..]) {
                violations.push(Violation::new(
                    ViolationKind::UngroundedFigure,
                    figure.as_str(),
                    "figure does not match any value in the context",
                ));
            }
        }

        for mention in self.lexicon.facility_mention.find_iter(narrative) {
            if !names_facility(context, mention.as_str()) {
                violations.push(Violation::new(
                    ViolationKind::UnknownFacility,
                    mention.as_str(),
                    "facility is not the one this narrative is grounded in",
                ));
            }
        }

        for (kind, pattern) in &self.lexicon.phrase_rules {
            for phrase in pattern.find_iter(narrative) {
                violations.push(Violation::new(
                    *kind,
                    phrase.as_str(),
                    format!("disallowed phrasing ({kind:?})"),
                ));
            }
        }

        let grounded_vocabulary = grounded_vocabulary(context);
        let topic_rules = [
            (&self.lexicon.out_of_scope, "topic is outside the supplied metrics and domains"),
            (&self.lexicon.clinical_areas, "clinical area is not among the supplied metrics"),
        ];
        for (pattern, message) in topic_rules {
            for topic in pattern.find_iter(narrative) {
                if !grounded_vocabulary.contains(&topic.as_str().to_lowercase()) {
                    violations.push(Violation::new(ViolationKind::UnsupportedTopic, topic.as_str(), message));
                }
            }
        }

        ValidationResult::from_violations(violations)
    }
}

/// Lower-cased metric names and domain labels a narrative may legitimately echo.
fn grounded_vocabulary(context: &NarrativeContext) -> String {
    let mut vocabulary = String::new();
    for section in context.domains() {
        vocabulary.push_str(&section.domain.label().to_lowercase());
        vocabulary.push('\n');
        for assessment in &section.assessments {
            vocabulary.push_str(&assessment.display_name.to_lowercase());
            vocabulary.push('\n');
        }
    }
    vocabulary
}
