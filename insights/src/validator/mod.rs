//! Report validator: structural, citation, actionability and severity checks
//! combined into a deterministic weighted score.
//!
//! Validation never fails on report text. Arbitrary input is scored and its
//! deficiencies are listed; only an invalid [`ValidatorConfig`] is an error.
//!
//! ```rust
//! use insights::validator::{Grade, ReportValidator};
//!
//! let validator = ReportValidator::with_default_config().unwrap();
//! let outcome = validator.validate("Recent sprint had low velocity", None);
//! assert!(!outcome.passed);
//! assert_eq!(outcome.grade, Grade::F);
//! ```

mod checks;
pub mod config;

pub use checks::actionable_lines;
pub use config::{
    ActionabilityRule, CitationKind, CitationRule, GradeScale, SectionRule, SeverityRule,
    ValidatorConfig,
};

use crate::fixtures::FixtureSet;
use checks::{CompiledCitation, CompiledSection, SeverityPatterns};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("Invalid {name} pattern: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid grade scale: {message}")]
    InvalidGradeScale { message: String },

    #[error("Invalid validator configuration: {message}")]
    InvalidConfig { message: String },
}

pub type ValidatorResult<T> = Result<T, ValidatorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// The four scoring checks, in the order their messages are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Sections,
    Citations,
    Actionability,
    Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub check: Check,
    pub points: u32,
    pub message: String,
}

impl Deduction {
    pub(crate) fn new(check: Check, points: u32, message: String) -> Self {
        Self {
            check,
            points,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    /// 0 to 100
    pub score: u32,
    pub grade: Grade,
    /// One message per deficiency, ordered by check
    pub messages: Vec<String>,
    pub deductions: Vec<Deduction>,
    /// Non-scoring observations
    pub warnings: Vec<String>,
    pub word_count: usize,
}

impl ValidationOutcome {
    /// Points lost to one check.
    pub fn points_lost(&self, check: Check) -> u32 {
        self.deductions
            .iter()
            .filter(|d| d.check == check)
            .map(|d| d.points)
            .sum()
    }

    /// Feedback for a revision request, one numbered line per message.
    pub fn feedback(&self) -> String {
        self.messages
            .iter()
            .enumerate()
            .map(|(i, m)| format!("{}. {}", i + 1, m))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASSED" } else { "FAILED" };
        write!(
            f,
            "{} score {}/100 (grade {}), {} issue(s)",
            status,
            self.score,
            self.grade,
            self.messages.len()
        )
    }
}

pub struct ReportValidator {
    config: ValidatorConfig,
    sections: Vec<CompiledSection>,
    citations: Vec<CompiledCitation>,
    severity: SeverityPatterns,
}

impl ReportValidator {
    pub fn new(config: ValidatorConfig) -> ValidatorResult<Self> {
        config.validate()?;

        let citations = config
            .citations
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| CompiledCitation {
                        kind: rule.kind,
                        regex,
                        example: rule.example.clone(),
                    })
                    .map_err(|source| ValidatorError::InvalidPattern {
                        name: rule.kind.label().to_string(),
                        source,
                    })
            })
            .collect::<ValidatorResult<Vec<_>>>()?;

        let labels = config
            .severity
            .labels
            .iter()
            .map(|l| regex::escape(l))
            .collect::<Vec<_>>()
            .join("|");
        let compile = |name: &str, pattern: String| {
            Regex::new(&pattern).map_err(|source| ValidatorError::InvalidPattern {
                name: name.to_string(),
                source,
            })
        };
        // Markers match at the start of a word, so "latest" does not count as "test".
        let sections = config
            .sections
            .iter()
            .map(|rule| {
                let patterns = rule
                    .markers
                    .iter()
                    .map(|m| compile("section marker", format!(r"(?i)\b{}", regex::escape(m.trim()))))
                    .collect::<ValidatorResult<Vec<_>>>()?;
                Ok(CompiledSection {
                    name: rule.name.clone(),
                    markers: rule.markers.clone(),
                    patterns,
                })
            })
            .collect::<ValidatorResult<Vec<_>>>()?;

        let severity = SeverityPatterns {
            token: compile("severity label", format!(r"(?i)\b(?:{})\b", labels))?,
            field: compile(
                "severity field",
                r"(?i)\bseverity\b\s*\**\s*[:=]\s*\**\s*([A-Za-z]+)".to_string(),
            )?,
        };

        Ok(Self {
            config,
            sections,
            citations,
            severity,
        })
    }

    pub fn with_default_config() -> ValidatorResult<Self> {
        Self::new(ValidatorConfig::default())
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Score a report. When `fixtures` is supplied, suggestions name real
    /// identifiers and cited identifiers are cross-checked against them.
    pub fn validate(&self, text: &str, fixtures: Option<&FixtureSet>) -> ValidationOutcome {
        let config = &self.config;

        let mut deductions = checks::sections(text, &self.sections, config.section_deduction);
        deductions.extend(checks::citations(text, &self.citations, fixtures, config));
        deductions.extend(checks::actionability(text, &config.actionability));
        deductions.extend(checks::severity(
            text,
            &config.severity,
            &config.actionability,
            &self.severity,
        ));

        let lost: u32 = deductions.iter().map(|d| d.points).sum();
        let score = 100u32.saturating_sub(lost);
        let grade = config.grades.grade(score);
        let passed = score > config.pass_threshold;

        debug!(
            "Validated report: score {} grade {} with {} deduction(s)",
            score,
            grade,
            deductions.len()
        );

        ValidationOutcome {
            passed,
            score,
            grade,
            messages: deductions.iter().map(|d| d.message.clone()).collect(),
            warnings: checks::warnings(text, config),
            word_count: text.split_whitespace().count(),
            deductions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::sample_fixtures;

    const PASSING: &str = "\
# Quality Report: Payments

## Executive Summary
Sprint 2024-11-1 completed 35 of 48 planned points (72.92%) while
Regression-Dec-Week2 passed 66.67% of its tests. INC-323 is still open.

## Problem Areas
### 1. Delivery - HIGH
Sprint 2024-11-1 missed its commitment by 13 points.

### 2. Test Quality - MEDIUM
TEST-004 and TEST-002 fail intermittently.

**Recommendations:**
- Reduce the Sprint 2024-12-1 commitment to 36 points
- Quarantine TEST-004 until it passes 5 consecutive runs
- Assign an incident commander to INC-323 today

## Detailed Analysis
### Jira Sprint Metrics
Velocity is declining.
### Test Quality (Zephyr)
Pass rate fell.
### Incidents
Seven incidents in 30 days.
";

    fn validator() -> ReportValidator {
        ReportValidator::with_default_config().unwrap()
    }

    #[test]
    fn test_complete_report_passes_with_a() {
        let outcome = validator().validate(PASSING, Some(&sample_fixtures()));
        assert!(outcome.passed, "{:?}", outcome.messages);
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.grade, Grade::A);
        assert!(outcome.messages.is_empty());
    }

    #[test]
    fn test_vague_report_fails() {
        let outcome = validator().validate("Recent sprint had low velocity", None);
        assert!(!outcome.passed);
        assert_eq!(outcome.points_lost(Check::Sections), 40);
        assert_eq!(outcome.points_lost(Check::Citations), 20);
        assert_eq!(outcome.points_lost(Check::Actionability), 15);
        assert_eq!(outcome.points_lost(Check::Severity), 0);
        assert_eq!(outcome.score, 25);
        assert_eq!(outcome.grade, Grade::F);

        let checks: Vec<Check> = outcome.deductions.iter().map(|d| d.check).collect();
        let mut sorted = checks.clone();
        sorted.sort_by_key(|c| *c as u8);
        assert_eq!(checks, sorted);
    }

    #[test]
    fn test_missing_section_costs_exactly_its_deduction() {
        let cases: [(&str, &[(&str, &str)]); 4] = [
            ("Executive Summary", &[("## Executive Summary\n", "## Overview\n")]),
            ("Problem Areas", &[("## Problem Areas\n", "## Findings\n")]),
            (
                "Test Quality Analysis",
                &[
                    ("Test Quality (Zephyr)", "Coverage"),
                    ("Test Quality", "Coverage"),
                    ("TEST-", "CASE-"),
                    ("of its tests", "of its cases"),
                ],
            ),
            (
                "Incident Analysis",
                &[
                    ("an incident commander", "an on-call lead"),
                    ("### Incidents", "### Outages"),
                    ("Seven incidents", "Seven outages"),
                ],
            ),
        ];

        let fixtures = sample_fixtures();
        for (section, edits) in cases {
            let text = edits
                .iter()
                .fold(PASSING.to_string(), |text, (from, to)| text.replace(from, to));
            let outcome = validator().validate(&text, Some(&fixtures));
            assert_eq!(outcome.score, 90, "{}: {:?}", section, outcome.messages);
            assert_eq!(outcome.messages.len(), 1);
            assert!(outcome.messages[0].contains(section));
        }
    }

    #[test]
    fn test_markers_match_whole_word_starts() {
        let outcome = validator().validate("The latest sprint had low velocity", None);
        assert_eq!(outcome.points_lost(Check::Sections), 40);
        assert!(outcome
            .messages
            .iter()
            .any(|m| m.contains("'Test Quality Analysis'")));

        let outcome = validator().validate("Flaky tests slowed the sprint", None);
        assert_eq!(outcome.points_lost(Check::Sections), 30);
    }

    #[test]
    fn test_recommendations_inside_problem_areas_are_not_entries() {
        let text = "\
# Quality Report: Payments

## Executive Summary
Sprint 2024-12-2 completed 33 of 44 planned points (75%).

## Problem Areas
- Velocity drop in Sprint 2024-12-2 (HIGH)
- Flaky TEST-004 in Regression-Dec-Week2 (MEDIUM)

**Recommendations:**
- Reduce the next sprint commitment to 33 points
- Quarantine TEST-004 until it passes 5 consecutive runs
- Assign an incident commander to INC-323 this week

## Detailed Analysis
Jira velocity and Zephyr results are summarized above.
";
        let outcome = validator().validate(text, Some(&sample_fixtures()));
        assert_eq!(outcome.points_lost(Check::Severity), 0, "{:?}", outcome.messages);
        assert_eq!(outcome.score, 100);
    }

    #[test]
    fn test_empty_problem_areas_cost_nothing() {
        let text = PASSING.replace(
            "### 1. Delivery - HIGH\n\
             Sprint 2024-11-1 missed its commitment by 13 points.\n\n\
             ### 2. Test Quality - MEDIUM\n\
             TEST-004 and TEST-002 fail intermittently.\n",
            "No problem areas were detected.\n",
        );
        assert!(text.contains("No problem areas were detected."));

        let outcome = validator().validate(&text, Some(&sample_fixtures()));
        assert_eq!(outcome.points_lost(Check::Severity), 0);
        assert_eq!(outcome.score, 100);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let fixtures = sample_fixtures();
        let validator = validator();
        let text = PASSING.replace("HIGH", "urgent");
        assert_eq!(
            validator.validate(&text, Some(&fixtures)),
            validator.validate(&text, Some(&fixtures))
        );
    }

    #[test]
    fn test_untagged_problem_entry() {
        let text = PASSING.replace("### 1. Delivery - HIGH", "### 1. Delivery");
        let outcome = validator().validate(&text, None);
        assert_eq!(outcome.points_lost(Check::Severity), 5);
        assert!(outcome.messages[0].contains("'Delivery' has no severity label"));
    }

    #[test]
    fn test_unrecognized_severity_field() {
        let text = PASSING.replace(
            "TEST-004 and TEST-002 fail intermittently.",
            "Severity: urgent. TEST-004 and TEST-002 fail intermittently.",
        );
        let outcome = validator().validate(&text, None);
        assert_eq!(outcome.points_lost(Check::Severity), 5);
        assert!(outcome.messages[0].contains("unrecognized severity 'urgent'"));
    }

    #[test]
    fn test_severity_deduction_is_capped() {
        let text = "\
## Problem Areas
1. Velocity
2. Flakiness
3. Incidents
4. Blockers
5. Hiring
";
        let outcome = validator().validate(text, None);
        assert_eq!(outcome.points_lost(Check::Severity), 15);
        assert_eq!(
            outcome
                .deductions
                .iter()
                .filter(|d| d.check == Check::Severity)
                .count(),
            5
        );
    }

    #[test]
    fn test_unknown_citations_with_fixtures() {
        let text = PASSING.replace("INC-323 is still open", "INC-999 is still open");
        let outcome = validator().validate(&text, Some(&sample_fixtures()));
        assert_eq!(outcome.points_lost(Check::Citations), 5);
        assert!(outcome.messages[0].contains("INC-999"));

        // without fixtures there is nothing to cross-check
        assert_eq!(validator().validate(&text, None).score, 100);
    }

    #[test]
    fn test_citation_suggestion_uses_fixtures() {
        let outcome = validator().validate("No identifiers here at all", Some(&sample_fixtures()));
        let sprint = outcome
            .messages
            .iter()
            .find(|m| m.contains("sprint name"))
            .unwrap();
        assert!(sprint.contains("Sprint 2024-12-2"));
        let incident = outcome.messages.iter().find(|m| m.contains("incident id")).unwrap();
        assert!(incident.contains("INC-325"));
    }

    #[test]
    fn test_adding_missing_sections_never_raises_score() {
        let validator = validator();
        let mut text = PASSING.to_string();
        let mut last = validator.validate(&text, None).score;
        for (from, to) in [
            ("Executive Summary", "Overview"),
            ("Problem Areas", "Findings"),
            ("Incidents", "Outages"),
        ] {
            text = text.replace(from, to);
            let score = validator.validate(&text, None).score;
            assert!(score <= last);
            last = score;
        }
    }

    #[test]
    fn test_pass_threshold_is_strict() {
        let config = ValidatorConfig::default().with_pass_threshold(90);
        let validator = ReportValidator::new(config).unwrap();
        let text = PASSING.replace("## Executive Summary\n", "## Overview\n");
        let outcome = validator.validate(&text, None);
        assert_eq!(outcome.score, 90);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let mut config = ValidatorConfig::default();
        config.citations[0].pattern = "(unclosed".to_string();
        assert!(matches!(
            ReportValidator::new(config),
            Err(ValidatorError::InvalidPattern { .. })
        ));
    }
}
