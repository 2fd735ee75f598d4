//! Declared patterns, thresholds and deductions for report validation.

use super::{Grade, ValidatorError};
use serde::{Deserialize, Serialize};

/// A section the report must mention, found by any of its markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRule {
    /// Name used in feedback messages
    pub name: String,
    /// Case-insensitive word prefixes; any one satisfies the rule
    pub markers: Vec<String>,
}

impl SectionRule {
    pub fn new(name: &str, markers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            markers: strings(markers),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    Sprint,
    TestCycle,
    Incident,
    Metric,
}

impl CitationKind {
    pub fn label(&self) -> &'static str {
        match self {
            CitationKind::Sprint => "sprint name",
            CitationKind::TestCycle => "test cycle name",
            CitationKind::Incident => "incident id",
            CitationKind::Metric => "quantified metric",
        }
    }
}

/// A concrete identifier the report is expected to cite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationRule {
    pub kind: CitationKind,
    /// Regular expression matched against the whole report
    pub pattern: String,
    /// Suggested citation when no fixture data is available
    pub example: String,
}

impl CitationRule {
    pub fn new(kind: CitationKind, pattern: &str, example: &str) -> Self {
        Self {
            kind,
            pattern: pattern.to_string(),
            example: example.to_string(),
        }
    }
}

/// Heuristics for spotting specific, imperative recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionabilityRule {
    /// Verbs a recommendation line may start with
    pub imperative_verbs: Vec<String>,
    /// Phrases that make a line generic unless it also carries a number
    pub generic_phrases: Vec<String>,
    /// Short lines containing one of these open a recommendation block
    pub block_markers: Vec<String>,
    /// Marker lines longer than this are prose, not block headers
    pub max_marker_words: usize,
    pub min_words: usize,
    /// Distinct actionable lines required
    pub min_actions: usize,
    pub deduction: u32,
}

impl Default for ActionabilityRule {
    fn default() -> Self {
        Self {
            imperative_verbs: strings(&[
                "add", "adopt", "allocate", "assign", "audit", "automate", "cap", "create",
                "define", "document", "enforce", "escalate", "establish", "extend", "fix",
                "implement", "increase", "introduce", "investigate", "limit", "monitor",
                "pair", "prioritize", "quarantine", "reduce", "refactor", "refine", "remove",
                "replace", "require", "resolve", "review", "rewrite", "run", "schedule", "set",
                "split", "stabilize", "track", "unblock", "update",
            ]),
            generic_phrases: strings(&[
                "plan better",
                "improve quality",
                "improve communication",
                "communicate more",
                "work harder",
                "be more careful",
                "improve the process",
                "improve processes",
                "focus on quality",
                "do better",
                "keep an eye on",
                "continue to monitor",
            ]),
            block_markers: strings(&["recommendation", "action item", "next step"]),
            max_marker_words: 6,
            min_words: 4,
            min_actions: 3,
            deduction: 15,
        }
    }
}

/// Severity labelling of problem entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityRule {
    /// Recognized labels, matched case-insensitively as whole words
    pub labels: Vec<String>,
    /// Heading text that opens the problem list
    pub section_marker: String,
    pub per_entry_deduction: u32,
    pub max_deduction: u32,
}

impl Default for SeverityRule {
    fn default() -> Self {
        Self {
            labels: strings(&["critical", "high", "medium", "low"]),
            section_marker: "problem area".to_string(),
            per_entry_deduction: 5,
            max_deduction: 15,
        }
    }
}

/// Minimum score for each letter grade; anything below `d` is an F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeScale {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl Default for GradeScale {
    fn default() -> Self {
        Self {
            a: 90,
            b: 80,
            c: 70,
            d: 60,
        }
    }
}

impl GradeScale {
    pub fn grade(&self, score: u32) -> Grade {
        if score >= self.a {
            Grade::A
        } else if score >= self.b {
            Grade::B
        } else if score >= self.c {
            Grade::C
        } else if score >= self.d {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn validate(&self) -> Result<(), ValidatorError> {
        if self.a > 100 || !(self.a > self.b && self.b > self.c && self.c > self.d) {
            return Err(ValidatorError::InvalidGradeScale {
                message: format!(
                    "cutoffs must be strictly descending and at most 100 (got A={}, B={}, C={}, D={})",
                    self.a, self.b, self.c, self.d
                ),
            });
        }
        Ok(())
    }
}

/// Full validator configuration.
///
/// Every deduction and threshold is exposed here so teams can retune the
/// scoring without touching the checks themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub sections: Vec<SectionRule>,
    /// Points lost per missing section
    pub section_deduction: u32,
    pub citations: Vec<CitationRule>,
    /// Points lost per citation kind with no match at all
    pub citation_deduction: u32,
    /// Points lost per citation kind naming ids absent from the fixtures
    pub unknown_citation_deduction: u32,
    pub actionability: ActionabilityRule,
    pub severity: SeverityRule,
    /// A report passes when its score is strictly above this
    pub pass_threshold: u32,
    pub grades: GradeScale,
    /// Word-count bounds that raise non-scoring warnings
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            sections: vec![
                SectionRule::new("Executive Summary", &["executive summary"]),
                SectionRule::new("Problem Areas", &["problem area"]),
                SectionRule::new("Delivery Analysis", &["jira", "sprint"]),
                SectionRule::new("Test Quality Analysis", &["zephyr", "test"]),
                SectionRule::new("Incident Analysis", &["incident"]),
            ],
            section_deduction: 10,
            citations: vec![
                CitationRule::new(
                    CitationKind::Sprint,
                    r"(?i)\bsprint\s+\d{4}-\d{1,2}-\d+\b",
                    "Sprint 2024-11-1",
                ),
                CitationRule::new(
                    CitationKind::TestCycle,
                    r"\b[A-Z][A-Za-z]*-[A-Z][a-z]{2}-Week\d+\b",
                    "Regression-Dec-Week2",
                ),
                CitationRule::new(CitationKind::Incident, r"\bINC-\d+\b", "INC-301"),
                CitationRule::new(
                    CitationKind::Metric,
                    r"\d+(?:\.\d+)?\s?%|\b\d+\s+(?:of|/)\s+\d+\b",
                    "35 of 48 points",
                ),
            ],
            citation_deduction: 5,
            unknown_citation_deduction: 5,
            actionability: ActionabilityRule::default(),
            severity: SeverityRule::default(),
            pass_threshold: 70,
            grades: GradeScale::default(),
            min_words: 100,
            max_words: 2000,
        }
    }
}

impl ValidatorConfig {
    pub fn with_pass_threshold(mut self, threshold: u32) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_grades(mut self, grades: GradeScale) -> Self {
        self.grades = grades;
        self
    }

    pub fn with_section_deduction(mut self, points: u32) -> Self {
        self.section_deduction = points;
        self
    }

    pub fn with_section(mut self, rule: SectionRule) -> Self {
        self.sections.push(rule);
        self
    }

    pub fn validate(&self) -> Result<(), ValidatorError> {
        self.grades.validate()?;

        if self.pass_threshold > 100 {
            return Err(invalid(format!(
                "pass_threshold must be at most 100, got {}",
                self.pass_threshold
            )));
        }
        if let Some(rule) = self.sections.iter().find(|s| s.markers.is_empty()) {
            return Err(invalid(format!("section '{}' has no markers", rule.name)));
        }
        if self.severity.labels.is_empty() {
            return Err(invalid("severity labels must not be empty".to_string()));
        }
        if self.actionability.imperative_verbs.is_empty() {
            return Err(invalid("imperative verb list must not be empty".to_string()));
        }
        if self.min_words > self.max_words {
            return Err(invalid(format!(
                "min_words ({}) exceeds max_words ({})",
                self.min_words, self.max_words
            )));
        }
        Ok(())
    }
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn invalid(message: String) -> ValidatorError {
    ValidatorError::InvalidConfig { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grade_scale() {
        let scale = GradeScale::default();
        assert_eq!(scale.grade(100), Grade::A);
        assert_eq!(scale.grade(90), Grade::A);
        assert_eq!(scale.grade(89), Grade::B);
        assert_eq!(scale.grade(70), Grade::C);
        assert_eq!(scale.grade(60), Grade::D);
        assert_eq!(scale.grade(59), Grade::F);
        assert_eq!(scale.grade(0), Grade::F);
    }

    #[test]
    fn test_grade_scale_must_descend() {
        let flat = GradeScale {
            a: 90,
            b: 90,
            c: 70,
            d: 60,
        };
        assert!(flat.validate().is_err());

        let over = GradeScale {
            a: 101,
            ..Default::default()
        };
        assert!(over.validate().is_err());
        assert!(GradeScale::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(ValidatorConfig::default().validate().is_ok());
        assert!(ValidatorConfig::default()
            .with_pass_threshold(120)
            .validate()
            .is_err());
        assert!(ValidatorConfig::default()
            .with_section(SectionRule::new("Appendix", &[]))
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: ValidatorConfig = toml::from_str(
            r#"
            pass_threshold = 80
            section_deduction = 20

            [grades]
            a = 95
            "#,
        )
        .unwrap();

        assert_eq!(config.pass_threshold, 80);
        assert_eq!(config.section_deduction, 20);
        assert_eq!(config.grades.a, 95);
        assert_eq!(config.grades.b, 80);
        assert_eq!(config.sections.len(), 5);
        assert_eq!(config.actionability.min_actions, 3);
    }
}
