//! Persona system prompts and the user prompts built for each narrator call.
//!
//! Two kinds of user prompt are built:
//!
//! 1. **Findings**: a specialist describes its evidence for the query
//! 2. **Report**: the coordinator composes the report, optionally revising
//!    a previous draft against validator feedback
//!
//! Evidence is passed as JSON so the model cites the same identifiers and
//! numbers the lookups produced.

use super::specialist::Finding;

pub const COORDINATOR_PROMPT: &str = "\
You are the Quality Insights Coordinator. You write executive quality reports \
from the findings of three specialists: delivery (Jira), test quality (Zephyr) \
and reliability (incidents).

Write for executives with little time. Lead with the most severe issues, \
support every claim with a cited metric, and never use emojis.

The report must contain, as markdown headings:
- ## Executive Summary: two or three short paragraphs on the most critical findings
- ## Problem Areas: three to five entries, each a heading of the form \
`### n. Category - SEVERITY` where SEVERITY is CRITICAL, HIGH, MEDIUM or LOW, \
followed by a **Recommendations:** list of imperative actions
- ## Detailed Analysis: subsections for Jira sprint metrics, Zephyr test quality and incidents

Cite sprint names (Sprint 2024-11-1), test cycle names (Regression-Dec-Week2), \
incident ids (INC-323) and quantities (35 of 48 points, 72.92%).";

pub const DELIVERY_ANALYST_PROMPT: &str = "\
You are a Jira Analysis Specialist covering delivery: sprint completion, \
velocity trends, and blocked or unfinished tickets.

Use get_sprint_metrics for the latest sprint and get_velocity_trend for the \
pattern over recent sprints. Call out drops of more than 10 percentage points \
between consecutive sprints and any blocked tickets by id.

Example: \"Sprint 2024-11-1 completed 35 of 48 planned points (72.92%), down \
23.08 points from Sprint 2024-10-2. QUAL-124 and QUAL-125 were blocked.\"

Always cite sprint names, point values and percentages.";

pub const TEST_QUALITY_ANALYST_PROMPT: &str = "\
You are a Test Quality Specialist covering regression pass rates and flaky tests.

Use get_test_pass_rate for the latest cycle and get_flaky_tests across all \
cycles. Name the failing tests, and separate one-off failures from tests that \
fail intermittently.

Example: \"Regression-Dec-Week2 passed 4 of 6 tests (66.67%). TEST-004 is flaky \
with a 33.33% pass rate over 6 runs.\"

Always cite cycle names, test ids and pass rates.";

pub const RELIABILITY_ANALYST_PROMPT: &str = "\
You are an Incident Management Specialist covering production reliability: \
incident volume, severity mix, unresolved incidents and MTTR.

Use get_incident_summary for the look-back window given with your evidence \
and get_mttr_by_severity for resolution times. Lead with unresolved critical \
and high incidents and the users they affect, then recurring root causes.

Example: \"The window saw 7 incidents affecting 5850 users. INC-323 \
(high, 890 users) is unresolved. Critical incidents take 6.17 hours to resolve.\"

Always cite incident ids, affected user counts and MTTR per severity.";

pub const VALIDATOR_PROMPT: &str = "\
You are a Quality Assurance Validator. A report passes only when it has every \
required section, cites concrete sprint, cycle and incident identifiers with \
numbers, gives at least three specific imperative recommendations, and tags \
every problem area critical, high, medium or low. Reports at or below the \
pass threshold are sent back with numbered feedback.";

/// Findings prompt - asks a specialist to describe its evidence
///
/// # Example
/// ```
/// use insights::agent::prompts::FindingsPrompt;
///
/// let prompt = FindingsPrompt::build("How is delivery going?", "{\"completion_rate\": 72.92}");
/// assert!(prompt.contains("How is delivery going?"));
/// assert!(prompt.contains("72.92"));
/// ```
pub struct FindingsPrompt;

impl FindingsPrompt {
    pub fn build(query: &str, evidence_json: &str) -> String {
        format!(
            "QUERY: {}\n\
             EVIDENCE (JSON from your lookups):\n{}\n\n\
             Describe these findings in one or two short paragraphs. \
             Cite identifiers and numbers exactly as they appear in the evidence. \
             You may call your tools for more detail.",
            query, evidence_json
        )
    }
}

/// Report prompt - asks the coordinator for the full markdown report
pub struct ReportPrompt;

impl ReportPrompt {
    /// # Arguments
    /// * `team_name` - Used in the report title
    /// * `query` - The user's request
    /// * `findings` - One entry per specialist
    /// * `problems_json` - Detected problem areas, most severe first
    pub fn build(team_name: &str, query: &str, findings: &[Finding], problems_json: &str) -> String {
        let sections = findings
            .iter()
            .map(|f| format!("[{}]\n{}", f.role, f.prose))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Write the quality report for team {}.\n\
             QUERY: {}\n\n\
             SPECIALIST FINDINGS:\n{}\n\n\
             DETECTED PROBLEM AREAS (JSON):\n{}\n\n\
             Respond with the markdown report only, starting with \"# Quality Report: {}\".",
            team_name, query, sections, problems_json, team_name
        )
    }
}

/// Revision prompt - returns a failing draft with the validator's feedback
///
/// # Example
/// ```
/// use insights::agent::prompts::RevisionPrompt;
///
/// let prompt = RevisionPrompt::build("# Draft", 55, "1. Missing required section 'Incident Analysis'");
/// assert!(prompt.contains("55/100"));
/// assert!(prompt.contains("Incident Analysis"));
/// ```
pub struct RevisionPrompt;

impl RevisionPrompt {
    pub fn build(previous_draft: &str, score: u32, feedback: &str) -> String {
        format!(
            "Your previous report scored {}/100 and was rejected.\n\
             FEEDBACK:\n{}\n\n\
             PREVIOUS REPORT:\n{}\n\n\
             Rewrite the full report fixing every numbered issue. \
             Keep everything that was already correct.",
            score, feedback, previous_draft
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{PersonaCatalog, Role, Specialist};
    use crate::config::AnalysisSettings;
    use crate::lookup::sample_fixtures;

    fn finding(role: Role, prose: &str) -> Finding {
        let specialist = Specialist::from_catalog(&PersonaCatalog::standard(), role).unwrap();
        Finding {
            role,
            evidence: specialist.gather(&sample_fixtures(), &AnalysisSettings::default()),
            prose: prose.to_string(),
            problems: Vec::new(),
        }
    }

    #[test]
    fn test_report_prompt_includes_every_finding() {
        let findings = vec![
            finding(Role::DeliveryAnalyst, "Sprint 2024-12-2 completed 75.0%."),
            finding(Role::ReliabilityAnalyst, "INC-323 is unresolved."),
        ];
        let prompt = ReportPrompt::build("Payments", "weekly report", &findings, "[]");
        assert!(prompt.contains("[jira_analyst]\nSprint 2024-12-2 completed 75.0%."));
        assert!(prompt.contains("[incident_analyst]\nINC-323 is unresolved."));
        assert!(prompt.contains("# Quality Report: Payments"));
    }

    #[test]
    fn test_coordinator_prompt_names_required_sections() {
        for heading in ["Executive Summary", "Problem Areas", "Detailed Analysis"] {
            assert!(COORDINATOR_PROMPT.contains(heading));
        }
    }

    #[test]
    fn test_window_and_threshold_come_from_configuration() {
        assert!(!RELIABILITY_ANALYST_PROMPT.contains("30 days"));
        assert!(!VALIDATOR_PROMPT.contains("70"));

        let settings = AnalysisSettings {
            incident_window_days: 14,
            ..AnalysisSettings::default()
        };
        let specialist =
            Specialist::from_catalog(&PersonaCatalog::standard(), Role::ReliabilityAnalyst).unwrap();
        let evidence = specialist.gather(&sample_fixtures(), &settings);
        let json = serde_json::to_string_pretty(&evidence).unwrap();
        let prompt = FindingsPrompt::build("weekly report", &json);
        assert!(prompt.contains("Last 14 days"));
    }
}
