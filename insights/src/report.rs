//! Synthesized quality report and its markdown rendering.

use crate::analysis::ProblemArea;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub team_name: String,
    pub generated_at: DateTime<Utc>,
    pub executive_summary: String,
    pub problem_areas: Vec<ProblemArea>,
    pub delivery_summary: String,
    pub test_summary: String,
    pub incident_summary: String,
}

impl QualityReport {
    pub fn new(team_name: impl Into<String>, executive_summary: impl Into<String>) -> Self {
        Self {
            team_name: team_name.into(),
            generated_at: Utc::now(),
            executive_summary: executive_summary.into(),
            problem_areas: Vec::new(),
            delivery_summary: String::new(),
            test_summary: String::new(),
            incident_summary: String::new(),
        }
    }

    /// Replace the problem list, ordered most severe first.
    pub fn with_problems(mut self, mut problems: Vec<ProblemArea>) -> Self {
        // sort_by is stable, so detection order survives within a severity
        problems.sort_by(|a, b| b.severity.cmp(&a.severity));
        self.problem_areas = problems;
        self
    }

    pub fn with_sections(
        mut self,
        delivery: impl Into<String>,
        test: impl Into<String>,
        incident: impl Into<String>,
    ) -> Self {
        self.delivery_summary = delivery.into();
        self.test_summary = test.into();
        self.incident_summary = incident.into();
        self
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    pub fn critical_problems(&self) -> Vec<&ProblemArea> {
        self.problem_areas.iter().filter(|p| p.is_critical()).collect()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.problem_areas.iter().any(ProblemArea::is_critical)
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            format!("# Quality Report: {}", self.team_name),
            format!("*Generated: {}*", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
            String::new(),
            "## Executive Summary".to_string(),
            self.executive_summary.clone(),
            String::new(),
            "## Problem Areas".to_string(),
        ];

        if self.problem_areas.is_empty() {
            lines.push("No problem areas were detected.".to_string());
            lines.push(String::new());
        }

        for (i, problem) in self.problem_areas.iter().enumerate() {
            lines.push(format!(
                "### {}. {} - {}",
                i + 1,
                problem.category.label(),
                problem.severity.tag()
            ));
            lines.push(format!("**{}.** {}", problem.title, problem.description));
            lines.push(String::new());
            lines.push("**Recommendations:**".to_string());
            lines.extend(problem.recommendations.iter().map(|r| format!("- {}", r)));
            lines.push(String::new());
        }

        lines.extend([
            "## Detailed Analysis".to_string(),
            String::new(),
            "### Jira Sprint Metrics".to_string(),
            self.delivery_summary.clone(),
            String::new(),
            "### Test Quality (Zephyr)".to_string(),
            self.test_summary.clone(),
            String::new(),
            "### Incidents".to_string(),
            self.incident_summary.clone(),
        ]);

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ProblemCategory;
    use crate::fixtures::Severity;

    fn problem(category: ProblemCategory, severity: Severity, title: &str) -> ProblemArea {
        ProblemArea {
            category,
            title: title.to_string(),
            description: format!("{} description", title),
            severity,
            recommendations: vec![format!("Review {} with the team", title)],
        }
    }

    fn report() -> QualityReport {
        QualityReport::new("Payments", "Delivery slipped in Sprint 2024-12-2.")
            .with_problems(vec![
                problem(ProblemCategory::Delivery, Severity::Medium, "first medium"),
                problem(ProblemCategory::Reliability, Severity::Critical, "outage"),
                problem(ProblemCategory::TestQuality, Severity::Medium, "second medium"),
                problem(ProblemCategory::Delivery, Severity::Low, "blocked"),
            ])
            .with_sections("Sprint text", "Cycle text", "Incident text")
    }

    #[test]
    fn test_problems_sorted_by_severity_stably() {
        let report = report();
        let titles: Vec<&str> = report
            .problem_areas
            .iter()
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(titles, vec!["outage", "first medium", "second medium", "blocked"]);
    }

    #[test]
    fn test_critical_helpers() {
        let report = report();
        assert!(report.has_critical_issues());
        assert_eq!(report.critical_problems().len(), 1);

        let calm = QualityReport::new("Payments", "All quiet.");
        assert!(!calm.has_critical_issues());
    }

    #[test]
    fn test_markdown_layout() {
        let markdown = report().to_markdown();
        let order = [
            "# Quality Report: Payments",
            "## Executive Summary",
            "## Problem Areas",
            "### 1. Reliability - CRITICAL",
            "### 2. Delivery - MEDIUM",
            "### 3. Test Quality - MEDIUM",
            "### 4. Delivery - LOW",
            "## Detailed Analysis",
            "### Jira Sprint Metrics",
            "### Test Quality (Zephyr)",
            "### Incidents",
        ];
        let mut cursor = 0;
        for heading in order {
            let found = markdown[cursor..]
                .find(heading)
                .unwrap_or_else(|| panic!("missing or out of order: {}", heading));
            cursor += found + heading.len();
        }
        assert!(markdown.contains("**Recommendations:**\n- Review outage with the team"));
    }
}
