//! Problem-area detection over specialist evidence.

use crate::fixtures::Severity;
use crate::lookup::{
    FlakyTestReport, IncidentSummary, MttrReport, PassRateSummary, SprintSummary, VelocityTrend,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed results a specialist gathered from its two lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    Delivery {
        sprint: SprintSummary,
        velocity: VelocityTrend,
    },
    TestQuality {
        pass_rate: PassRateSummary,
        flaky: FlakyTestReport,
    },
    Reliability {
        incidents: IncidentSummary,
        mttr: MttrReport,
    },
}

impl Evidence {
    /// Identifiers worth citing in prose about this evidence.
    pub fn citations(&self) -> Vec<String> {
        match self {
            Evidence::Delivery { sprint, velocity } => {
                let mut ids: Vec<String> = Vec::new();
                if !sprint.is_empty() {
                    ids.push(sprint.sprint_name.clone());
                }
                for s in [&velocity.lowest_sprint, &velocity.highest_sprint].into_iter().flatten() {
                    if !ids.contains(&s.sprint_name) {
                        ids.push(s.sprint_name.clone());
                    }
                }
                ids.extend(sprint.blocked_ticket_ids.iter().cloned());
                ids
            }
            Evidence::TestQuality { pass_rate, flaky } => {
                let mut ids: Vec<String> = Vec::new();
                if !pass_rate.is_empty() {
                    ids.push(pass_rate.cycle_name.clone());
                }
                ids.extend(flaky.flaky_tests.iter().map(|t| t.test_id.clone()));
                ids
            }
            Evidence::Reliability { incidents, .. } => {
                incidents.incidents.iter().map(|i| i.id.clone()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemCategory {
    Delivery,
    TestQuality,
    Reliability,
}

impl ProblemCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ProblemCategory::Delivery => "Delivery",
            ProblemCategory::TestQuality => "Test Quality",
            ProblemCategory::Reliability => "Reliability",
        }
    }
}

impl fmt::Display for ProblemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemArea {
    pub category: ProblemCategory,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub recommendations: Vec<String>,
}

impl ProblemArea {
    fn new(
        category: ProblemCategory,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category,
            title: title.into(),
            description: description.into(),
            severity,
            recommendations: Vec::new(),
        }
    }

    fn recommend(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Thresholds that turn evidence into problem areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemRules {
    /// Completion rate (percent) the latest sprint should reach
    pub completion_target: f64,
    /// Completion rate below which the shortfall is high severity
    pub completion_floor: f64,
    /// Sprint-to-sprint completion drop (percentage points) worth flagging
    pub velocity_drop_threshold: f64,
    /// Blocked tickets at which the blocked-work problem escalates to medium
    pub blocked_escalation: usize,
    pub pass_rate_target: f64,
    pub pass_rate_floor: f64,
    /// Flaky tests at which the flakiness problem escalates to high
    pub flaky_escalation: usize,
    pub critical_mttr_hours: f64,
    /// Incidents in the look-back window that count as elevated volume
    pub incident_volume_threshold: usize,
}

impl Default for ProblemRules {
    fn default() -> Self {
        Self {
            completion_target: 85.0,
            completion_floor: 70.0,
            velocity_drop_threshold: 10.0,
            blocked_escalation: 3,
            pass_rate_target: 90.0,
            pass_rate_floor: 80.0,
            flaky_escalation: 3,
            critical_mttr_hours: 4.0,
            incident_volume_threshold: 5,
        }
    }
}

impl ProblemRules {
    pub fn validate(&self) -> Result<(), String> {
        if self.completion_floor > self.completion_target {
            return Err(format!(
                "completion_floor ({}) must not exceed completion_target ({})",
                self.completion_floor, self.completion_target
            ));
        }
        if self.pass_rate_floor > self.pass_rate_target {
            return Err(format!(
                "pass_rate_floor ({}) must not exceed pass_rate_target ({})",
                self.pass_rate_floor, self.pass_rate_target
            ));
        }
        if self.velocity_drop_threshold < 0.0 || self.critical_mttr_hours < 0.0 {
            return Err("thresholds must not be negative".to_string());
        }
        Ok(())
    }
}

/// Problems evident in one specialist's evidence, in detection order.
pub fn detect_problems(evidence: &Evidence, rules: &ProblemRules) -> Vec<ProblemArea> {
    match evidence {
        Evidence::Delivery { sprint, velocity } => delivery_problems(sprint, velocity, rules),
        Evidence::TestQuality { pass_rate, flaky } => test_problems(pass_rate, flaky, rules),
        Evidence::Reliability { incidents, mttr } => reliability_problems(incidents, mttr, rules),
    }
}

fn delivery_problems(
    sprint: &SprintSummary,
    velocity: &VelocityTrend,
    rules: &ProblemRules,
) -> Vec<ProblemArea> {
    let mut problems = Vec::new();

    if !sprint.is_empty() && sprint.completion_rate < rules.completion_target {
        let severity = if sprint.completion_rate < rules.completion_floor {
            Severity::High
        } else {
            Severity::Medium
        };
        let unfinished = sprint.total_tickets.saturating_sub(sprint.completed_tickets);
        problems.push(
            ProblemArea::new(
                ProblemCategory::Delivery,
                severity,
                "Sprint commitment missed",
                format!(
                    "{} completed {} of {} planned points ({}%), below the {}% target.",
                    sprint.sprint_name,
                    sprint.completed_points,
                    sprint.planned_points,
                    sprint.completion_rate,
                    rules.completion_target
                ),
            )
            .recommend(format!(
                "Reduce the next sprint commitment to about {} points, the scope {} actually delivered",
                sprint.completed_points, sprint.sprint_name
            ))
            .recommend(format!(
                "Review the {} unfinished tickets from {} before committing new work",
                unfinished, sprint.sprint_name
            )),
        );
    }

    if let Some(drop) = velocity.largest_drop() {
        if drop.points > rules.velocity_drop_threshold {
            let severity = if drop.points > rules.velocity_drop_threshold * 2.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            problems.push(
                ProblemArea::new(
                    ProblemCategory::Delivery,
                    severity,
                    "Velocity drop",
                    format!(
                        "Completion fell {} points from {} to {}; the {} trend averages {}% ({}% change).",
                        drop.points,
                        drop.from_sprint,
                        drop.to_sprint,
                        velocity.trend.as_str(),
                        velocity.average_completion_rate,
                        velocity.change_percent
                    ),
                )
                .recommend(format!(
                    "Run a retrospective on {} to find why completion fell {} points after {}",
                    drop.to_sprint, drop.points, drop.from_sprint
                ))
                .recommend(format!(
                    "Track planned versus completed points for each of the last {} sprints at sprint review",
                    velocity.sprints.len()
                )),
            );
        }
    }

    if sprint.blocked_tickets > 0 {
        let severity = if sprint.blocked_tickets >= rules.blocked_escalation {
            Severity::Medium
        } else {
            Severity::Low
        };
        let ids = sprint.blocked_ticket_ids.join(", ");
        problems.push(
            ProblemArea::new(
                ProblemCategory::Delivery,
                severity,
                "Blocked work",
                format!(
                    "{} of {} tickets in {} are blocked ({}).",
                    sprint.blocked_tickets, sprint.total_tickets, sprint.sprint_name, ids
                ),
            )
            .recommend(format!(
                "Escalate the dependencies blocking {} at the next standup",
                ids
            )),
        );
    }

    problems
}

fn test_problems(
    pass_rate: &PassRateSummary,
    flaky: &FlakyTestReport,
    rules: &ProblemRules,
) -> Vec<ProblemArea> {
    let mut problems = Vec::new();

    if !pass_rate.is_empty() && pass_rate.pass_rate < rules.pass_rate_target {
        let severity = if pass_rate.pass_rate < rules.pass_rate_floor {
            Severity::High
        } else {
            Severity::Medium
        };
        let mut problem = ProblemArea::new(
            ProblemCategory::TestQuality,
            severity,
            "Low regression pass rate",
            format!(
                "{} passed {} of {} tests ({}%), below the {}% target.",
                pass_rate.cycle_name,
                pass_rate.passed,
                pass_rate.total_tests,
                pass_rate.pass_rate,
                rules.pass_rate_target
            ),
        );
        if !pass_rate.failed_test_ids.is_empty() {
            problem = problem.recommend(format!(
                "Fix the failing tests {} from {} before the next release",
                pass_rate.failed_test_ids.join(", "),
                pass_rate.cycle_name
            ));
        }
        problems.push(problem.recommend(format!(
            "Add a release gate that requires a {}% pass rate in regression cycles like {}",
            rules.pass_rate_target, pass_rate.cycle_name
        )));
    }

    if !flaky.flaky_tests.is_empty() {
        let severity = if flaky.total_flaky_tests >= rules.flaky_escalation {
            Severity::High
        } else {
            Severity::Medium
        };
        let listed: Vec<String> = flaky
            .flaky_tests
            .iter()
            .map(|t| format!("{} ({}% over {} runs)", t.test_id, t.pass_rate, t.executions))
            .collect();
        let mut problem = ProblemArea::new(
            ProblemCategory::TestQuality,
            severity,
            "Flaky tests",
            format!(
                "{} tests pass inconsistently across {} cycles: {}.",
                flaky.total_flaky_tests,
                flaky.cycles_analyzed,
                listed.join(", ")
            ),
        );
        for test in &flaky.flaky_tests {
            problem = problem.recommend(format!(
                "Quarantine {} ({}) until its {}% pass rate is stabilized",
                test.test_id, test.test_name, test.pass_rate
            ));
        }
        problems.push(problem);
    }

    problems
}

fn reliability_problems(
    incidents: &IncidentSummary,
    mttr: &MttrReport,
    rules: &ProblemRules,
) -> Vec<ProblemArea> {
    let mut problems = Vec::new();

    for severity in [Severity::Critical, Severity::High] {
        for open in incidents.unresolved_with(severity) {
            problems.push(
                ProblemArea::new(
                    ProblemCategory::Reliability,
                    severity,
                    "Unresolved incident",
                    format!(
                        "{} ({}) is still open and affects {} users.",
                        open.id, open.title, open.affected_users
                    ),
                )
                .recommend(format!(
                    "Assign an incident commander to {} and publish resolution updates every 4 hours",
                    open.id
                )),
            );
        }
    }

    if let Some(hours) = mttr.mttr_for(Severity::Critical) {
        if hours > rules.critical_mttr_hours {
            let critical: Vec<&str> = incidents
                .incidents
                .iter()
                .filter(|i| i.severity == Severity::Critical)
                .map(|i| i.id.as_str())
                .collect();
            let mut problem = ProblemArea::new(
                ProblemCategory::Reliability,
                Severity::High,
                "Slow critical recovery",
                format!(
                    "Critical incidents take {} hours to resolve on average, above the {} hour target.",
                    hours, rules.critical_mttr_hours
                ),
            )
            .recommend(format!(
                "Update the runbooks for critical services to bring MTTR from {} hours under {} hours",
                hours, rules.critical_mttr_hours
            ));
            if !critical.is_empty() {
                problem = problem.recommend(format!(
                    "Automate rollback for the services behind {}",
                    critical.join(", ")
                ));
            }
            problems.push(problem);
        }
    }

    if incidents.total_incidents >= rules.incident_volume_threshold {
        let mut causes: Vec<&str> = incidents
            .incidents
            .iter()
            .filter_map(|i| i.root_cause.as_deref())
            .collect();
        causes.sort_unstable();
        causes.dedup();

        let mut problem = ProblemArea::new(
            ProblemCategory::Reliability,
            Severity::Medium,
            "Elevated incident volume",
            format!(
                "{} incidents in the {} affected {} users.",
                incidents.total_incidents,
                incidents.time_period.to_lowercase(),
                incidents.affected_users_total
            ),
        )
        .recommend(format!(
            "Schedule a joint post-incident review for the {} incidents reported in the {}",
            incidents.total_incidents,
            incidents.time_period.to_lowercase()
        ));
        if !causes.is_empty() {
            problem = problem.recommend(format!(
                "Prioritize fixes for the recurring root causes: {}",
                causes.join("; ").to_lowercase()
            ));
        }
        problems.push(problem);
    }

    problems
}
