//! Lookup and tool behavior against on-disk fixtures.

use chrono::{DateTime, Utc};
use insights::fixtures::{FixtureSet, Severity, INCIDENT_FILE, JIRA_FILE, ZEPHYR_FILE};
use insights::lookup::{self, Trend};
use insights::tools::ToolRegistry;
use serde_json::json;
use std::sync::Arc;

const JIRA: &str = r#"[
    {
        "sprint_name": "Sprint 2025-1-1",
        "start_date": "2025-01-06",
        "end_date": "2025-01-17",
        "planned_points": 40,
        "completed_points": 40,
        "tickets": [
            {"id": "CORE-1", "title": "Billing export", "status": "done", "story_points": 8,
             "assigned_to": "sam", "created_at": "2025-01-06T09:00:00Z", "completed_at": "2025-01-10T12:00:00Z"}
        ]
    },
    {
        "sprint_name": "Sprint 2025-1-2",
        "start_date": "2025-01-20",
        "end_date": "2025-01-31",
        "planned_points": 40,
        "completed_points": 30,
        "tickets": [
            {"id": "CORE-2", "title": "Invoice retries", "status": "blocked", "story_points": 5,
             "assigned_to": "lee", "created_at": "2025-01-20T09:00:00Z", "completed_at": null},
            {"id": "CORE-3", "title": "Ledger cleanup", "status": "done", "story_points": 3,
             "assigned_to": "sam", "created_at": "2025-01-20T09:00:00Z", "completed_at": "2025-01-29T15:00:00Z"}
        ]
    }
]"#;

const ZEPHYR: &str = r#"[
    {
        "cycle_name": "Smoke-Jan-Week1",
        "start_date": "2025-01-06",
        "end_date": "2025-01-10",
        "executions": [
            {"test_id": "T-1", "test_name": "Checkout", "status": "passed", "executed_at": "2025-01-07T10:00:00Z", "duration_seconds": 3.5},
            {"test_id": "T-2", "test_name": "Refund", "status": "failed", "executed_at": "2025-01-07T10:01:00Z", "duration_seconds": 4.0}
        ]
    },
    {
        "cycle_name": "Smoke-Jan-Week2",
        "start_date": "2025-01-13",
        "end_date": "2025-01-17",
        "executions": [
            {"test_id": "T-1", "test_name": "Checkout", "status": "passed", "executed_at": "2025-01-14T10:00:00Z", "duration_seconds": 3.4},
            {"test_id": "T-2", "test_name": "Refund", "status": "passed", "executed_at": "2025-01-14T10:01:00Z", "duration_seconds": 4.1}
        ]
    },
    {
        "cycle_name": "Smoke-Jan-Week3",
        "start_date": "2025-01-20",
        "end_date": "2025-01-24",
        "executions": [
            {"test_id": "T-1", "test_name": "Checkout", "status": "passed", "executed_at": "2025-01-21T10:00:00Z", "duration_seconds": 3.6},
            {"test_id": "T-2", "test_name": "Refund", "status": "failed", "executed_at": "2025-01-21T10:01:00Z", "duration_seconds": 4.2}
        ]
    }
]"#;

const INCIDENTS: &str = r#"[
    {"id": "INC-1", "title": "Queue backlog", "severity": "critical",
     "reported_at": "2025-01-01T00:00:00Z", "resolved_at": "2025-01-01T04:00:00Z",
     "affected_users": 300, "root_cause": "Consumer crash"},
    {"id": "INC-2", "title": "Slow search", "severity": "low",
     "reported_at": "2025-01-20T08:00:00Z", "resolved_at": null, "affected_users": 12},
    {"id": "INC-3", "title": "Payment errors", "severity": "critical",
     "reported_at": "2025-01-30T10:00:00Z", "resolved_at": "2025-01-30T18:00:00Z",
     "affected_users": 900}
]"#;

fn write_fixtures() -> (tempfile::TempDir, FixtureSet) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(JIRA_FILE), JIRA).unwrap();
    std::fs::write(dir.path().join(ZEPHYR_FILE), ZEPHYR).unwrap();
    std::fs::write(dir.path().join(INCIDENT_FILE), INCIDENTS).unwrap();
    let fixtures = FixtureSet::load_dir(dir.path()).unwrap();
    (dir, fixtures)
}

fn at(timestamp: &str) -> DateTime<Utc> {
    timestamp.parse().unwrap()
}

#[test]
fn test_unknown_selectors_yield_defaults() {
    let (_dir, fixtures) = write_fixtures();

    let sprint = lookup::sprint_metrics(&fixtures, Some("Sprint 1999-1-1"));
    assert!(sprint.is_empty());
    assert_eq!(sprint.completion_rate, 0.0);

    let cycle = lookup::test_pass_rate(&fixtures, Some("Nightly-Feb-Week9"));
    assert!(cycle.is_empty());
    assert_eq!(cycle.total_tests, 0);
}

#[test]
fn test_sprint_and_velocity() {
    let (_dir, fixtures) = write_fixtures();

    let latest = lookup::sprint_metrics(&fixtures, None);
    assert_eq!(latest.sprint_name, "Sprint 2025-1-2");
    assert_eq!(latest.completion_rate, 75.0);
    assert_eq!(latest.blocked_ticket_ids, vec!["CORE-2".to_string()]);

    let trend = lookup::velocity_trend(&fixtures, 6);
    assert_eq!(trend.sprints.len(), 2);
    assert_eq!(trend.change_percent, -25.0);
    assert_eq!(trend.trend, Trend::Declining);
    assert_eq!(trend.average_completion_rate, 87.5);
    assert_eq!(trend.largest_drop().unwrap().points, 25.0);

    let single = lookup::velocity_trend(&fixtures, 1);
    assert_eq!(single.trend, Trend::InsufficientData);
}

#[test]
fn test_flaky_threshold_and_minimum_runs() {
    let (_dir, fixtures) = write_fixtures();

    let report = lookup::flaky_tests(&fixtures, 0.7, 3);
    assert_eq!(report.cycles_analyzed, 3);
    assert_eq!(report.total_flaky_tests, 1);
    assert_eq!(report.flaky_tests[0].test_id, "T-2");
    assert_eq!(report.flaky_tests[0].pass_rate, 33.33);

    // T-1 always passes, so it is never flaky.
    assert_eq!(lookup::flaky_tests(&fixtures, 1.0, 3).total_flaky_tests, 1);
    assert_eq!(lookup::flaky_tests(&fixtures, 0.7, 4).total_flaky_tests, 0);
}

#[test]
fn test_incident_window_edges() {
    let (_dir, fixtures) = write_fixtures();
    let as_of = at("2025-01-31T00:00:00Z");

    let summary = lookup::incident_summary(&fixtures, None, 30, as_of);
    // INC-1 was reported exactly 30 days before as_of.
    assert_eq!(summary.total_incidents, 3);
    assert_eq!(summary.unresolved, 1);
    assert_eq!(summary.affected_users_total, 1212);

    let shorter = lookup::incident_summary(&fixtures, None, 29, as_of);
    assert_eq!(shorter.total_incidents, 2);

    let critical = lookup::incident_summary(&fixtures, Some(Severity::Critical), 30, as_of);
    assert_eq!(critical.total_incidents, 2);
    assert_eq!(critical.count(Severity::Critical), 2);
    assert_eq!(critical.count(Severity::Low), 0);

    let earlier = lookup::incident_summary(&fixtures, None, 30, at("2025-01-25T00:00:00Z"));
    assert_eq!(earlier.total_incidents, 2);
}

#[test]
fn test_mttr_ignores_open_incidents() {
    let (_dir, fixtures) = write_fixtures();
    let mttr = lookup::mttr_by_severity(&fixtures);
    assert_eq!(mttr.mttr_for(Severity::Critical), Some(6.0));
    assert_eq!(mttr.mttr_for(Severity::Low), None);
    assert_eq!(mttr.total_resolved, 2);
    assert_eq!(mttr.overall_mttr_hours, 6.0);
}

#[tokio::test]
async fn test_tools_match_direct_lookups() {
    let (_dir, fixtures) = write_fixtures();
    let fixtures = Arc::new(fixtures);
    let as_of = at("2025-01-31T00:00:00Z");
    let registry = ToolRegistry::with_lookup_tools(fixtures.clone(), as_of);

    let from_tool = registry
        .execute("get_incident_summary", json!({"severity": "critical", "days": 30}))
        .await
        .unwrap();
    let direct = lookup::incident_summary(&fixtures, Some(Severity::Critical), 30, as_of);
    assert_eq!(from_tool, serde_json::to_value(&direct).unwrap());

    let velocity = registry
        .execute("get_velocity_trend", json!({"num_sprints": 2}))
        .await
        .unwrap();
    assert_eq!(velocity["trend"], "declining");
    assert_eq!(velocity["lowest_sprint"]["sprint_name"], "Sprint 2025-1-2");
}
