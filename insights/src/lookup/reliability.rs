use crate::fixtures::{round2, FixtureSet, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentBrief {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub reported_at: DateTime<Utc>,
    pub resolved: bool,
    pub affected_users: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub time_period: String,
    pub as_of: Option<DateTime<Utc>>,
    pub severity_filter: Option<Severity>,
    pub total_incidents: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub resolved: usize,
    pub unresolved: usize,
    pub affected_users_total: u64,
    pub incidents: Vec<IncidentBrief>,
}

impl IncidentSummary {
    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn unresolved_with(&self, severity: Severity) -> impl Iterator<Item = &IncidentBrief> {
        self.incidents
            .iter()
            .filter(move |i| !i.resolved && i.severity == severity)
    }
}

/// Incidents reported within `days` before `as_of`, optionally limited to one severity.
pub fn incident_summary(
    fixtures: &FixtureSet,
    severity: Option<Severity>,
    days: u32,
    as_of: DateTime<Utc>,
) -> IncidentSummary {
    let cutoff = as_of
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let incidents: Vec<IncidentBrief> = fixtures
        .incidents()
        .iter()
        .filter(|i| i.reported_at >= cutoff && i.reported_at <= as_of)
        .filter(|i| severity.map_or(true, |s| i.severity == s))
        .map(|i| IncidentBrief {
            id: i.id.clone(),
            title: i.title.clone(),
            severity: i.severity,
            reported_at: i.reported_at,
            resolved: i.is_resolved(),
            affected_users: i.affected_users,
            root_cause: i.root_cause.clone(),
        })
        .collect();

    let mut by_severity = BTreeMap::new();
    for incident in &incidents {
        *by_severity.entry(incident.severity).or_insert(0) += 1;
    }
    let resolved = incidents.iter().filter(|i| i.resolved).count();

    IncidentSummary {
        time_period: format!("Last {} days", days),
        as_of: Some(as_of),
        severity_filter: severity,
        total_incidents: incidents.len(),
        by_severity,
        resolved,
        unresolved: incidents.len() - resolved,
        affected_users_total: incidents.iter().map(|i| i.affected_users).sum(),
        incidents,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MttrReport {
    /// Mean hours to resolve, per severity.
    pub mttr_hours: BTreeMap<Severity, f64>,
    pub overall_mttr_hours: f64,
    pub resolved_by_severity: BTreeMap<Severity, usize>,
    pub total_resolved: usize,
}

impl MttrReport {
    pub fn mttr_for(&self, severity: Severity) -> Option<f64> {
        self.mttr_hours.get(&severity).copied()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean time to resolve over resolved incidents only.
pub fn mttr_by_severity(fixtures: &FixtureSet) -> MttrReport {
    let mut hours: BTreeMap<Severity, Vec<f64>> = BTreeMap::new();
    for incident in fixtures.incidents() {
        if let Some(h) = incident.time_to_resolve_hours() {
            hours.entry(incident.severity).or_default().push(h);
        }
    }

    let all: Vec<f64> = hours.values().flatten().copied().collect();

    MttrReport {
        mttr_hours: hours
            .iter()
            .map(|(severity, times)| (*severity, round2(mean(times))))
            .collect(),
        overall_mttr_hours: if all.is_empty() { 0.0 } else { round2(mean(&all)) },
        resolved_by_severity: hours.iter().map(|(s, times)| (*s, times.len())).collect(),
        total_resolved: all.len(),
    }
}
