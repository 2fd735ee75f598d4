//! Read-only fixture snapshot the specialists query.
//!
//! Three JSON files, each a top-level array, are loaded once and validated
//! at the boundary. After loading the set is immutable and cheap to share
//! behind an `Arc` across concurrent specialists.

pub mod incident;
pub mod jira;
pub mod zephyr;

pub use incident::{Incident, Severity};
pub use jira::{Sprint, Ticket, TicketStatus};
pub use zephyr::{TestCycle, TestExecution, TestStatus};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const JIRA_FILE: &str = "jira_data.json";
pub const ZEPHYR_FILE: &str = "zephyr_data.json";
pub const INCIDENT_FILE: &str = "incident_data.json";

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed fixture {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate {kind} '{id}'")]
    Duplicate { kind: &'static str, id: String },

    #[error("Invalid record '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },
}

pub type FixtureResult<T> = Result<T, FixtureError>;

/// `part / whole` as a percentage rounded to two decimals; zero when `whole` is zero.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    round2(part / whole * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FixtureSet {
    sprints: Vec<Sprint>,
    test_cycles: Vec<TestCycle>,
    incidents: Vec<Incident>,
}

impl FixtureSet {
    pub fn new(
        sprints: Vec<Sprint>,
        test_cycles: Vec<TestCycle>,
        incidents: Vec<Incident>,
    ) -> FixtureResult<Self> {
        let set = Self {
            sprints,
            test_cycles,
            incidents,
        };
        set.validate()?;
        Ok(set)
    }

    /// Load `jira_data.json`, `zephyr_data.json` and `incident_data.json` from `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> FixtureResult<Self> {
        let dir = dir.as_ref();
        let read = |file: &str| {
            let path = dir.join(file);
            debug!("Reading fixture {}", path.display());
            std::fs::read_to_string(&path).map_err(|source| FixtureError::Io { path, source })
        };

        let set = Self::from_json(&read(JIRA_FILE)?, &read(ZEPHYR_FILE)?, &read(INCIDENT_FILE)?)?;
        info!(
            "Loaded {} sprints, {} test cycles, {} incidents from {}",
            set.sprints.len(),
            set.test_cycles.len(),
            set.incidents.len(),
            dir.display()
        );
        Ok(set)
    }

    pub fn from_json(jira: &str, zephyr: &str, incidents: &str) -> FixtureResult<Self> {
        let sprints = parse(JIRA_FILE, jira)?;
        let test_cycles = parse(ZEPHYR_FILE, zephyr)?;
        let incidents = parse(INCIDENT_FILE, incidents)?;
        Self::new(sprints, test_cycles, incidents)
    }

    pub fn sprints(&self) -> &[Sprint] {
        &self.sprints
    }

    pub fn test_cycles(&self) -> &[TestCycle] {
        &self.test_cycles
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn sprint(&self, name: &str) -> Option<&Sprint> {
        self.sprints.iter().find(|s| s.sprint_name == name)
    }

    /// Most recent sprint by end date.
    pub fn latest_sprint(&self) -> Option<&Sprint> {
        self.sprints.iter().max_by_key(|s| s.end_date)
    }

    pub fn test_cycle(&self, name: &str) -> Option<&TestCycle> {
        self.test_cycles.iter().find(|c| c.cycle_name == name)
    }

    pub fn latest_cycle(&self) -> Option<&TestCycle> {
        self.test_cycles.iter().max_by_key(|c| c.end_date)
    }

    pub fn incident(&self, id: &str) -> Option<&Incident> {
        self.incidents.iter().find(|i| i.id == id)
    }

    /// Sprints ordered oldest first.
    pub fn sprints_chronological(&self) -> Vec<&Sprint> {
        let mut sprints: Vec<&Sprint> = self.sprints.iter().collect();
        sprints.sort_by_key(|s| s.start_date);
        sprints
    }

    /// Newest timestamp recorded anywhere in the snapshot.
    ///
    /// Used as the default reference time for look-back windows so the same
    /// fixtures always produce the same numbers.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        let tickets = self
            .sprints
            .iter()
            .flat_map(|s| s.tickets.iter())
            .flat_map(|t| std::iter::once(t.created_at).chain(t.completed_at));
        let executions = self
            .test_cycles
            .iter()
            .flat_map(|c| c.executions.iter())
            .map(|e| e.executed_at);
        let incidents = self
            .incidents
            .iter()
            .flat_map(|i| std::iter::once(i.reported_at).chain(i.resolved_at));

        tickets.chain(executions).chain(incidents).max()
    }

    pub fn is_empty(&self) -> bool {
        self.sprints.is_empty() && self.test_cycles.is_empty() && self.incidents.is_empty()
    }

    fn validate(&self) -> FixtureResult<()> {
        unique("sprint", self.sprints.iter().map(|s| s.sprint_name.as_str()))?;
        unique("test cycle", self.test_cycles.iter().map(|c| c.cycle_name.as_str()))?;
        unique("incident", self.incidents.iter().map(|i| i.id.as_str()))?;
        unique(
            "ticket",
            self.sprints
                .iter()
                .flat_map(|s| s.tickets.iter())
                .map(|t| t.id.as_str()),
        )?;

        for sprint in &self.sprints {
            if sprint.start_date > sprint.end_date {
                return Err(invalid(&sprint.sprint_name, "start_date is after end_date"));
            }
        }

        for cycle in &self.test_cycles {
            if cycle.start_date > cycle.end_date {
                return Err(invalid(&cycle.cycle_name, "start_date is after end_date"));
            }
            if let Some(exec) = cycle
                .executions
                .iter()
                .find(|e| !e.duration_seconds.is_finite() || e.duration_seconds < 0.0)
            {
                return Err(invalid(
                    &exec.test_id,
                    &format!("negative or non-finite duration in {}", cycle.cycle_name),
                ));
            }
        }

        for incident in &self.incidents {
            if let Some(resolved) = incident.resolved_at {
                if resolved < incident.reported_at {
                    return Err(invalid(&incident.id, "resolved_at is before reported_at"));
                }
            }
        }

        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(file: &str, raw: &str) -> FixtureResult<Vec<T>> {
    serde_json::from_str(raw).map_err(|source| FixtureError::Parse {
        file: file.to_string(),
        source,
    })
}

fn unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> FixtureResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(FixtureError::Duplicate {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn invalid(id: &str, reason: &str) -> FixtureError {
    FixtureError::InvalidRecord {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}
