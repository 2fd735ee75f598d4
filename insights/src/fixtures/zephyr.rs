//! Test cycles and executions from the Zephyr export.

use super::percentage;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Blocked,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestExecution {
    pub test_id: String,
    pub test_name: String,
    pub status: TestStatus,
    pub executed_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl TestExecution {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCycle {
    pub cycle_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub executions: Vec<TestExecution>,
}

impl TestCycle {
    pub fn count_status(&self, status: TestStatus) -> usize {
        self.executions.iter().filter(|e| e.status == status).count()
    }

    /// Passed executions over all executions, as a percentage.
    pub fn pass_rate(&self) -> f64 {
        percentage(
            self.count_status(TestStatus::Passed) as f64,
            self.executions.len() as f64,
        )
    }

    pub fn failed_tests(&self) -> impl Iterator<Item = &TestExecution> {
        self.executions
            .iter()
            .filter(|e| e.status == TestStatus::Failed)
    }

    pub fn date_range(&self) -> String {
        format!("{} to {}", self.start_date, self.end_date)
    }
}
