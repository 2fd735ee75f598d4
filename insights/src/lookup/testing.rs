use crate::fixtures::{percentage, FixtureSet, TestCycle, TestStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassRateSummary {
    pub cycle_name: String,
    pub date_range: String,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub skipped: usize,
    pub pass_rate: f64,
    pub failed_test_ids: Vec<String>,
}

impl PassRateSummary {
    pub fn is_empty(&self) -> bool {
        self.cycle_name.is_empty()
    }

    fn from_cycle(cycle: &TestCycle) -> Self {
        Self {
            cycle_name: cycle.cycle_name.clone(),
            date_range: cycle.date_range(),
            total_tests: cycle.executions.len(),
            passed: cycle.count_status(TestStatus::Passed),
            failed: cycle.count_status(TestStatus::Failed),
            blocked: cycle.count_status(TestStatus::Blocked),
            skipped: cycle.count_status(TestStatus::Skipped),
            pass_rate: cycle.pass_rate(),
            failed_test_ids: cycle.failed_tests().map(|e| e.test_id.clone()).collect(),
        }
    }
}

/// Pass rate of the named test cycle, or the most recent one.
pub fn test_pass_rate(fixtures: &FixtureSet, cycle_name: Option<&str>) -> PassRateSummary {
    let cycle = match cycle_name {
        Some(name) => fixtures.test_cycle(name),
        None => fixtures.latest_cycle(),
    };
    cycle.map(PassRateSummary::from_cycle).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakyTest {
    pub test_id: String,
    pub test_name: String,
    pub executions: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlakyTestReport {
    pub flaky_tests: Vec<FlakyTest>,
    pub total_flaky_tests: usize,
    pub threshold: f64,
    pub min_executions: usize,
    pub cycles_analyzed: usize,
}

#[derive(Default)]
struct Tally<'a> {
    test_name: &'a str,
    passed: usize,
    total: usize,
}

/// Tests whose pass ratio across every cycle sits strictly between zero and `threshold`.
///
/// `threshold` is a ratio in `0.0..=1.0`; the reported pass rates are percentages.
/// Tests with fewer than `min_executions` runs are ignored.
pub fn flaky_tests(fixtures: &FixtureSet, threshold: f64, min_executions: usize) -> FlakyTestReport {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    for execution in fixtures.test_cycles().iter().flat_map(|c| c.executions.iter()) {
        let tally = tallies.entry(execution.test_id.as_str()).or_default();
        tally.test_name = &execution.test_name;
        tally.total += 1;
        if execution.passed() {
            tally.passed += 1;
        }
    }

    let mut flaky: Vec<FlakyTest> = tallies
        .into_iter()
        .filter(|(_, t)| t.total >= min_executions && t.total > 0)
        .filter(|(_, t)| {
            let ratio = t.passed as f64 / t.total as f64;
            ratio > 0.0 && ratio < threshold
        })
        .map(|(id, t)| FlakyTest {
            test_id: id.to_string(),
            test_name: t.test_name.to_string(),
            executions: t.total,
            passed: t.passed,
            failed: t.total - t.passed,
            pass_rate: percentage(t.passed as f64, t.total as f64),
        })
        .collect();

    // BTreeMap iteration already orders by id, so a stable sort keeps ties by id.
    flaky.sort_by(|a, b| a.pass_rate.total_cmp(&b.pass_rate));

    FlakyTestReport {
        total_flaky_tests: flaky.len(),
        flaky_tests: flaky,
        threshold,
        min_executions,
        cycles_analyzed: fixtures.test_cycles().len(),
    }
}
