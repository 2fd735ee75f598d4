//! Pure lookups over the fixture snapshot.
//!
//! Every function takes the snapshot and a selector and returns a typed
//! summary. An unknown selector yields the summary's `Default`, never an error.

pub mod reliability;
pub mod sprint;
pub mod testing;

pub use reliability::{incident_summary, mttr_by_severity, IncidentBrief, IncidentSummary, MttrReport};
pub use sprint::{
    sprint_metrics, velocity_trend, SprintSummary, SprintVelocity, Trend, VelocityDrop,
    VelocityTrend,
};
pub use testing::{flaky_tests, test_pass_rate, FlakyTest, FlakyTestReport, PassRateSummary};

#[cfg(test)]
pub(crate) fn sample_fixtures() -> crate::fixtures::FixtureSet {
    crate::fixtures::FixtureSet::load_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/data")).unwrap()
}
