//! Quality insights: specialist lookups over sprint, test-cycle and incident
//! fixtures, a coordinator that composes them into an executive report, and a
//! deterministic validator that scores the report.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod fixtures;
pub mod lookup;
pub mod report;
pub mod tools;
pub mod validator;

pub use agent::{
    AgentError, AgentResult, Coordinator, CoordinatorRun, ModelNarrator, Narrator, Persona,
    PersonaCatalog, Role, TemplateNarrator,
};
pub use analysis::{detect_problems, Evidence, ProblemArea, ProblemCategory, ProblemRules};
pub use config::{ConfigError, ConfigResult, InsightsConfig};
pub use fixtures::{FixtureError, FixtureResult, FixtureSet, Severity};
pub use report::QualityReport;
pub use tools::{Tool, ToolError, ToolRegistry, ToolResult};
pub use validator::{Grade, ReportValidator, ValidationOutcome, ValidatorConfig, ValidatorError};
