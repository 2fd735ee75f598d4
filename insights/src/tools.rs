use crate::fixtures::{FixtureSet, Severity};
use crate::lookup;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::types::{JsonSchema, PropertySchema, ToolDefinition};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ToolResult<T> = Result<T, ToolError>;

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, args: Value) -> ToolResult<Value>;
    fn name(&self) -> &str;
}

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry holding the six fixture lookups.
    pub fn with_lookup_tools(fixtures: Arc<FixtureSet>, as_of: DateTime<Utc>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SprintMetricsTool::new(fixtures.clone())));
        registry.register(Box::new(VelocityTrendTool::new(fixtures.clone())));
        registry.register(Box::new(TestPassRateTool::new(fixtures.clone())));
        registry.register(Box::new(FlakyTestsTool::new(fixtures.clone())));
        registry.register(Box::new(IncidentSummaryTool::new(fixtures.clone(), as_of)));
        registry.register(Box::new(MttrBySeverityTool::new(fixtures)));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Tool names in alphabetical order.
    pub fn list_tools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Definitions for a subset of tools, in the order requested; unknown names are skipped.
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        self.list_tools()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub async fn execute(&self, name: &str, args: Value) -> ToolResult<Value> {
        match self.tools.get(name) {
            Some(tool) => {
                debug!("Executing tool {} with {}", name, args);
                tool.execute(args).await
            }
            None => Err(ToolError::NotFound {
                name: name.to_string(),
            }),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn arguments(args: &Value) -> ToolResult<Option<&serde_json::Map<String, Value>>> {
    match args {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(ToolError::InvalidArguments {
            message: format!("expected an object of arguments, got {}", other),
        }),
    }
}

/// Argument lookup where a missing key and an explicit `null` both mean "not given".
fn argument<'a>(args: &'a Value, key: &str) -> ToolResult<Option<&'a Value>> {
    Ok(arguments(args)?.and_then(|map| map.get(key)).filter(|v| !v.is_null()))
}

fn optional_str<'a>(args: &'a Value, key: &str) -> ToolResult<Option<&'a str>> {
    argument(args, key)?
        .map(|v| {
            v.as_str().ok_or_else(|| ToolError::InvalidArguments {
                message: format!("'{}' must be a string", key),
            })
        })
        .transpose()
}

fn optional_count(args: &Value, key: &str) -> ToolResult<Option<u64>> {
    argument(args, key)?
        .map(|v| {
            v.as_u64().ok_or_else(|| ToolError::InvalidArguments {
                message: format!("'{}' must be a non-negative integer", key),
            })
        })
        .transpose()
}

fn optional_ratio(args: &Value, key: &str) -> ToolResult<Option<f64>> {
    argument(args, key)?
        .map(|v| {
            v.as_f64()
                .filter(|r| (0.0..=1.0).contains(r))
                .ok_or_else(|| ToolError::InvalidArguments {
                    message: format!("'{}' must be a number between 0 and 1", key),
                })
        })
        .transpose()
}

fn to_value(summary: &impl Serialize) -> ToolResult<Value> {
    Ok(serde_json::to_value(summary)?)
}

pub struct SprintMetricsTool {
    fixtures: Arc<FixtureSet>,
}

impl SprintMetricsTool {
    pub fn new(fixtures: Arc<FixtureSet>) -> Self {
        Self { fixtures }
    }
}

#[async_trait]
impl Tool for SprintMetricsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_sprint_metrics",
            "Completion rate and ticket status counts for a sprint. Defaults to the most recent sprint.",
            JsonSchema::object([(
                "sprint_name",
                PropertySchema::string("Sprint to inspect, e.g. 'Sprint 2024-12-2'"),
            )]),
        )
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        let name = optional_str(&args, "sprint_name")?;
        to_value(&lookup::sprint_metrics(&self.fixtures, name))
    }

    fn name(&self) -> &str {
        "get_sprint_metrics"
    }
}

pub struct VelocityTrendTool {
    fixtures: Arc<FixtureSet>,
}

impl VelocityTrendTool {
    pub fn new(fixtures: Arc<FixtureSet>) -> Self {
        Self { fixtures }
    }
}

#[async_trait]
impl Tool for VelocityTrendTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_velocity_trend",
            "Completion-rate trend over recent sprints with the lowest and highest sprint.",
            JsonSchema::object([(
                "num_sprints",
                PropertySchema::integer("How many recent sprints to analyze (default 6)"),
            )]),
        )
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        let n = optional_count(&args, "num_sprints")?.unwrap_or(6);
        to_value(&lookup::velocity_trend(&self.fixtures, n as usize))
    }

    fn name(&self) -> &str {
        "get_velocity_trend"
    }
}

pub struct TestPassRateTool {
    fixtures: Arc<FixtureSet>,
}

impl TestPassRateTool {
    pub fn new(fixtures: Arc<FixtureSet>) -> Self {
        Self { fixtures }
    }
}

#[async_trait]
impl Tool for TestPassRateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_test_pass_rate",
            "Pass rate and status counts for a test cycle. Defaults to the most recent cycle.",
            JsonSchema::object([(
                "cycle_name",
                PropertySchema::string("Test cycle to inspect, e.g. 'Regression-Dec-Week2'"),
            )]),
        )
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        let name = optional_str(&args, "cycle_name")?;
        to_value(&lookup::test_pass_rate(&self.fixtures, name))
    }

    fn name(&self) -> &str {
        "get_test_pass_rate"
    }
}

pub struct FlakyTestsTool {
    fixtures: Arc<FixtureSet>,
}

impl FlakyTestsTool {
    pub fn new(fixtures: Arc<FixtureSet>) -> Self {
        Self { fixtures }
    }
}

#[async_trait]
impl Tool for FlakyTestsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_flaky_tests",
            "Tests that pass inconsistently across all test cycles, lowest pass rate first.",
            JsonSchema::object([
                (
                    "threshold",
                    PropertySchema::number("Pass ratio below which a test is flaky (default 0.7)"),
                ),
                (
                    "min_executions",
                    PropertySchema::integer("Minimum runs before a test is considered (default 3)"),
                ),
            ]),
        )
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        let threshold = optional_ratio(&args, "threshold")?.unwrap_or(0.7);
        let min_executions = optional_count(&args, "min_executions")?.unwrap_or(3);
        to_value(&lookup::flaky_tests(
            &self.fixtures,
            threshold,
            min_executions as usize,
        ))
    }

    fn name(&self) -> &str {
        "get_flaky_tests"
    }
}

pub struct IncidentSummaryTool {
    fixtures: Arc<FixtureSet>,
    as_of: DateTime<Utc>,
}

impl IncidentSummaryTool {
    pub fn new(fixtures: Arc<FixtureSet>, as_of: DateTime<Utc>) -> Self {
        Self { fixtures, as_of }
    }
}

#[async_trait]
impl Tool for IncidentSummaryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_incident_summary",
            "Incident counts, resolution status and affected users over a look-back window.",
            JsonSchema::object([
                (
                    "severity",
                    PropertySchema::string("Only count this severity: critical, high, medium or low"),
                ),
                (
                    "days",
                    PropertySchema::integer("Days to look back (default 30)"),
                ),
            ]),
        )
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        let days = optional_count(&args, "days")?.unwrap_or(30);
        let days = u32::try_from(days).map_err(|_| ToolError::InvalidArguments {
            message: format!("'days' is too large: {}", days),
        })?;

        let summary = match optional_str(&args, "severity")? {
            None => lookup::incident_summary(&self.fixtures, None, days, self.as_of),
            Some(label) => match Severity::parse(label) {
                Some(severity) => {
                    lookup::incident_summary(&self.fixtures, Some(severity), days, self.as_of)
                }
                None => lookup::IncidentSummary::default(),
            },
        };
        to_value(&summary)
    }

    fn name(&self) -> &str {
        "get_incident_summary"
    }
}

pub struct MttrBySeverityTool {
    fixtures: Arc<FixtureSet>,
}

impl MttrBySeverityTool {
    pub fn new(fixtures: Arc<FixtureSet>) -> Self {
        Self { fixtures }
    }
}

#[async_trait]
impl Tool for MttrBySeverityTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_mttr_by_severity",
            "Mean hours to resolve incidents, per severity, over resolved incidents only.",
            JsonSchema::empty_object(),
        )
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        arguments(&args)?;
        to_value(&lookup::mttr_by_severity(&self.fixtures))
    }

    fn name(&self) -> &str {
        "get_mttr_by_severity"
    }
}
