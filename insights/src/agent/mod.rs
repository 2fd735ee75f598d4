//! Agents of the report workflow.
//!
//! The coordinator fans a query out to three specialists, composes their
//! findings into a report and loops on validator feedback:
//! 1. Specialists gather typed evidence from their two lookups
//! 2. A [`Narrator`] turns each persona's evidence into prose
//! 3. The coordinator composes the report and the validator scores it
//! 4. Failing drafts are revised until they pass or the revision budget runs out
//!
//! Personas are immutable records held in a [`PersonaCatalog`] and passed
//! explicitly to every narrator call.

pub mod coordinator;
pub mod narrator;
pub mod prompts;
pub mod specialist;

pub use coordinator::{Attempt, Coordinator, CoordinatorRun};
pub use narrator::{ComposeRequest, ModelNarrator, Narrator, Revision, TemplateNarrator};
pub use specialist::{Finding, Specialist};

use crate::tools::ToolError;
use crate::validator::ValidatorError;
use model::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while running agents
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Validator error: {0}")]
    Validator(#[from] ValidatorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No persona registered for role {0}")]
    MissingPersona(Role),

    #[error("{0} is not a specialist role")]
    NotASpecialist(Role),

    #[error("Narrator unavailable: {message}")]
    Unavailable { message: String },

    #[error("Model kept requesting tools after {rounds} rounds")]
    ToolRoundsExceeded { rounds: usize },

    #[error("{role} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        role: Role,
        attempts: u32,
        #[source]
        source: Box<AgentError>,
    },
}

impl AgentError {
    /// Whether the failed call is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Model(e) => e.is_transient(),
            AgentError::Unavailable { .. } => true,
            _ => false,
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    #[serde(rename = "jira_analyst")]
    DeliveryAnalyst,
    #[serde(rename = "zephyr_analyst")]
    TestQualityAnalyst,
    #[serde(rename = "incident_analyst")]
    ReliabilityAnalyst,
    Validator,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Coordinator,
        Role::DeliveryAnalyst,
        Role::TestQualityAnalyst,
        Role::ReliabilityAnalyst,
        Role::Validator,
    ];

    pub const SPECIALISTS: [Role; 3] = [
        Role::DeliveryAnalyst,
        Role::TestQualityAnalyst,
        Role::ReliabilityAnalyst,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Role::Coordinator => "coordinator",
            Role::DeliveryAnalyst => "jira_analyst",
            Role::TestQualityAnalyst => "zephyr_analyst",
            Role::ReliabilityAnalyst => "incident_analyst",
            Role::Validator => "validator",
        }
    }

    pub fn is_specialist(&self) -> bool {
        Role::SPECIALISTS.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Who an agent is and which tools it may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub role: Role,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    /// Tool names offered to the model on this persona's behalf
    pub tools: Vec<String>,
}

impl Persona {
    pub fn new(
        role: Role,
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            role,
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

/// Personas keyed by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaCatalog {
    personas: BTreeMap<Role, Persona>,
}

impl PersonaCatalog {
    pub fn empty() -> Self {
        Self {
            personas: BTreeMap::new(),
        }
    }

    /// The five built-in personas.
    pub fn standard() -> Self {
        Self::empty()
            .with_persona(
                Persona::new(
                    Role::Coordinator,
                    "Quality Insights Coordinator",
                    "Delegates to the specialists and writes the executive report",
                    prompts::COORDINATOR_PROMPT,
                ),
            )
            .with_persona(
                Persona::new(
                    Role::DeliveryAnalyst,
                    "Jira Analysis Specialist",
                    "Sprint completion, velocity trends and blocked work",
                    prompts::DELIVERY_ANALYST_PROMPT,
                )
                .with_tools(&["get_sprint_metrics", "get_velocity_trend"]),
            )
            .with_persona(
                Persona::new(
                    Role::TestQualityAnalyst,
                    "Test Quality Specialist",
                    "Regression pass rates and flaky tests",
                    prompts::TEST_QUALITY_ANALYST_PROMPT,
                )
                .with_tools(&["get_test_pass_rate", "get_flaky_tests"]),
            )
            .with_persona(
                Persona::new(
                    Role::ReliabilityAnalyst,
                    "Incident Management Specialist",
                    "Incident volume, open incidents and MTTR by severity",
                    prompts::RELIABILITY_ANALYST_PROMPT,
                )
                .with_tools(&["get_incident_summary", "get_mttr_by_severity"]),
            )
            .with_persona(Persona::new(
                Role::Validator,
                "Quality Assurance Validator",
                "Scores the report for structure, citations, actions and severity tags",
                prompts::VALIDATOR_PROMPT,
            ))
    }

    /// Add or replace the persona for its role.
    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.personas.insert(persona.role, persona);
        self
    }

    pub fn get(&self, role: Role) -> AgentResult<&Persona> {
        self.personas.get(&role).ok_or(AgentError::MissingPersona(role))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.values()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
