use super::narrator::{ComposeRequest, Narrator, Revision};
use super::specialist::{Finding, Specialist};
use super::{AgentError, AgentResult, Persona, PersonaCatalog, Role};
use crate::config::{AnalysisSettings, CoordinatorSettings, InsightsConfig};
use crate::fixtures::FixtureSet;
use crate::validator::{Grade, ReportValidator, ValidationOutcome};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One validated draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 0 for the first draft
    pub revision: u32,
    pub score: u32,
    pub grade: Grade,
    pub passed: bool,
    pub messages: Vec<String>,
}

impl Attempt {
    fn new(revision: u32, outcome: &ValidationOutcome) -> Self {
        Self {
            revision,
            score: outcome.score,
            grade: outcome.grade,
            passed: outcome.passed,
            messages: outcome.messages.clone(),
        }
    }
}

/// Result of a coordinator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorRun {
    pub run_id: Uuid,
    pub query: String,
    /// The final draft, passing or not
    pub report: String,
    pub outcome: ValidationOutcome,
    /// Drafts validated, including the first
    pub attempts: u32,
    pub history: Vec<Attempt>,
    pub findings: Vec<Finding>,
}

impl CoordinatorRun {
    pub fn passed(&self) -> bool {
        self.outcome.passed
    }

    pub fn revisions(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Runs the specialists, composes the report and revises it until it passes.
pub struct Coordinator {
    fixtures: Arc<FixtureSet>,
    catalog: PersonaCatalog,
    delivery: Specialist,
    test_quality: Specialist,
    reliability: Specialist,
    narrator: Box<dyn Narrator>,
    validator: ReportValidator,
    analysis: AnalysisSettings,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(
        fixtures: Arc<FixtureSet>,
        config: &InsightsConfig,
        narrator: Box<dyn Narrator>,
    ) -> AgentResult<Self> {
        let catalog = PersonaCatalog::standard();
        Ok(Self {
            delivery: Specialist::from_catalog(&catalog, Role::DeliveryAnalyst)?,
            test_quality: Specialist::from_catalog(&catalog, Role::TestQualityAnalyst)?,
            reliability: Specialist::from_catalog(&catalog, Role::ReliabilityAnalyst)?,
            catalog,
            fixtures,
            narrator,
            validator: ReportValidator::new(config.validator.clone())?,
            analysis: config.analysis.clone(),
            settings: config.coordinator.clone(),
        })
    }

    /// Swap in different personas; every role must be present.
    pub fn with_catalog(mut self, catalog: PersonaCatalog) -> AgentResult<Self> {
        for role in Role::ALL {
            catalog.get(role)?;
        }
        self.delivery = Specialist::from_catalog(&catalog, Role::DeliveryAnalyst)?;
        self.test_quality = Specialist::from_catalog(&catalog, Role::TestQualityAnalyst)?;
        self.reliability = Specialist::from_catalog(&catalog, Role::ReliabilityAnalyst)?;
        self.catalog = catalog;
        Ok(self)
    }

    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    pub fn validator(&self) -> &ReportValidator {
        &self.validator
    }

    pub async fn run(&self, query: &str) -> AgentResult<CoordinatorRun> {
        let run_id = Uuid::new_v4();
        info!(
            "Run {} started with {} narrator: {}",
            run_id,
            self.narrator.name(),
            query
        );

        let (delivery, test_quality, reliability) = tokio::join!(
            self.investigate(&self.delivery, query),
            self.investigate(&self.test_quality, query),
            self.investigate(&self.reliability, query),
        );
        let findings = vec![delivery?, test_quality?, reliability?];

        let persona = self.catalog.get(Role::Coordinator)?;
        let reviewer = self.catalog.get(Role::Validator)?;
        let first = ComposeRequest {
            team_name: &self.settings.team_name,
            query,
            findings: &findings,
            generated_at: Utc::now(),
            revision: None,
        };

        let mut history = Vec::new();
        let mut revision = 0;
        let mut draft = self.compose(persona, &first).await?;

        let outcome = loop {
            let outcome = self.validator.validate(&draft, Some(&self.fixtures));
            info!(
                "Run {} draft {} reviewed by {}: {}",
                run_id, revision, reviewer.name, outcome
            );
            history.push(Attempt::new(revision, &outcome));

            if outcome.passed || revision >= self.settings.max_revisions {
                break outcome;
            }

            revision += 1;
            debug!("Revising with feedback:\n{}", outcome.feedback());
            let request = ComposeRequest {
                revision: Some(Revision {
                    number: revision,
                    previous_draft: &draft,
                    outcome: &outcome,
                }),
                ..first.clone()
            };
            let revised = self.compose(persona, &request).await?;
            draft = revised;
        };

        if !outcome.passed {
            warn!(
                "Run {} ended without a passing report after {} revision(s)",
                run_id, revision
            );
        }

        Ok(CoordinatorRun {
            run_id,
            query: query.to_string(),
            report: draft,
            outcome,
            attempts: history.len() as u32,
            history,
            findings,
        })
    }

    async fn investigate(&self, specialist: &Specialist, query: &str) -> AgentResult<Finding> {
        let evidence = specialist.gather(&self.fixtures, &self.analysis);
        let problems = specialist.problems(&evidence, &self.analysis.rules);
        let persona = specialist.persona();
        let evidence_ref = &evidence;

        let prose = self
            .with_retry(specialist.role(), move || {
                self.narrator.describe(persona, query, evidence_ref)
            })
            .await?;

        debug!(
            "{} found {} problem(s)",
            specialist.role(),
            problems.len()
        );
        Ok(Finding {
            role: specialist.role(),
            evidence,
            prose,
            problems,
        })
    }

    async fn compose(&self, persona: &Persona, request: &ComposeRequest<'_>) -> AgentResult<String> {
        self.with_retry(Role::Coordinator, move || {
            self.narrator.compose(persona, request)
        })
        .await
    }

    /// Retry transient failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, role: Role, mut call: F) -> AgentResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AgentResult<T>>,
    {
        let policy = &self.settings.retry;
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "{} call failed ({}), retrying in {:?} ({}/{})",
                        role,
                        e,
                        delay,
                        attempt + 1,
                        policy.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if attempt == 0 => return Err(e),
                Err(e) => {
                    return Err(AgentError::RetriesExhausted {
                        role,
                        attempts: attempt + 1,
                        source: Box::new(e),
                    })
                }
            }
        }
    }
}
