use super::{AgentError, AgentResult, Persona, PersonaCatalog, Role};
use crate::analysis::{detect_problems, Evidence, ProblemArea, ProblemCategory, ProblemRules};
use crate::config::AnalysisSettings;
use crate::fixtures::FixtureSet;
use crate::lookup;
use serde::{Deserialize, Serialize};

/// One specialist's contribution to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub role: Role,
    pub evidence: Evidence,
    pub prose: String,
    pub problems: Vec<ProblemArea>,
}

/// A specialist persona bound to the lookups of its domain.
#[derive(Debug, Clone)]
pub struct Specialist {
    persona: Persona,
    domain: ProblemCategory,
}

impl Specialist {
    pub fn new(persona: Persona) -> AgentResult<Self> {
        let domain = match persona.role {
            Role::DeliveryAnalyst => ProblemCategory::Delivery,
            Role::TestQualityAnalyst => ProblemCategory::TestQuality,
            Role::ReliabilityAnalyst => ProblemCategory::Reliability,
            other => return Err(AgentError::NotASpecialist(other)),
        };
        Ok(Self { persona, domain })
    }

    pub fn from_catalog(catalog: &PersonaCatalog, role: Role) -> AgentResult<Self> {
        Self::new(catalog.get(role)?.clone())
    }

    pub fn role(&self) -> Role {
        self.persona.role
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn domain(&self) -> ProblemCategory {
        self.domain
    }

    /// Run this specialist's two lookups against the snapshot.
    pub fn gather(&self, fixtures: &FixtureSet, settings: &AnalysisSettings) -> Evidence {
        match self.domain {
            ProblemCategory::Delivery => Evidence::Delivery {
                sprint: lookup::sprint_metrics(fixtures, None),
                velocity: lookup::velocity_trend(fixtures, settings.velocity_window),
            },
            ProblemCategory::TestQuality => Evidence::TestQuality {
                pass_rate: lookup::test_pass_rate(fixtures, None),
                flaky: lookup::flaky_tests(
                    fixtures,
                    settings.flaky_threshold,
                    settings.flaky_min_executions,
                ),
            },
            ProblemCategory::Reliability => Evidence::Reliability {
                incidents: lookup::incident_summary(
                    fixtures,
                    None,
                    settings.incident_window_days,
                    settings.resolve_as_of(fixtures),
                ),
                mttr: lookup::mttr_by_severity(fixtures),
            },
        }
    }

    pub fn problems(&self, evidence: &Evidence, rules: &ProblemRules) -> Vec<ProblemArea> {
        detect_problems(evidence, rules)
    }
}
