use super::prompts::{FindingsPrompt, ReportPrompt, RevisionPrompt};
use super::specialist::Finding;
use super::{AgentError, AgentResult, Persona, Role};
use crate::analysis::{Evidence, ProblemArea};
use crate::fixtures::Severity;
use crate::lookup::{
    FlakyTestReport, IncidentSummary, MttrReport, PassRateSummary, SprintSummary, VelocityTrend,
};
use crate::report::QualityReport;
use crate::tools::ToolRegistry;
use crate::validator::ValidationOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{ChatMessage, ChatRequest, ModelError, ModelProvider};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// A failing draft and the feedback it received.
#[derive(Debug, Clone, Copy)]
pub struct Revision<'a> {
    /// 1 for the first revision
    pub number: u32,
    pub previous_draft: &'a str,
    pub outcome: &'a ValidationOutcome,
}

/// Everything the coordinator persona needs to write a report.
#[derive(Debug, Clone)]
pub struct ComposeRequest<'a> {
    pub team_name: &'a str,
    pub query: &'a str,
    pub findings: &'a [Finding],
    pub generated_at: DateTime<Utc>,
    pub revision: Option<Revision<'a>>,
}

impl ComposeRequest<'_> {
    /// Problems from every finding, most severe first.
    pub fn problems(&self) -> Vec<ProblemArea> {
        let mut problems: Vec<ProblemArea> = self
            .findings
            .iter()
            .flat_map(|f| f.problems.iter().cloned())
            .collect();
        problems.sort_by(|a, b| b.severity.cmp(&a.severity));
        problems
    }

    fn prose_for(&self, role: Role) -> Option<&str> {
        self.findings
            .iter()
            .find(|f| f.role == role)
            .map(|f| f.prose.as_str())
    }
}

/// Turns evidence into prose and findings into a report.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn describe(&self, persona: &Persona, query: &str, evidence: &Evidence)
        -> AgentResult<String>;

    async fn compose(&self, persona: &Persona, request: &ComposeRequest<'_>) -> AgentResult<String>;

    fn name(&self) -> &str;
}

/// Deterministic offline narration built from the evidence alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Narrator for TemplateNarrator {
    async fn describe(
        &self,
        _persona: &Persona,
        _query: &str,
        evidence: &Evidence,
    ) -> AgentResult<String> {
        Ok(describe_evidence(evidence))
    }

    async fn compose(&self, _persona: &Persona, request: &ComposeRequest<'_>) -> AgentResult<String> {
        let missing = |area: &str| format!("No {} findings were gathered.", area);
        let mut report = QualityReport::new(request.team_name, String::new())
            .with_generated_at(request.generated_at)
            .with_problems(request.problems())
            .with_sections(
                request
                    .prose_for(Role::DeliveryAnalyst)
                    .map_or_else(|| missing("delivery"), str::to_string),
                request
                    .prose_for(Role::TestQualityAnalyst)
                    .map_or_else(|| missing("test quality"), str::to_string),
                request
                    .prose_for(Role::ReliabilityAnalyst)
                    .map_or_else(|| missing("incident"), str::to_string),
            );
        report.executive_summary = executive_summary(request, &report.problem_areas);

        let mut markdown = report.to_markdown();
        if let Some(revision) = request.revision {
            markdown.push_str("\n\n");
            markdown.push_str(&follow_up(request, revision));
        }
        Ok(markdown)
    }

    fn name(&self) -> &str {
        "template"
    }
}

pub fn describe_evidence(evidence: &Evidence) -> String {
    match evidence {
        Evidence::Delivery { sprint, velocity } => describe_delivery(sprint, velocity),
        Evidence::TestQuality { pass_rate, flaky } => describe_tests(pass_rate, flaky),
        Evidence::Reliability { incidents, mttr } => describe_incidents(incidents, mttr),
    }
}

fn describe_delivery(sprint: &SprintSummary, velocity: &VelocityTrend) -> String {
    let mut sentences = Vec::new();

    if sprint.is_empty() {
        sentences.push("No sprint data was available.".to_string());
    } else {
        sentences.push(format!(
            "{} ({}) completed {} of {} planned points ({}%). Of its {} tickets, {} are done, {} in progress, {} blocked and {} not started.",
            sprint.sprint_name,
            sprint.date_range,
            sprint.completed_points,
            sprint.planned_points,
            sprint.completion_rate,
            sprint.total_tickets,
            sprint.completed_tickets,
            sprint.in_progress_tickets,
            sprint.blocked_tickets,
            sprint.todo_tickets
        ));
        if !sprint.blocked_ticket_ids.is_empty() {
            sentences.push(format!(
                "Blocked tickets: {}.",
                sprint.blocked_ticket_ids.join(", ")
            ));
        }
    }

    if velocity.sprints.len() >= 2 {
        sentences.push(format!(
            "Over the {} completion averaged {}% and the trend is {} ({:+}% change).",
            velocity.analysis_period.to_lowercase(),
            velocity.average_completion_rate,
            velocity.trend.as_str(),
            velocity.change_percent
        ));
        if let (Some(low), Some(high)) = (&velocity.lowest_sprint, &velocity.highest_sprint) {
            sentences.push(format!(
                "The lowest was {} at {}% and the highest {} at {}%.",
                low.sprint_name, low.completion_rate, high.sprint_name, high.completion_rate
            ));
        }
        if let Some(drop) = velocity.largest_drop() {
            sentences.push(format!(
                "The largest drop was {} points, from {} to {}.",
                drop.points, drop.from_sprint, drop.to_sprint
            ));
        }
    }

    sentences.join(" ")
}

fn describe_tests(pass_rate: &PassRateSummary, flaky: &FlakyTestReport) -> String {
    let mut sentences = Vec::new();

    if pass_rate.is_empty() {
        sentences.push("No test cycle data was available.".to_string());
    } else {
        sentences.push(format!(
            "{} ({}) passed {} of {} tests ({}%), with {} failed, {} blocked and {} skipped.",
            pass_rate.cycle_name,
            pass_rate.date_range,
            pass_rate.passed,
            pass_rate.total_tests,
            pass_rate.pass_rate,
            pass_rate.failed,
            pass_rate.blocked,
            pass_rate.skipped
        ));
        if !pass_rate.failed_test_ids.is_empty() {
            sentences.push(format!(
                "Failing tests: {}.",
                pass_rate.failed_test_ids.join(", ")
            ));
        }
    }

    if flaky.flaky_tests.is_empty() {
        sentences.push(format!(
            "No flaky tests were found across {} cycles.",
            flaky.cycles_analyzed
        ));
    } else {
        let listed: Vec<String> = flaky
            .flaky_tests
            .iter()
            .map(|t| {
                format!(
                    "{} '{}' ({}% over {} runs)",
                    t.test_id, t.test_name, t.pass_rate, t.executions
                )
            })
            .collect();
        sentences.push(format!(
            "{} flaky tests across {} cycles: {}.",
            flaky.total_flaky_tests,
            flaky.cycles_analyzed,
            listed.join(", ")
        ));
    }

    sentences.join(" ")
}

fn describe_incidents(incidents: &IncidentSummary, mttr: &MttrReport) -> String {
    let mut sentences = Vec::new();

    let mix: Vec<String> = Severity::ALL
        .iter()
        .map(|s| format!("{} {}", incidents.count(*s), s.as_str()))
        .collect();
    sentences.push(format!(
        "{}: {} incidents ({}) affecting {} users; {} resolved and {} unresolved.",
        incidents.time_period,
        incidents.total_incidents,
        mix.join(", "),
        incidents.affected_users_total,
        incidents.resolved,
        incidents.unresolved
    ));

    let open: Vec<String> = incidents
        .incidents
        .iter()
        .filter(|i| !i.resolved)
        .map(|i| {
            format!(
                "{} ({}, {}, {} users)",
                i.id,
                i.title,
                i.severity.as_str(),
                i.affected_users
            )
        })
        .collect();
    if !open.is_empty() {
        sentences.push(format!("Unresolved: {}.", open.join("; ")));
    }

    if mttr.total_resolved == 0 {
        sentences.push("No resolved incidents to measure time to resolve.".to_string());
    } else {
        let by_severity: Vec<String> = Severity::ALL
            .iter()
            .filter_map(|s| mttr.mttr_for(*s).map(|h| format!("{} {} hours", s.as_str(), h)))
            .collect();
        sentences.push(format!(
            "Mean time to resolve: {}; {} hours overall across {} resolved incidents.",
            by_severity.join(", "),
            mttr.overall_mttr_hours,
            mttr.total_resolved
        ));
    }

    sentences.join(" ")
}

fn executive_summary(request: &ComposeRequest<'_>, problems: &[ProblemArea]) -> String {
    let mut paragraphs = vec![format!(
        "This report answers \"{}\" for {} using sprint, regression test and incident data.",
        request.query, request.team_name
    )];

    if problems.is_empty() {
        paragraphs.push("No problem areas were detected.".to_string());
    } else {
        let counts: Vec<String> = Severity::ALL
            .iter()
            .map(|s| (s, problems.iter().filter(|p| p.severity == *s).count()))
            .filter(|(_, n)| *n > 0)
            .map(|(s, n)| format!("{} {}", n, s.as_str()))
            .collect();
        let top: Vec<String> = problems
            .iter()
            .take(3)
            .map(|p| format!("{} ({}): {}", p.title, p.severity.tag(), p.description))
            .collect();
        paragraphs.push(format!(
            "{} problem areas need attention ({}). Most pressing: {}",
            problems.len(),
            counts.join(", "),
            top.join(" ")
        ));
    }

    let headlines: Vec<String> = request
        .findings
        .iter()
        .filter_map(|f| headline(&f.evidence))
        .collect();
    if !headlines.is_empty() {
        paragraphs.push(headlines.join(" "));
    }

    paragraphs.join("\n\n")
}

fn headline(evidence: &Evidence) -> Option<String> {
    match evidence {
        Evidence::Delivery { sprint, .. } => (!sprint.is_empty()).then(|| {
            format!(
                "{} delivered {} of {} planned points ({}%).",
                sprint.sprint_name, sprint.completed_points, sprint.planned_points, sprint.completion_rate
            )
        }),
        Evidence::TestQuality { pass_rate, .. } => (!pass_rate.is_empty()).then(|| {
            format!(
                "{} passed {} of {} tests ({}%).",
                pass_rate.cycle_name, pass_rate.passed, pass_rate.total_tests, pass_rate.pass_rate
            )
        }),
        Evidence::Reliability { incidents, .. } => Some(format!(
            "{} saw {} incidents with {} still unresolved.",
            incidents.time_period, incidents.total_incidents, incidents.unresolved
        )),
    }
}

/// Consolidated actions and cited records appended to a revised draft.
fn follow_up(request: &ComposeRequest<'_>, revision: Revision<'_>) -> String {
    let mut actions: Vec<String> = Vec::new();
    let problems = request.problems();
    let candidates = problems
        .iter()
        .flat_map(|p| p.recommendations.iter().cloned())
        .chain(request.findings.iter().filter_map(|f| watch_action(&f.evidence)));
    for action in candidates {
        if !actions.contains(&action) {
            actions.push(action);
        }
    }

    let mut citations: Vec<String> = Vec::new();
    for id in request.findings.iter().flat_map(|f| f.evidence.citations()) {
        if !citations.contains(&id) {
            citations.push(id);
        }
    }

    let mut lines = vec![
        "## Recommended Next Steps".to_string(),
        format!(
            "Revision {} after a score of {}/100 with {} issue(s) raised.",
            revision.number,
            revision.outcome.score,
            revision.outcome.messages.len()
        ),
        String::new(),
    ];
    lines.extend(
        actions
            .iter()
            .enumerate()
            .map(|(i, action)| format!("{}. {}", i + 1, action)),
    );
    if !citations.is_empty() {
        lines.push(String::new());
        lines.push(format!("Cited records: {}.", citations.join(", ")));
    }
    lines.join("\n")
}

/// A standing action for each domain, so a clean report still has next steps.
fn watch_action(evidence: &Evidence) -> Option<String> {
    match evidence {
        Evidence::Delivery { sprint, .. } => (!sprint.is_empty()).then(|| {
            format!(
                "Track completion of {} ({}%) against the next sprint plan at sprint review",
                sprint.sprint_name, sprint.completion_rate
            )
        }),
        Evidence::TestQuality { pass_rate, .. } => (!pass_rate.is_empty()).then(|| {
            format!(
                "Run {} again before the next release and compare it with the {}% pass rate",
                pass_rate.cycle_name, pass_rate.pass_rate
            )
        }),
        Evidence::Reliability { mttr, incidents } => Some(format!(
            "Review the {} incidents and the {} hour overall MTTR at the next reliability review",
            incidents.total_incidents, mttr.overall_mttr_hours
        )),
    }
}

/// Narration through a chat model, with tool calls answered from the registry.
pub struct ModelNarrator<P: ModelProvider> {
    provider: P,
    model: String,
    temperature: f32,
    tools: Arc<ToolRegistry>,
    max_tool_rounds: usize,
}

impl<P: ModelProvider> ModelNarrator<P> {
    pub fn new(provider: P, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            tools,
            max_tool_rounds: 4,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Chat until the model answers in text, running requested tools in between.
    async fn converse(&self, persona: &Persona, prompt: String) -> AgentResult<String> {
        let definitions = self.tools.definitions_for(&persona.tools);
        let mut messages = vec![
            ChatMessage::system(persona.system_prompt.clone()),
            ChatMessage::user(prompt),
        ];

        for round in 0..=self.max_tool_rounds {
            let mut request = ChatRequest::new(self.model.clone(), messages.clone())
                .with_temperature(self.temperature);
            if !definitions.is_empty() && round < self.max_tool_rounds {
                request = request.with_tools(definitions.clone());
            }

            let response = self.provider.chat(request).await?;
            let message = response
                .first_message()
                .cloned()
                .ok_or(ModelError::EmptyResponse)?;

            let calls = message.requested_tools().to_vec();
            if calls.is_empty() {
                let text = message.text().trim();
                if text.is_empty() {
                    return Err(ModelError::EmptyResponse.into());
                }
                return Ok(text.to_string());
            }

            debug!(
                "{} requested {} tool call(s) in round {}",
                persona.role,
                calls.len(),
                round + 1
            );
            messages.push(message);
            for call in calls {
                let content = if persona.tools.contains(&call.function.name) {
                    match self
                        .tools
                        .execute(&call.function.name, call.function.arguments.clone())
                        .await
                    {
                        Ok(value) => value.to_string(),
                        Err(e) => {
                            warn!("Tool {} failed: {}", call.function.name, e);
                            json!({ "error": e.to_string() }).to_string()
                        }
                    }
                } else {
                    json!({
                        "error": format!("tool '{}' is not available to {}", call.function.name, persona.role)
                    })
                    .to_string()
                };
                messages.push(ChatMessage::tool_response(call.id.clone(), content));
            }
        }

        Err(AgentError::ToolRoundsExceeded {
            rounds: self.max_tool_rounds,
        })
    }
}

#[async_trait]
impl<P: ModelProvider> Narrator for ModelNarrator<P> {
    async fn describe(
        &self,
        persona: &Persona,
        query: &str,
        evidence: &Evidence,
    ) -> AgentResult<String> {
        let evidence_json = serde_json::to_string_pretty(evidence)?;
        self.converse(persona, FindingsPrompt::build(query, &evidence_json))
            .await
    }

    async fn compose(&self, persona: &Persona, request: &ComposeRequest<'_>) -> AgentResult<String> {
        let prompt = match request.revision {
            Some(revision) => RevisionPrompt::build(
                revision.previous_draft,
                revision.outcome.score,
                &revision.outcome.feedback(),
            ),
            None => ReportPrompt::build(
                request.team_name,
                request.query,
                request.findings,
                &serde_json::to_string_pretty(&request.problems())?,
            ),
        };
        self.converse(persona, prompt).await
    }

    fn name(&self) -> &str {
        self.provider.provider_name()
    }
}
