use clap::{Parser, Subcommand};
use insights::agent::{Coordinator, ModelNarrator, Narrator, PersonaCatalog, TemplateNarrator};
use insights::config::InsightsConfig;
use insights::fixtures::{FixtureSet, Severity};
use insights::lookup;
use insights::tools::ToolRegistry;
use insights::validator::ReportValidator;
use model::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "quality-insights")]
#[command(about = "Multi-agent quality reports over sprint, test and incident data")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding jira_data.json, zephyr_data.json and incident_data.json
    /// (default: insights/data, relative to the workspace root)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the specialists and coordinator and print the validated report
    Report {
        /// What the report should answer
        #[arg(short, long, default_value = "Generate the weekly quality report")]
        query: String,
        /// Team name for the report title
        #[arg(short, long)]
        team: Option<String>,
        /// Narrate with the configured chat model instead of templates
        #[arg(long)]
        llm: bool,
        /// Print the whole run as JSON
        #[arg(long)]
        json: bool,
    },
    /// Score a report file
    Validate {
        /// Markdown or plain-text report
        #[arg(short, long)]
        file: PathBuf,
        /// Skip cross-checking cited identifiers against the fixtures
        #[arg(long)]
        no_fixtures: bool,
        #[arg(long)]
        json: bool,
    },
    /// Metrics for a sprint (latest when omitted)
    Sprint {
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Completion trend over recent sprints
    Velocity {
        #[arg(short, long)]
        sprints: Option<usize>,
    },
    /// Pass rate for a test cycle (latest when omitted)
    PassRate {
        #[arg(long)]
        cycle: Option<String>,
    },
    /// Tests that pass inconsistently across cycles
    Flaky {
        /// Pass ratio (0.0 to 1.0) below which a test is flaky
        #[arg(long, value_parser = parse_ratio)]
        threshold: Option<f64>,
        #[arg(long)]
        min_executions: Option<usize>,
    },
    /// Incidents over a look-back window
    Incidents {
        /// critical, high, medium or low
        #[arg(short, long)]
        severity: Option<Severity>,
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Mean time to resolve per severity
    Mttr,
    /// List the lookup tools offered to the model
    Tools,
    /// List agent personas
    Personas,
    /// Check that the chat model endpoint is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => InsightsConfig::load(path)?,
        None => InsightsConfig::default().with_env_overrides(),
    };
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    match cli.command {
        Commands::Report {
            query,
            team,
            llm,
            json,
        } => {
            if let Some(team) = team {
                config = config.with_team_name(team);
            }
            if llm {
                config = config.with_model_enabled(true);
            }
            config.validate()?;
            run_report(&config, &query, json).await?;
        }
        Commands::Validate {
            file,
            no_fixtures,
            json,
        } => {
            let passed = validate_file(&config, &file, no_fixtures, json)?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Sprint { name } => {
            let fixtures = load_fixtures(&config)?;
            print_json(&lookup::sprint_metrics(&fixtures, name.as_deref()))?;
        }
        Commands::Velocity { sprints } => {
            let fixtures = load_fixtures(&config)?;
            let n = sprints.unwrap_or(config.analysis.velocity_window);
            print_json(&lookup::velocity_trend(&fixtures, n))?;
        }
        Commands::PassRate { cycle } => {
            let fixtures = load_fixtures(&config)?;
            print_json(&lookup::test_pass_rate(&fixtures, cycle.as_deref()))?;
        }
        Commands::Flaky {
            threshold,
            min_executions,
        } => {
            let fixtures = load_fixtures(&config)?;
            print_json(&lookup::flaky_tests(
                &fixtures,
                threshold.unwrap_or(config.analysis.flaky_threshold),
                min_executions.unwrap_or(config.analysis.flaky_min_executions),
            ))?;
        }
        Commands::Incidents { severity, days } => {
            let fixtures = load_fixtures(&config)?;
            let as_of = config.analysis.resolve_as_of(&fixtures);
            print_json(&lookup::incident_summary(
                &fixtures,
                severity,
                days.unwrap_or(config.analysis.incident_window_days),
                as_of,
            ))?;
        }
        Commands::Mttr => {
            let fixtures = load_fixtures(&config)?;
            print_json(&lookup::mttr_by_severity(&fixtures))?;
        }
        Commands::Tools => {
            let fixtures = Arc::new(load_fixtures(&config)?);
            let as_of = config.analysis.resolve_as_of(&fixtures);
            list_tools(&ToolRegistry::with_lookup_tools(fixtures, as_of));
        }
        Commands::Personas => {
            list_personas(&PersonaCatalog::standard());
        }
        Commands::Health => {
            let provider = OllamaProvider::new(config.model.ollama_config())?;
            health_check(&provider).await?;
        }
    }

    Ok(())
}

fn parse_ratio(raw: &str) -> Result<f64, String> {
    let ratio: f64 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{} is not between 0.0 and 1.0", ratio))
    }
}

fn load_fixtures(config: &InsightsConfig) -> Result<FixtureSet, Box<dyn std::error::Error>> {
    Ok(FixtureSet::load_dir(&config.fixtures.data_dir)?)
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_report(
    config: &InsightsConfig,
    query: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let fixtures = Arc::new(load_fixtures(config)?);

    let narrator: Box<dyn Narrator> = if config.model.enabled {
        let provider = OllamaProvider::new(config.model.ollama_config())?;
        let as_of = config.analysis.resolve_as_of(&fixtures);
        let tools = Arc::new(ToolRegistry::with_lookup_tools(fixtures.clone(), as_of));
        info!("Narrating with model {}", config.model.name);
        Box::new(
            ModelNarrator::new(provider, config.model.name.clone(), tools)
                .with_temperature(config.model.temperature)
                .with_max_tool_rounds(config.model.max_tool_rounds),
        )
    } else {
        Box::new(TemplateNarrator::new())
    };

    let coordinator = Coordinator::new(fixtures, config, narrator)?;
    let run = coordinator.run(query).await?;

    if json {
        return print_json(&run);
    }

    println!("{}", run.report);
    println!("\n---");
    println!(
        "Run {}: {} after {} draft(s)",
        run.run_id, run.outcome, run.attempts
    );
    print_feedback(&run.outcome.messages, &run.outcome.warnings);
    Ok(())
}

fn validate_file(
    config: &InsightsConfig,
    file: &Path,
    no_fixtures: bool,
    json: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(file)?;
    let fixtures = if no_fixtures {
        None
    } else {
        Some(load_fixtures(config)?)
    };

    let validator = ReportValidator::new(config.validator.clone())?;
    let outcome = validator.validate(&text, fixtures.as_ref());

    if json {
        print_json(&outcome)?;
    } else {
        println!("{}", outcome);
        print_feedback(&outcome.messages, &outcome.warnings);
    }
    Ok(outcome.passed)
}

fn print_feedback(messages: &[String], warnings: &[String]) {
    for (i, message) in messages.iter().enumerate() {
        println!("  {}. {}", i + 1, message);
    }
    for warning in warnings {
        println!("  warning: {}", warning);
    }
}

fn list_tools(tool_registry: &ToolRegistry) {
    println!("Available tools:");
    for tool_name in tool_registry.list_tools() {
        if let Some(tool) = tool_registry.get_tool(tool_name) {
            let def = tool.definition();
            println!("  - {}: {}", def.function.name, def.function.description);
        }
    }
}

fn list_personas(catalog: &PersonaCatalog) {
    println!("Personas:");
    for persona in catalog.iter() {
        println!("  - {} ({}): {}", persona.role, persona.name, persona.description);
        if !persona.tools.is_empty() {
            println!("      tools: {}", persona.tools.join(", "));
        }
    }
}

async fn health_check(provider: &OllamaProvider) -> Result<(), Box<dyn std::error::Error>> {
    println!("Checking {} at {}...", provider.provider_name(), provider.base_url());

    match provider.health_check().await {
        Ok(()) => {
            println!("✓ Health check passed. Ollama is running and accessible.");
            info!("Health check successful");
        }
        Err(e) => {
            println!("✗ Health check failed: {}", e);
            error!("Health check failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
