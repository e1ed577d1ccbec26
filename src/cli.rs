//! Command-line interface.
//!
//! `run` executes a research pipeline from a JSON input document; `show`,
//! `list` and `delete` work on persisted reports; `steps` prints the built-in
//! research plan.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::langbase::LangbaseClient;
use crate::model::{OverallStatus, ProspectInput, ResearchStep};
use crate::pipeline::{default_steps, PipelineOrchestrator};
use crate::prompts::{INSIGHTS_SYSTEM_PROMPT, RESEARCH_SYSTEM_PROMPT};
use crate::research::LangbaseResearcher;
use crate::storage::{ReportStore, SqliteReportStore};

const RULE: &str = "═══════════════════════════════════════════════════════════════════════════════";

/// Prospect research and qualification.
#[derive(Parser, Debug)]
#[command(name = "prospect-research", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Research a prospect and print the report as JSON
    Run {
        /// JSON file with `target`, `selling_product` and optional `steps`
        #[arg(long, short)]
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Save the report to the database
        #[arg(long)]
        persist: bool,

        /// Count POTENTIALLY/LIKELY MATCHES verdicts as matches
        #[arg(long)]
        include_potential: bool,
    },

    /// Print a stored report
    Show {
        /// Report id
        id: String,
    },

    /// List stored reports, newest first
    List {
        /// Maximum number of reports to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Delete a stored report
    Delete {
        /// Report id
        id: String,
    },

    /// Print the built-in research steps
    Steps,
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a CLI command against live services.
pub async fn execute_command(command: Commands, config: &Config) -> CliResult {
    match command {
        Commands::Run {
            input,
            output,
            persist,
            include_potential,
        } => execute_run(config, &input, output.as_deref(), persist, include_potential).await,
        Commands::Show { id } => match open_store(config).await {
            Ok(store) => show_report(&store, &id).await,
            Err(result) => result,
        },
        Commands::List { limit } => match open_store(config).await {
            Ok(store) => list_reports(&store, limit).await,
            Err(result) => result,
        },
        Commands::Delete { id } => match open_store(config).await {
            Ok(store) => delete_report(&store, &id).await,
            Err(result) => result,
        },
        Commands::Steps => CliResult::success(describe_steps(&default_steps())),
    }
}

async fn open_store(config: &Config) -> Result<SqliteReportStore, CliResult> {
    SqliteReportStore::new(&config.database).await.map_err(|e| {
        error!(error = %e, "Failed to open report database");
        CliResult::error(format!("Failed to open database: {}", e))
    })
}

async fn execute_run(
    config: &Config,
    input: &Path,
    output: Option<&Path>,
    persist: bool,
    include_potential: bool,
) -> CliResult {
    let input = match load_input(input) {
        Ok(input) => input,
        Err(message) => return CliResult::error(message),
    };

    let mut config = config.clone();
    if include_potential {
        config.scoring.include_potential = true;
    }

    let client = match LangbaseClient::new(&config.langbase, config.request.clone()) {
        Ok(client) => client,
        Err(e) => return CliResult::error(format!("Failed to create Langbase client: {}", e)),
    };

    info!("Ensuring required Langbase pipes exist...");
    let pipes = [
        (
            config.pipes.research.as_str(),
            "Prospect research: answers one research question with sources",
            RESEARCH_SYSTEM_PROMPT,
        ),
        (
            config.pipes.insights.as_str(),
            "Prospect insights: pain points, value propositions, objections, buyers",
            INSIGHTS_SYSTEM_PROMPT,
        ),
    ];
    for (name, description, prompt) in pipes {
        if let Err(e) = client.ensure_pipe(name, description, prompt).await {
            error!(pipe = %name, error = %e, "Failed to ensure pipe exists");
            return CliResult::error(format!("Failed to ensure pipe {}: {}", name, e));
        }
    }

    let research = Arc::new(LangbaseResearcher::new(client.clone(), &config.pipes.research));
    let insights = Arc::new(LangbaseResearcher::new(client, &config.pipes.insights));
    let orchestrator = PipelineOrchestrator::from_config(&config, research, insights);

    let store = if persist {
        match open_store(&config).await {
            Ok(store) => Some(store),
            Err(result) => return result,
        }
    } else {
        None
    };

    run_report(
        &orchestrator,
        input,
        output,
        store.as_ref().map(|s| s as &dyn ReportStore),
    )
    .await
}

/// Read and parse an input document.
pub fn load_input(path: &Path) -> Result<ProspectInput, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid input {}: {}", path.display(), e))
}

/// Run the pipeline for `input`, then write and optionally persist the report.
///
/// The exit code is non-zero when the run could not start.
pub async fn run_report(
    orchestrator: &PipelineOrchestrator,
    input: ProspectInput,
    output: Option<&Path>,
    store: Option<&dyn ReportStore>,
) -> CliResult {
    let steps = input.steps.unwrap_or_else(default_steps);
    let report = match orchestrator
        .run(input.target, input.selling_product, &steps)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Research run failed");
            return CliResult::error(format!("Research failed: {}", e));
        }
    };

    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(e) => return CliResult::error(format!("Failed to serialize report: {}", e)),
    };

    let mut message = match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &json) {
                return CliResult::error(format!("Failed to write {}: {}", path.display(), e));
            }
            format!(
                "{}: {} (score {:.2}), {} steps, {} failed. Report written to {}",
                report.target.name,
                report.fit_level,
                report.fit_score,
                report.steps.len(),
                report.failed_step_count(),
                path.display()
            )
        }
        None => json,
    };

    if let Some(store) = store {
        match store.save(&report).await {
            Ok(id) => {
                info!(report_id = %id, "Report persisted");
                if output.is_some() {
                    message.push_str(&format!("\nSaved report {}", id));
                }
            }
            Err(e) => return CliResult::error(format!("Failed to save report: {}", e)),
        }
    }

    if report.overall_status == OverallStatus::Failed {
        CliResult {
            exit_code: 1,
            message,
        }
    } else {
        CliResult::success(message)
    }
}

/// Print one stored report as JSON.
pub async fn show_report(store: &dyn ReportStore, id: &str) -> CliResult {
    match store.get(id).await {
        Ok(Some(report)) => match serde_json::to_string_pretty(&report) {
            Ok(json) => CliResult::success(json),
            Err(e) => CliResult::error(format!("Failed to serialize report: {}", e)),
        },
        Ok(None) => CliResult::error(format!("Report not found: {}", id)),
        Err(e) => CliResult::error(format!("Failed to load report: {}", e)),
    }
}

/// Tabulate stored reports.
pub async fn list_reports(store: &dyn ReportStore, limit: u32) -> CliResult {
    let summaries = match store.list(limit).await {
        Ok(summaries) => summaries,
        Err(e) => return CliResult::error(format!("Failed to list reports: {}", e)),
    };

    let mut output = String::new();
    output.push_str("\nProspect Reports\n");
    output.push_str(RULE);
    output.push_str("\n\n");

    if summaries.is_empty() {
        output.push_str("No reports stored.\n");
        return CliResult::success(output);
    }

    for s in &summaries {
        output.push_str(&format!(
            "{}  {:<24} {:<9} {:.2}  {:<9} {}\n",
            s.id,
            truncate(&s.target_name, 24),
            s.fit_level.to_string(),
            s.fit_score,
            s.overall_status.to_string(),
            s.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
    CliResult::success(output)
}

/// Delete one stored report.
pub async fn delete_report(store: &dyn ReportStore, id: &str) -> CliResult {
    match store.delete(id).await {
        Ok(()) => CliResult::success(format!("Deleted report {}", id)),
        Err(e) => CliResult::error(format!("Failed to delete report: {}", e)),
    }
}

/// Human-readable research plan.
pub fn describe_steps(steps: &[ResearchStep]) -> String {
    let mut output = String::new();
    output.push_str("\nResearch Steps\n");
    output.push_str(RULE);
    output.push('\n');

    for (i, step) in steps.iter().enumerate() {
        output.push_str(&format!("\n{}. {} [{:?}]\n", i + 1, step.step_id, step.kind));
        if !step.depends_on.is_empty() {
            output.push_str(&format!("   depends on: {}\n", step.depends_on.join(", ")));
        }
        let first_line = step.question.lines().next().unwrap_or_default();
        output.push_str(&format!("   {}\n", first_line));
    }
    output
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProspectReport, SellingProduct, TargetCompany};
    use crate::pipeline::QUALIFICATION_STEP_ID;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "prospect-research",
            "run",
            "--input",
            "acme.json",
            "--persist",
            "--include-potential",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Run {
                input: PathBuf::from("acme.json"),
                output: None,
                persist: true,
                include_potential: true,
            }
        );
    }

    #[test]
    fn test_parse_list_default_limit() {
        let cli = Cli::try_parse_from(["prospect-research", "list"]).unwrap();
        assert_eq!(cli.command, Commands::List { limit: 20 });
    }

    #[test]
    fn test_describe_default_steps() {
        let text = describe_steps(&default_steps());
        assert!(text.contains("1. company_overview [General]"));
        assert!(text.contains(QUALIFICATION_STEP_ID));
        assert!(text.contains("depends on: company_overview"));
    }

    #[test]
    fn test_load_input_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_input(&path).unwrap_err();
        assert!(err.starts_with("Invalid input"));
    }

    #[test]
    fn test_load_input_without_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(
            &path,
            r#"{"target": {"name": "Acme Co"}, "selling_product": {"name": "MeterFlow"}}"#,
        )
        .unwrap();
        let input = load_input(&path).unwrap();
        assert_eq!(input.target.name, "Acme Co");
        assert!(input.steps.is_none());
    }

    #[tokio::test]
    async fn test_show_list_delete() {
        let store = SqliteReportStore::new_in_memory().await.unwrap();
        let report = ProspectReport::start(
            TargetCompany {
                name: "Acme Co".to_string(),
                ..Default::default()
            },
            SellingProduct {
                name: "MeterFlow".to_string(),
                ..Default::default()
            },
        );
        let id = store.save(&report).await.unwrap();

        let listed = list_reports(&store, 10).await;
        assert_eq!(listed.exit_code, 0);
        assert!(listed.message.contains(&id));
        assert!(listed.message.contains("Acme Co"));

        let shown = show_report(&store, &id).await;
        assert_eq!(shown.exit_code, 0);
        assert!(shown.message.contains("\"overall_status\": \"running\""));

        assert_eq!(delete_report(&store, &id).await.exit_code, 0);
        assert_eq!(show_report(&store, &id).await.exit_code, 1);
        assert!(list_reports(&store, 10).await.message.contains("No reports stored."));
    }
}
