//! qa-cascade entry point.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;

use qa_cascade::cli::{Cli, Commands};
use qa_cascade::reporting::{self, ReportFormat};
use qa_cascade::utils::logging::init_logging;
use qa_cascade::{FeedbackManager, IssueStore, Orchestrator, RunOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let store = IssueStore::new(&cli.project);
    let feedback = FeedbackManager::new(store.clone());

    match &cli.command {
        Some(Commands::ReportIssue { title, description }) => {
            let issue = feedback.manual(title, description)?;
            println!("{}", issue.id);
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::ListIssues { limit, json }) => {
            for issue in store.list(*limit)? {
                if *json {
                    println!("{}", serde_json::to_string(&issue)?);
                } else {
                    let kind = issue.error_kind.map(|k| k.to_string()).unwrap_or_else(|| "-".to_string());
                    println!(
                        "{}  {}  {:<9} {:<26} {}",
                        issue.id,
                        issue.created_at.format("%Y-%m-%d %H:%M"),
                        format!("{:?}", issue.source).to_lowercase(),
                        kind,
                        issue.title
                    );
                }
            }
            return Ok(ExitCode::SUCCESS);
        }
        None => {}
    }

    let outcome = Orchestrator::new(cli.run_options()).run().await;

    if let Some(fatal) = &outcome.fatal {
        eprintln!("qa-cascade: {}", fatal.message);
        record_issue(&cli, &feedback, &outcome);
        return Ok(ExitCode::from(outcome.exit_code()));
    }

    if let Some(report) = &outcome.report {
        let rendered = reporting::render(report, cli.report)?;
        write_report(&rendered, cli.output.as_deref(), cli.report)?;
        if let Err(e) = store.save_last_run(report) {
            tracing::warn!("Could not save last run: {}", e);
        }
    }
    record_issue(&cli, &feedback, &outcome);

    Ok(ExitCode::from(outcome.exit_code()))
}

fn record_issue(cli: &Cli, feedback: &FeedbackManager, outcome: &RunOutcome) {
    if !cli.report_issue {
        return;
    }
    match feedback.report_failure(outcome) {
        Ok(Some(issue)) => eprintln!("Recorded issue {}", issue.id),
        Ok(None) => {}
        Err(e) => tracing::warn!("Could not record issue: {}", e),
    }
}

fn write_report(rendered: &str, output: Option<&Path>, format: ReportFormat) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {} report to {}", format_name(format), path.display()))?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => print!("{}", ensure_trailing_newline(rendered)),
    }
    Ok(())
}

fn format_name(format: ReportFormat) -> &'static str {
    match format {
        ReportFormat::Console => "console",
        ReportFormat::Json => "json",
        ReportFormat::CiJson => "ci-json",
        ReportFormat::Html => "html",
    }
}

fn ensure_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}
