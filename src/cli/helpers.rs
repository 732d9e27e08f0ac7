//! Report rendering for CLI commands.

use std::path::PathBuf;

use console::style;
use serde::Serialize;

use dict_spider::models::RunSummary;
use dict_spider::spider::{RunPlan, SourceDiscovery};
use dict_spider::utils::format_size;

/// One planned download as shown by `--dry-run`.
#[derive(Debug, Serialize)]
struct PlannedTask<'a> {
    label: String,
    url: &'a str,
    destination: &'a PathBuf,
    present: bool,
}

#[derive(Debug, Serialize)]
struct PlanReport<'a> {
    sources: &'a [SourceDiscovery],
    tasks: Vec<PlannedTask<'a>>,
}

/// Print the plan of a dry run.
pub fn print_plan(plan: &RunPlan, json: bool) -> anyhow::Result<()> {
    if json {
        let report = PlanReport {
            sources: &plan.sources,
            tasks: plan
                .tasks
                .iter()
                .map(|t| PlannedTask {
                    label: t.entry.label(),
                    url: &t.entry.url,
                    destination: &t.destination,
                    present: t.is_present(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for task in &plan.tasks {
        let marker = if task.is_present() {
            style("=").dim()
        } else {
            style("+").green()
        };
        println!("{} {}  {}", marker, task.destination.display(), style(&task.entry.url).dim());
    }
    print_discovery(&plan.sources);
    println!(
        "{} {} planned, {} already present",
        style("→").cyan(),
        plan.tasks.len(),
        plan.present()
    );
    Ok(())
}

/// One line per source with what discovery found.
pub fn print_discovery(sources: &[SourceDiscovery]) {
    for source in sources {
        let failed = if source.pages_failed > 0 {
            style(format!(", {} pages failed", source.pages_failed))
                .yellow()
                .to_string()
        } else {
            String::new()
        };
        println!(
            "{} {}: {} dictionaries from {} pages{}",
            style("✓").green(),
            source.source,
            source.entries,
            source.pages_fetched,
            failed
        );
    }
}

/// Print the end-of-run summary.
pub fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "{} Downloaded {} dictionaries ({})",
        style("✓").green(),
        summary.succeeded,
        format_size(summary.bytes)
    );
    if summary.skipped > 0 {
        println!(
            "  {} {} already present",
            style("→").dim(),
            summary.skipped
        );
    }
    if summary.failed > 0 {
        println!("  {} {} failed:", style("✗").red(), summary.failed);
        for failure in &summary.failures {
            println!(
                "    {} {}: {}",
                style("-").red(),
                failure.label,
                style(&failure.reason).dim()
            );
        }
    }
    if summary.requests > 0 {
        println!(
            "  {}",
            style(format!(
                "{} requests, at most {} in flight",
                summary.requests, summary.peak_in_flight
            ))
            .dim()
        );
    }
    if summary.interrupted {
        println!("{} Interrupted before all downloads finished", style("!").yellow());
    }
    Ok(())
}
