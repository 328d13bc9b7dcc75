//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::error::DeployError;
use crate::orchestrator::{RunOutcome, RunReport};
use crate::planner::{ExecutionPlan, PlanStep};
use crate::prerequisites::PrerequisiteReport;
use crate::record::{DeploymentRecord, StepResult};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan step row for table display.
#[derive(Tabled)]
struct PlanStepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    name: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Share")]
    share: String,
}

/// Step result row for table display.
#[derive(Tabled)]
struct StepResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an execution plan for display.
    ///
    /// Lists every step's name, amount, target and share of total supply.
    #[must_use]
    pub fn format_plan(&self, plan: &ExecutionPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ExecutionPlan) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\n📋 {} plan for {} on {}",
            plan.action,
            plan.symbol,
            plan.network.bold()
        );
        let _ = writeln!(output, "   Failure policy: {}\n", plan.failure_policy());

        let rows: Vec<PlanStepRow> = plan
            .steps
            .iter()
            .map(|s| PlanStepRow {
                index: s.index + 1,
                name: s.name.clone(),
                amount: Self::format_amount(s),
                target: s.target.clone(),
                share: s
                    .percentage()
                    .map_or_else(|| String::from("-"), |pct| format!("{pct}%")),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let total = plan.total_amount();
        if total > 0 {
            let _ = writeln!(
                output,
                "\nTotal: {} of {} {}",
                total.to_string().green(),
                plan.total_supply,
                plan.symbol
            );
        }
        if plan.unallocated > 0 {
            let _ = writeln!(
                output,
                "{} Unallocated: {} {}",
                "⚠".yellow(),
                plan.unallocated,
                plan.symbol
            );
        }

        output
    }

    /// Formats the outcome of a run.
    #[must_use]
    pub fn format_outcome(&self, outcome: &RunOutcome) -> String {
        match outcome {
            RunOutcome::DryRun(plan) => self.format_plan(plan),
            RunOutcome::Executed(report) => self.format_report(report),
        }
    }

    /// Formats an executed run.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ReportJson::from(report)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats an executed run as text.
    fn format_report_text(report: &RunReport) -> String {
        let record = &report.record;
        let mut output = Self::format_prerequisites_text(&report.prerequisites);

        let status = if record.cancelled {
            format!("{} {} cancelled on {}", "⚠".yellow(), record.action, record.network)
        } else if report.is_success() && record.is_complete_success() {
            format!("{} {} completed on {}", "✓".green(), record.action, record.network)
        } else if report.is_success() {
            format!(
                "{} {} completed with failures on {}",
                "⚠".yellow(),
                record.action,
                record.network
            )
        } else {
            format!("{} {} failed on {}", "✗".red(), record.action, record.network)
        };
        let _ = writeln!(output, "\n{status}\n");

        let rows: Vec<StepResultRow> = record.results.iter().map(Self::result_row).collect();
        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = writeln!(output, "\n   {}", record.summary);
        let _ = writeln!(
            output,
            "   Tokens delivered: {} of {}",
            record.summary.tokens_delivered, record.summary.tokens_planned
        );
        if let Some(mint) = &record.mint {
            let _ = writeln!(output, "   Mint: {mint}");
        }
        match &report.record_path {
            Some(path) => {
                let _ = writeln!(output, "   Record: {}", path.display());
            }
            None => {
                let _ = writeln!(output, "   Record: {}", "not persisted".red());
            }
        }

        output
    }

    /// Formats the passed prerequisite checks as text.
    fn format_prerequisites_text(report: &PrerequisiteReport) -> String {
        let mut output = String::from("\n🔎 Prerequisites\n");
        for check in &report.checks {
            let _ = writeln!(output, "   {} {}: {}", "✓".green(), check.name, check.detail);
        }
        output
    }

    /// Builds a table row for one step result.
    fn result_row(result: &StepResult) -> StepResultRow {
        let (status, detail) = if result.success {
            let detail = result
                .address
                .as_deref()
                .or(result.signature.as_deref())
                .map_or_else(String::new, |s| Self::truncate(s, 24));
            ("ok".green().to_string(), detail)
        } else {
            let detail = result.error.as_deref().unwrap_or_default();
            ("failed".red().to_string(), Self::truncate(detail, 60))
        };

        StepResultRow {
            index: result.index + 1,
            name: result.name.clone(),
            status,
            amount: if result.amount > 0 {
                result.amount.to_string()
            } else {
                String::from("-")
            },
            detail,
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ValidationJson::new(result, show_warnings))
                    .unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output = format!(
                        "{} Configuration has {} error(s)\n",
                        "✗".red(),
                        result.errors.len()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats a fatal error as a single line.
    #[must_use]
    pub fn format_error(&self, error: &DeployError) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": error.to_string() });
                serde_json::to_string(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} Error: {error}", "✗".red()),
        }
    }

    /// Formats a step amount.
    fn format_amount(step: &PlanStep) -> String {
        if step.amount > 0 {
            step.amount.to_string()
        } else {
            String::from("-")
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson<'a> {
    action: String,
    network: &'a str,
    symbol: &'a str,
    failure_policy: String,
    total_supply: u64,
    total_amount: u64,
    unallocated: u64,
    steps: Vec<StepJson<'a>>,
}

#[derive(Serialize)]
struct StepJson<'a> {
    index: usize,
    name: &'a str,
    amount: u64,
    target: &'a str,
    percentage: Option<String>,
}

impl<'a> From<&'a ExecutionPlan> for PlanJson<'a> {
    fn from(plan: &'a ExecutionPlan) -> Self {
        Self {
            action: plan.action.to_string(),
            network: &plan.network,
            symbol: &plan.symbol,
            failure_policy: plan.failure_policy().to_string(),
            total_supply: plan.total_supply,
            total_amount: plan.total_amount(),
            unallocated: plan.unallocated,
            steps: plan
                .steps
                .iter()
                .map(|s| StepJson {
                    index: s.index,
                    name: &s.name,
                    amount: s.amount,
                    target: &s.target,
                    percentage: s.percentage().map(|p| p.to_string()),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    success: bool,
    prerequisites: &'a PrerequisiteReport,
    record: &'a DeploymentRecord,
    record_path: Option<String>,
}

impl<'a> From<&'a RunReport> for ReportJson<'a> {
    fn from(report: &'a RunReport) -> Self {
        Self {
            success: report.is_success(),
            prerequisites: &report.prerequisites,
            record: &report.record,
            record_path: report.record_path.as_ref().map(|p| p.display().to_string()),
        }
    }
}

#[derive(Serialize)]
struct ValidationJson {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationJson {
    fn new(result: &ValidationResult, show_warnings: bool) -> Self {
        Self {
            valid: result.is_valid(),
            errors: result.errors.iter().map(ToString::to_string).collect(),
            warnings: if show_warnings {
                result.warnings.clone()
            } else {
                Vec::new()
            },
        }
    }
}
