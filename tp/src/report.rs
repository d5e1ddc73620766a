//! Terminal rendering of plans, verdicts and recommendations

use std::fmt::Write;

use colored::Colorize;

use crate::agent::AgentRun;
use crate::state::{PlanState, RecommendationState};
use crate::validation::{IssueSeverity, ReflectionResult, ValidationIssue};

fn severity_label(severity: IssueSeverity) -> String {
    match severity {
        IssueSeverity::Critical => severity.as_str().red().bold().to_string(),
        IssueSeverity::Warning => severity.as_str().yellow().to_string(),
        IssueSeverity::Suggestion => severity.as_str().cyan().to_string(),
    }
}

fn issue_line(issue: &ValidationIssue) -> String {
    let mut line = format!("  [{}] {}: {}", severity_label(issue.severity), issue.category, issue.message);
    if let Some(day) = issue.day_number {
        let _ = write!(line, " (day {})", day);
    }
    if !issue.suggestion.is_empty() {
        let _ = write!(line, "\n      {} {}", "->".dimmed(), issue.suggestion);
    }
    for detail in &issue.details {
        let _ = write!(line, "\n      {}", detail.dimmed());
    }
    line
}

/// Verdict with every issue, critical first
pub fn render_validation(result: &ReflectionResult) -> String {
    let verdict = if result.approved {
        "APPROVED".green().bold()
    } else {
        "REJECTED".red().bold()
    };
    let mut out = format!(
        "{} ({} critical, {} warnings, {} suggestions)\n",
        verdict, result.critical_count, result.warning_count, result.suggestion_count
    );
    for issue in &result.issues {
        out.push_str(&issue_line(issue));
        out.push('\n');
    }
    out
}

/// Day-by-day itinerary with budget and verdict
pub fn render_plan(state: &PlanState) -> String {
    let mut out = format!(
        "{} {} ({} days, budget ${:.2}, party of {})\n",
        "Trip to".bold(),
        state.destination_context().bright_cyan().bold(),
        state.duration_days,
        state.budget,
        state.party_size
    );

    if state.itinerary.is_empty() {
        out.push_str(&format!("{}\n", "No itinerary was generated.".dimmed()));
    }
    for day in &state.itinerary {
        let date = day.date.map(|d| format!(" {}", d)).unwrap_or_default();
        let _ = writeln!(out, "\n{}{}: {}", format!("Day {}", day.day_number).yellow().bold(), date, day.theme);
        for activity in &day.activities {
            let time = activity.start_time.as_deref().unwrap_or("--:--");
            let cost = activity
                .estimated_cost
                .map(|c| format!(" ${:.2}", c))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {} {} [{}]{}",
                time.dimmed(),
                activity.name,
                activity.activity_type,
                cost.green()
            );
        }
    }

    if let Some(check) = &state.budget_check {
        let line = format!("Total ${:.2} of ${:.2}", check.total_cost, check.budget);
        let line = if check.within_budget { line.green() } else { line.red() };
        let _ = writeln!(out, "\n{}", line);
    }
    if let Some(validation) = &state.validation {
        let _ = write!(out, "\nReflections: {}\n{}", state.reflection_count, render_validation(validation));
    }
    if !state.progress.errors.is_empty() {
        let _ = writeln!(out, "\n{}", "Errors:".red());
        for error in &state.progress.errors {
            let _ = writeln!(out, "  {}", error);
        }
    }
    out
}

pub fn render_recommendations(state: &RecommendationState) -> String {
    if state.recommendations.is_empty() {
        return format!("{}\n", "No destinations to recommend.".dimmed());
    }
    let mut out = String::new();
    for (i, candidate) in state.recommendations.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {}, {}",
            i + 1,
            candidate.name.bright_cyan().bold(),
            candidate.country
        );
        if !candidate.description.is_empty() {
            let _ = writeln!(out, "   {}", candidate.description);
        }
        if let Some(reason) = &candidate.reason {
            let _ = writeln!(out, "   {}", reason.dimmed());
        }
    }
    out
}

pub fn render_agent_run(run: &AgentRun) -> String {
    let mut out = String::new();
    for step in &run.state.metadata.react_history {
        let marker = if step.success { "✓".green() } else { "✗".red() };
        let _ = writeln!(out, "{} {} {}", marker, format!("[{}]", step.iteration).dimmed(), step.action.yellow());
        let _ = writeln!(out, "    {}", step.observation);
    }
    let _ = writeln!(
        out,
        "\n{} ({}, {} iterations)",
        run.summary(),
        run.termination.as_str(),
        run.iterations
    );
    if run.state.has_itinerary() {
        out.push('\n');
        out.push_str(&render_plan(&run.state));
    }
    out
}
