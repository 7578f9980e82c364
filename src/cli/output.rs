//! CLI output formatting

use crate::{
    core::{PipelineMatrix, Verdict},
    execution::RunnerEvent,
    report::{format_duration, verdict_label},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar counting finished pipelines
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("static progress template")
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a verdict for display
pub fn format_verdict(verdict: Verdict) -> String {
    let label = verdict_label(verdict);
    match verdict {
        Verdict::Success => style(label).green().to_string(),
        Verdict::Failed => style(label).red().to_string(),
        Verdict::Errored => style(label).yellow().to_string(),
    }
}

/// Format a runner event for display
pub fn format_runner_event(event: &RunnerEvent) -> String {
    match event {
        RunnerEvent::PipelineStarted { pipeline } => {
            format!("{} Starting {}", ROCKET, style(pipeline).bold())
        }
        RunnerEvent::EnvironmentAcquired {
            pipeline,
            step,
            image,
            environment_id,
        } => format!(
            "{} {} step {} in {} ({})",
            INFO,
            style(pipeline).cyan(),
            step + 1,
            style(image).bold(),
            style(environment_id).dim()
        ),
        RunnerEvent::CommandStarted { pipeline, command, .. } => {
            format!("{} {} $ {}", SPINNER, style(pipeline).cyan(), command)
        }
        RunnerEvent::CommandFinished {
            pipeline,
            command,
            exit_code,
            timed_out,
            duration,
            ..
        } => {
            if *timed_out {
                format!(
                    "{} {} $ {} {}",
                    WARN,
                    style(pipeline).cyan(),
                    command,
                    style(format!("timed out after {}", format_duration(*duration))).red()
                )
            } else if *exit_code == 0 {
                format!(
                    "{} {} $ {} {}",
                    CHECK,
                    style(pipeline).cyan(),
                    command,
                    style(format_duration(*duration)).dim()
                )
            } else {
                format!(
                    "{} {} $ {} {}",
                    CROSS,
                    style(pipeline).cyan(),
                    command,
                    style(format!("exit {}", exit_code)).red()
                )
            }
        }
        RunnerEvent::PipelineFinished {
            pipeline,
            verdict,
            duration,
        } => {
            let icon = if verdict.is_success() { CHECK } else { CROSS };
            format!(
                "{} {} {} ({})",
                icon,
                style(pipeline).bold(),
                format_verdict(*verdict),
                style(format_duration(*duration)).dim()
            )
        }
    }
}

/// Format the pipelines of a matrix, one per line, grouped
pub fn format_matrix(matrix: &PipelineMatrix) -> String {
    let mut lines = Vec::new();
    for group in matrix.groups() {
        lines.push(format!("{}", style(&group.name).bold()));
        for pipeline in &group.pipelines {
            let images: Vec<&str> = pipeline.steps.iter().map(|s| s.image.as_str()).collect();
            lines.push(format!(
                "  {} [{}] {} command(s)",
                style(&pipeline.name).cyan(),
                images.join(", "),
                pipeline.command_count()
            ));
        }
    }
    lines.join("\n")
}

/// A horizontal rule as wide as the terminal
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80)
        .min(100);
    style("─".repeat(width)).dim().to_string()
}
