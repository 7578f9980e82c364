//! Result reporter - overall verdict and the human-readable summary

use crate::core::{MatrixResult, PipelineResult, Verdict};
use std::fmt::Write;
use std::time::Duration;

/// Lines of output shown for a failing command
pub const OUTPUT_TAIL_LINES: usize = 10;

/// Derive the overall verdict and a plain-text report from a matrix run
///
/// The verdict is `Success` iff every pipeline succeeded. The report has one
/// block per pipeline in matrix order and a final `Result:` line.
pub fn summarize(result: &MatrixResult) -> (Verdict, String) {
    let verdict = if result.pipelines.iter().all(PipelineResult::is_success) {
        Verdict::Success
    } else {
        Verdict::Failed
    };

    let mut report = String::new();
    for pipeline in &result.pipelines {
        write_pipeline(&mut report, pipeline);
    }

    if result.cancelled {
        report.push_str("Run cancelled\n");
    }
    let _ = writeln!(
        report,
        "Result: {} ({} passed, {} failed, {} errored)",
        verdict_label(verdict),
        result.count(Verdict::Success),
        result.count(Verdict::Failed),
        result.count(Verdict::Errored)
    );

    (verdict, report)
}

fn write_pipeline(report: &mut String, pipeline: &PipelineResult) {
    let _ = writeln!(
        report,
        "{} {}/{} ({})",
        verdict_label(pipeline.verdict),
        pipeline.group,
        pipeline.name,
        format_duration(pipeline.duration)
    );

    if let Some(failure) = pipeline.first_failure() {
        let _ = writeln!(report, "  command: {}", failure.command);
        if failure.timed_out {
            report.push_str("  timed out\n");
        } else {
            let _ = writeln!(report, "  exit status: {}", failure.exit_code);
        }
        for line in failure.output_tail(OUTPUT_TAIL_LINES) {
            let _ = writeln!(report, "    {}", line);
        }
    }

    if let Some(error) = &pipeline.error {
        let _ = writeln!(report, "  error: {}", error);
    }
}

pub fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Success => "SUCCESS",
        Verdict::Failed => "FAILED",
        Verdict::Errored => "ERRORED",
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
