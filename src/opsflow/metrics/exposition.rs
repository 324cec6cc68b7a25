// SPDX-License-Identifier: MIT

//! Prometheus text exposition format (version 0.0.4)

use std::fmt::Write;

use super::{MetricsSnapshot, STEP_DURATION_BUCKETS};

/// Render a snapshot as a Pushgateway-ready payload
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    header(
        &mut out,
        "workflow_total_executions",
        "Total number of workflow executions",
        "counter",
    );
    let _ = writeln!(out, "workflow_total_executions {}", snapshot.total_executions);

    header(
        &mut out,
        "workflow_failures_total",
        "Total number of workflow failures",
        "counter",
    );
    let _ = writeln!(out, "workflow_failures_total {}", snapshot.failures_total);

    header(
        &mut out,
        "workflow_step_failures_total",
        "Step-specific failures",
        "counter",
    );
    for (step, count) in &snapshot.step_failures {
        let _ = writeln!(
            out,
            "workflow_step_failures_total{{step=\"{}\"}} {}",
            step, count
        );
    }

    header(
        &mut out,
        "workflow_step_duration_seconds",
        "Time spent in each workflow step",
        "histogram",
    );
    for (step, hist) in &snapshot.step_durations {
        for (bound, count) in STEP_DURATION_BUCKETS.iter().zip(&hist.buckets) {
            let _ = writeln!(
                out,
                "workflow_step_duration_seconds_bucket{{step=\"{}\",le=\"{:?}\"}} {}",
                step, bound, count
            );
        }
        let _ = writeln!(
            out,
            "workflow_step_duration_seconds_bucket{{step=\"{}\",le=\"+Inf\"}} {}",
            step, hist.count
        );
        let _ = writeln!(
            out,
            "workflow_step_duration_seconds_sum{{step=\"{}\"}} {}",
            step, hist.sum
        );
        let _ = writeln!(
            out,
            "workflow_step_duration_seconds_count{{step=\"{}\"}} {}",
            step, hist.count
        );
    }

    header(
        &mut out,
        "workflow_last_success_timestamp",
        "Timestamp of last successful workflow execution",
        "gauge",
    );
    let _ = writeln!(
        out,
        "workflow_last_success_timestamp {}",
        snapshot.last_success_timestamp.unwrap_or(0.0)
    );

    header(
        &mut out,
        "workflow_last_failure_timestamp",
        "Timestamp of last workflow failure",
        "gauge",
    );
    let _ = writeln!(
        out,
        "workflow_last_failure_timestamp {}",
        snapshot.last_failure_timestamp.unwrap_or(0.0)
    );

    out
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}
