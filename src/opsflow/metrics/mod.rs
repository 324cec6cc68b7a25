// SPDX-License-Identifier: MIT

//! Workflow metrics registry
//!
//! Counters, a per-step duration histogram and last-outcome gauges,
//! accumulated for the lifetime of the coordinator and pushed to a
//! Pushgateway after every run.

mod exposition;
mod pushgateway;

pub use exposition::render;
pub use pushgateway::{MetricsSink, PushGateway};

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::opsflow::workflow::types::Step;

/// Upper bounds (seconds) of the step duration histogram
pub const STEP_DURATION_BUCKETS: [f64; 7] = [1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Cumulative histogram over `STEP_DURATION_BUCKETS`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// Observations `<=` each bound, same order as the bounds
    pub buckets: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

impl Histogram {
    fn observe(&mut self, value: f64) {
        for (slot, bound) in self.buckets.iter_mut().zip(STEP_DURATION_BUCKETS) {
            if value <= bound {
                *slot += 1;
            }
        }
        self.sum += value;
        self.count += 1;
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            buckets: vec![0; STEP_DURATION_BUCKETS.len()],
            sum: 0.0,
            count: 0,
        }
    }
}

/// Point-in-time copy of every metric
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_executions: u64,
    pub failures_total: u64,
    pub step_failures: BTreeMap<Step, u64>,
    pub step_durations: BTreeMap<Step, Histogram>,
    pub last_success_timestamp: Option<f64>,
    pub last_failure_timestamp: Option<f64>,
}

#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_executions(&self) {
        self.lock().total_executions += 1;
    }

    pub fn inc_failures(&self) {
        self.lock().failures_total += 1;
    }

    /// Record a step's duration, counting it as a step failure when `failed`
    pub fn observe_step(&self, step: Step, elapsed: Duration, failed: bool) {
        let mut inner = self.lock();
        inner
            .step_durations
            .entry(step)
            .or_default()
            .observe(elapsed.as_secs_f64());
        if failed {
            *inner.step_failures.entry(step).or_insert(0) += 1;
        }
    }

    pub fn mark_success(&self) {
        self.lock().last_success_timestamp = Some(unix_now());
    }

    pub fn mark_failure(&self) {
        self.lock().last_failure_timestamp = Some(unix_now());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    /// Render in the Prometheus text exposition format
    pub fn render(&self) -> String {
        render(&self.snapshot())
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Times one step; call `finish` with the step's outcome. A timer dropped
/// without `finish` (the step panicked) records a failure.
pub struct StepTimer<'a> {
    metrics: &'a WorkflowMetrics,
    step: Step,
    started: Instant,
    recorded: bool,
}

impl<'a> StepTimer<'a> {
    pub fn start(metrics: &'a WorkflowMetrics, step: Step) -> Self {
        Self {
            metrics,
            step,
            started: Instant::now(),
            recorded: false,
        }
    }

    pub fn finish(mut self, failed: bool) -> Duration {
        self.record(failed)
    }

    fn record(&mut self, failed: bool) -> Duration {
        let elapsed = self.started.elapsed();
        if !self.recorded {
            self.recorded = true;
            self.metrics.observe_step(self.step, elapsed, failed);
        }
        elapsed
    }
}

impl Drop for StepTimer<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.record(true);
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
