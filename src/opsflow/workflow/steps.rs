// SPDX-License-Identifier: MIT

//! Per-step coordination: call the step's tools and turn their output into
//! a `StepResult`.

use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::kit::Result;
use crate::opsflow::config::CoordinatorConfig;
use crate::opsflow::metrics::{StepTimer, WorkflowMetrics};
use crate::opsflow::tools::storage::StorageCommand;
use crate::opsflow::tools::Toolset;

use super::events::{EventEmitter, WorkflowEvent};
use super::state::WorkflowState;
use super::types::{now_compact, Step, StepResult, StepStatus};

const LOG_ANALYSIS_COMMAND: &str = "Analyze logs to generate analytics report";

/// Runs one step at a time against a shared state
pub struct StepExecutor<'a> {
    config: &'a CoordinatorConfig,
    tools: &'a Toolset,
    metrics: &'a WorkflowMetrics,
    events: &'a EventEmitter,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        config: &'a CoordinatorConfig,
        tools: &'a Toolset,
        metrics: &'a WorkflowMetrics,
        events: &'a EventEmitter,
    ) -> Self {
        Self {
            config,
            tools,
            metrics,
            events,
        }
    }

    /// Run `step`, recording its result or error in `state`.
    ///
    /// The error is returned as well so the caller decides whether it aborts
    /// the run.
    pub async fn execute(&self, step: Step, state: &mut WorkflowState) -> Result<()> {
        log::info!("Starting {}", step.label().to_lowercase());
        state.mark(step, StepStatus::Running);
        self.emit(WorkflowEvent::StepStarted { step }).await;

        let timer = StepTimer::start(self.metrics, step);
        let outcome = match step {
            Step::LogAnalysis => self.coordinate_log_analysis().await,
            Step::Monitoring => self.coordinate_monitoring().await,
            Step::Analytics => self.coordinate_analytics(state).await,
            Step::Reporting => self.coordinate_reporting(state).await,
        };

        match outcome {
            Ok(result) => {
                let elapsed = timer.finish(false);
                state.record_result(step, result);
                log::info!("{} completed in {:.2}s", step.label(), elapsed.as_secs_f64());
                self.emit(WorkflowEvent::StepCompleted {
                    step,
                    duration_ms: duration_ms(elapsed),
                })
                .await;
                Ok(())
            }
            Err(e) => {
                timer.finish(true);
                let message = e.to_string();
                log::error!("Error in {}: {}", step.label().to_lowercase(), message);
                state.record_error(step, message.clone());
                self.emit(WorkflowEvent::StepFailed {
                    step,
                    error: message,
                })
                .await;
                Err(e)
            }
        }
    }

    pub async fn emit(&self, event: WorkflowEvent) {
        self.events.emit(event).await;
    }

    pub async fn coordinate_log_analysis(&self) -> Result<StepResult> {
        let raw = self.tools.logs.run(LOG_ANALYSIS_COMMAND).await?;
        let data: Value = serde_json::from_str(&raw)?;
        Ok(StepResult::completed(data))
    }

    pub async fn coordinate_monitoring(&self) -> Result<StepResult> {
        let mut metrics = Map::new();
        for named in &self.config.queries {
            log::debug!("Collecting {}", named.name);
            let raw = self.tools.prometheus.run(&named.query).await?;
            let value: Value = serde_json::from_str(&raw)?;
            metrics.insert(named.name.clone(), value);
        }
        Ok(StepResult::completed(Value::Object(metrics)))
    }

    /// Write the combined analysis file into the reports directory
    pub async fn coordinate_analytics(&self, state: &WorkflowState) -> Result<StepResult> {
        let reports_dir = &self.config.reports_dir;
        tokio::fs::create_dir_all(reports_dir).await?;

        let stamp = now_compact();
        let path = reports_dir.join(format!("analysis_{}.json", stamp));
        let report = json!({
            "timestamp": stamp,
            "log_analysis": state.data(Step::LogAnalysis),
            "monitoring": state.data(Step::Monitoring),
        });
        tokio::fs::write(&path, serde_json::to_string_pretty(&report)?).await?;
        log::info!("Analysis written to {}", path.display());

        Ok(StepResult::completed(report).with_file_path(path.display().to_string()))
    }

    /// Upload the analytics payload as a report object
    pub async fn coordinate_reporting(&self, state: &WorkflowState) -> Result<StepResult> {
        let content = serde_json::to_string(&state.data(Step::Analytics))?;
        let key = format!("reports/report_{}.json", now_compact());
        let bucket = self.config.s3_bucket.clone().unwrap_or_default();

        let command = StorageCommand::upload_to_s3(bucket, key.clone(), content)?;
        self.tools.storage.execute(&command).await?;

        Ok(StepResult::completed_empty().with_s3_path(key))
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
