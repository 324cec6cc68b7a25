// SPDX-License-Identifier: MIT

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::kit::{Result, WorkflowError};
use crate::opsflow::config::CoordinatorConfig;
use crate::opsflow::metrics::WorkflowMetrics;
use crate::opsflow::tools::Toolset;

use super::events::{EventEmitter, WorkflowEvent};
use super::graph::GraphRunner;
use super::retry::RetryPolicy;
use super::sequential;
use super::state::WorkflowState;
use super::steps::StepExecutor;
use super::types::{ExecutionMode, StepStatus, WorkflowResult};

/// Runs the log analysis → monitoring → analytics → reporting pipeline and
/// reports every run to the metrics sink.
pub struct WorkflowCoordinator {
    config: CoordinatorConfig,
    tools: Toolset,
    metrics: Arc<WorkflowMetrics>,
    retry: RetryPolicy,
    run_lock: Mutex<()>,
    last_result: RwLock<Option<WorkflowResult>>,
}

impl WorkflowCoordinator {
    pub fn new(config: CoordinatorConfig, tools: Toolset) -> Self {
        Self {
            config,
            tools,
            metrics: Arc::new(WorkflowMetrics::new()),
            retry: RetryPolicy::default(),
            run_lock: Mutex::new(()),
            last_result: RwLock::new(None),
        }
    }

    /// Coordinator backed by the production tools
    pub fn from_config(config: CoordinatorConfig) -> Result<Self> {
        let tools = Toolset::from_config(&config)?;
        Ok(Self::new(config, tools))
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<WorkflowMetrics> {
        &self.metrics
    }

    /// Result of the most recent finished run
    pub async fn last_result(&self) -> Option<WorkflowResult> {
        self.last_result.read().await.clone()
    }

    /// Apply the retry policy to the error pending in `state`
    pub fn handle_error(&self, state: &mut WorkflowState) -> StepStatus {
        self.retry.handle_error(state)
    }

    pub async fn run_workflow(&self) -> WorkflowResult {
        self.run_workflow_with_events(None).await
    }

    /// Run the pipeline once. Never fails: errors and panics inside a step
    /// end up in a `failed` result.
    pub async fn run_workflow_with_events(
        &self,
        events: Option<mpsc::Sender<WorkflowEvent>>,
    ) -> WorkflowResult {
        let _guard = self.run_lock.lock().await;
        let events = EventEmitter::new(events);
        let mode = self.config.mode;
        let started = Instant::now();
        let mut state = WorkflowState::new();

        log::info!(
            "Starting {} workflow at {}",
            mode,
            state.metadata().start_time
        );
        self.metrics.inc_executions();
        events
            .emit(WorkflowEvent::RunStarted {
                mode,
                start_time: state.metadata().start_time.clone(),
            })
            .await;

        let outcome = {
            let executor = StepExecutor::new(&self.config, &self.tools, &self.metrics, &events);
            AssertUnwindSafe(self.execute(&executor, &mut state))
                .catch_unwind()
                .await
        };

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => {
                let err = WorkflowError::Panicked(panic_message(panic.as_ref()));
                if let Some(step) = state.running_step() {
                    state.record_error(step, err.to_string());
                }
                Some(err.to_string())
            }
        };

        if error.is_some() {
            state.set_status(StepStatus::Failed);
            self.metrics.inc_failures();
            self.metrics.mark_failure();
        } else {
            self.metrics.mark_success();
        }

        log::debug!("Final state: {}", state.to_json());
        let result = WorkflowResult::from_state(
            &state,
            mode,
            started.elapsed().as_secs_f64(),
            error,
        );
        match &result.error {
            None => log::info!(
                "Workflow completed at {} in {:.2}s",
                result.end_time,
                result.duration
            ),
            Some(e) => log::error!("Workflow failed at {}: {}", result.end_time, e),
        }

        self.push_metrics().await;

        events
            .emit(WorkflowEvent::RunFinished {
                result: Box::new(result.clone()),
            })
            .await;
        *self.last_result.write().await = Some(result.clone());
        result
    }

    async fn execute(&self, executor: &StepExecutor<'_>, state: &mut WorkflowState) -> Result<()> {
        match self.config.mode {
            ExecutionMode::Sequential => sequential::run(executor, state).await,
            ExecutionMode::Graph => {
                GraphRunner::new(self.retry, self.config.retry_failed_steps)
                    .run(executor, state)
                    .await
            }
        }
    }

    async fn push_metrics(&self) {
        let payload = self.metrics.render();
        match self
            .tools
            .metrics_sink
            .push(&self.config.job_name, &payload)
            .await
        {
            Ok(()) => log::info!("Successfully pushed metrics to Pushgateway"),
            Err(e) => log::error!("Failed to push metrics: {}", e),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
