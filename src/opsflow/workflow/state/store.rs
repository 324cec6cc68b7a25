// SPDX-License-Identifier: MIT

//! Runtime state threaded through a single workflow run

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::opsflow::workflow::types::{now_iso, Step, StepResult, StepStatus};

/// One entry in the append-only error list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub step: Step,
    pub message: String,
}

/// Run metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub start_time: String,
    pub last_update: String,
}

/// Mutable aggregate for one run. Created fresh per run, discarded after
/// the metrics push.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    agent_status: BTreeMap<Step, StepStatus>,
    results: BTreeMap<Step, StepResult>,
    errors: Vec<StepError>,
    metadata: StateMetadata,
    /// Run-level status
    status: StepStatus,
    /// Component that last failed
    component: Option<Step>,
    retry_count: u32,
    final_error: Option<String>,
}

impl WorkflowState {
    /// Fresh state: every step pending, run running
    pub fn new() -> Self {
        let now = now_iso();
        Self {
            agent_status: Step::PIPELINE
                .iter()
                .map(|s| (*s, StepStatus::Pending))
                .collect(),
            results: BTreeMap::new(),
            errors: Vec::new(),
            metadata: StateMetadata {
                start_time: now.clone(),
                last_update: now,
            },
            status: StepStatus::Running,
            component: None,
            retry_count: 0,
            final_error: None,
        }
    }

    /// Status of a step
    pub fn status_of(&self, step: Step) -> StepStatus {
        self.agent_status.get(&step).copied().unwrap_or_default()
    }

    /// Set a step's status
    pub fn mark(&mut self, step: Step, status: StepStatus) {
        self.agent_status.insert(step, status);
        self.touch();
    }

    /// Store a step's result. A step that recovers after a retry clears the
    /// run-level error status it caused.
    pub fn record_result(&mut self, step: Step, result: StepResult) {
        self.agent_status.insert(step, result.status);
        self.results.insert(step, result);
        if self.component == Some(step)
            && matches!(self.status, StepStatus::Error | StepStatus::Retry)
        {
            self.status = StepStatus::Running;
        }
        self.touch();
    }

    /// Mark a step as errored and append to the error list
    pub fn record_error(&mut self, step: Step, message: impl Into<String>) {
        self.agent_status.insert(step, StepStatus::Error);
        self.errors.push(StepError {
            step,
            message: message.into(),
        });
        self.status = StepStatus::Error;
        self.component = Some(step);
        self.touch();
    }

    pub fn result(&self, step: Step) -> Option<&StepResult> {
        self.results.get(&step)
    }

    /// A step's data payload, or `{}` when it has none
    pub fn data(&self, step: Step) -> Value {
        self.results
            .get(&step)
            .map(StepResult::data_or_empty)
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    pub fn errors(&self) -> &[StepError] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&StepError> {
        self.errors.last()
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn set_status(&mut self, status: StepStatus) {
        self.status = status;
        self.touch();
    }

    pub fn component(&self) -> Option<Step> {
        self.component
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Bump the retry counter, returning the new value
    pub fn increment_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.touch();
        self.retry_count
    }

    pub fn final_error(&self) -> Option<&str> {
        self.final_error.as_deref()
    }

    pub fn set_final_error(&mut self, message: impl Into<String>) {
        self.final_error = Some(message.into());
        self.touch();
    }

    pub fn metadata(&self) -> &StateMetadata {
        &self.metadata
    }

    /// The step currently marked running, if any
    pub fn running_step(&self) -> Option<Step> {
        self.agent_status
            .iter()
            .find(|(_, status)| **status == StepStatus::Running)
            .map(|(step, _)| *step)
    }

    /// Convert state to a JSON object
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn touch(&mut self) {
        self.metadata.last_update = now_iso();
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}
