// SPDX-License-Identifier: MIT

//! Core workflow types: steps, statuses, per-step results and the final
//! aggregated run result.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::kit::{OpsflowError, WorkflowError};

use super::state::{StepError, WorkflowState};

/// One discrete unit of work in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    LogAnalysis,
    Monitoring,
    Analytics,
    Reporting,
}

impl Step {
    /// Steps in pipeline order
    pub const PIPELINE: [Step; 4] = [
        Step::LogAnalysis,
        Step::Monitoring,
        Step::Analytics,
        Step::Reporting,
    ];

    /// Wire name, also used as the `step` metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::LogAnalysis => "log_analysis",
            Step::Monitoring => "monitoring",
            Step::Analytics => "analytics",
            Step::Reporting => "reporting",
        }
    }

    /// Human-readable name for log lines
    pub fn label(&self) -> &'static str {
        match self {
            Step::LogAnalysis => "Log analysis",
            Step::Monitoring => "Monitoring",
            Step::Analytics => "Analytics",
            Step::Reporting => "Reporting",
        }
    }

    /// The step that follows this one, if any
    pub fn next(self) -> Option<Step> {
        match self {
            Step::LogAnalysis => Some(Step::Monitoring),
            Step::Monitoring => Some(Step::Analytics),
            Step::Analytics => Some(Step::Reporting),
            Step::Reporting => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a step, or of the run as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
    Failed,
    Retry,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
            StepStatus::Failed => "failed",
            StepStatus::Retry => "retry",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// How the pipeline is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Plain call chain; the first failing step aborts the run
    #[default]
    Sequential,
    /// State machine with an error-handler node and retry accounting
    Graph,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("sequential"),
            ExecutionMode::Graph => f.write_str("graph"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = OpsflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "graph" => Ok(ExecutionMode::Graph),
            other => Err(WorkflowError::InvalidExecutionMode(other.to_string()).into()),
        }
    }
}

/// Output of a single step, folded into the workflow state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_path: Option<String>,
}

impl StepResult {
    /// A completed step carrying a data payload
    pub fn completed(data: Value) -> Self {
        Self {
            status: StepStatus::Completed,
            timestamp: now_iso(),
            data: Some(data),
            error: None,
            file_path: None,
            s3_path: None,
        }
    }

    /// A completed step with no payload
    pub fn completed_empty() -> Self {
        Self {
            data: None,
            ..Self::completed(Value::Null)
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_s3_path(mut self, path: impl Into<String>) -> Self {
        self.s3_path = Some(path.into());
        self
    }

    /// The payload, or an empty object when the step produced none
    pub fn data_or_empty(&self) -> Value {
        self.data
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// Final aggregated result of one `run_workflow()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub status: RunStatus,
    pub mode: ExecutionMode,
    pub start_time: String,
    pub end_time: String,
    pub timestamp: String,
    /// Wall-clock seconds
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_analysis: Option<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting: Option<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StepError>,
    pub retry_count: u32,
}

impl WorkflowResult {
    /// Build the result from the final state of a run
    pub fn from_state(
        state: &WorkflowState,
        mode: ExecutionMode,
        duration: f64,
        error: Option<String>,
    ) -> Self {
        let end_time = now_iso();
        Self {
            status: if error.is_none() {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            },
            mode,
            start_time: state.metadata().start_time.clone(),
            timestamp: end_time.clone(),
            end_time,
            duration,
            log_analysis: state.result(Step::LogAnalysis).cloned(),
            monitoring: state.result(Step::Monitoring).cloned(),
            analytics: state.result(Step::Analytics).cloned(),
            reporting: state.result(Step::Reporting).cloned(),
            error,
            errors: state.errors().to_vec(),
            retry_count: state.retry_count(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Sub-result for a given step
    pub fn step(&self, step: Step) -> Option<&StepResult> {
        match step {
            Step::LogAnalysis => self.log_analysis.as_ref(),
            Step::Monitoring => self.monitoring.as_ref(),
            Step::Analytics => self.analytics.as_ref(),
            Step::Reporting => self.reporting.as_ref(),
        }
    }
}

/// Local time in ISO-8601 with microseconds
pub fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Compact local timestamp used in report file names
pub fn now_compact() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}
