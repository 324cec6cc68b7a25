// SPDX-License-Identifier: MIT

//! Progress events emitted while a run executes

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::types::{ExecutionMode, Step, WorkflowResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    RunStarted {
        mode: ExecutionMode,
        start_time: String,
    },
    StepStarted {
        step: Step,
    },
    StepCompleted {
        step: Step,
        duration_ms: u64,
    },
    StepFailed {
        step: Step,
        error: String,
    },
    RetryScheduled {
        step: Step,
        attempt: u32,
    },
    RunFinished {
        result: Box<WorkflowResult>,
    },
}

/// Optional event channel; a closed or absent receiver is ignored
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl EventEmitter {
    pub fn new(tx: Option<mpsc::Sender<WorkflowEvent>>) -> Self {
        Self { tx }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub async fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}
