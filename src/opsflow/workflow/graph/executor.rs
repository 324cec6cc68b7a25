// SPDX-License-Identifier: MIT

//! Graph workflow executor

use crate::kit::{Result, WorkflowError};
use crate::opsflow::workflow::events::WorkflowEvent;
use crate::opsflow::workflow::retry::RetryPolicy;
use crate::opsflow::workflow::state::WorkflowState;
use crate::opsflow::workflow::steps::StepExecutor;
use crate::opsflow::workflow::types::StepStatus;

use super::machine::{transition, Node};

/// Safety limit on node visits per run
const MAX_TRANSITIONS: usize = 64;

/// Drives the step state machine from `Node::ENTRY` to `Node::End`
pub struct GraphRunner {
    retry: RetryPolicy,
    retry_failed_steps: bool,
}

impl GraphRunner {
    pub fn new(retry: RetryPolicy, retry_failed_steps: bool) -> Self {
        Self {
            retry,
            retry_failed_steps,
        }
    }

    pub async fn run(&self, executor: &StepExecutor<'_>, state: &mut WorkflowState) -> Result<()> {
        let mut node = Node::ENTRY;

        for visit in 1..=MAX_TRANSITIONS {
            log::debug!("Graph visit {}: {}", visit, node);

            match node {
                Node::Step(step) => {
                    // Recorded in state; routing happens below
                    if let Err(e) = executor.execute(step, state).await {
                        log::debug!("{} routed to error handler: {}", step, e);
                    }
                }
                Node::ErrorHandler => {
                    let verdict = self.retry.handle_error(state);
                    if verdict == StepStatus::Retry && self.retry_failed_steps {
                        if let Some(step) = state.component() {
                            executor
                                .emit(WorkflowEvent::RetryScheduled {
                                    step,
                                    attempt: state.retry_count(),
                                })
                                .await;
                        }
                    }
                }
                Node::End => return self.finish(state),
            }

            node = transition(node, state, self.retry_failed_steps);
        }

        log::error!("Graph execution exceeded {} transitions", MAX_TRANSITIONS);
        Err(WorkflowError::StepFailed {
            component: node.to_string(),
            message: format!("exceeded {} transitions", MAX_TRANSITIONS),
        }
        .into())
    }

    /// Map the state at `End` to the run outcome
    fn finish(&self, state: &mut WorkflowState) -> Result<()> {
        let component = state
            .component()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let message = state
            .last_error()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string());

        match state.status() {
            StepStatus::Failed => Err(WorkflowError::RetriesExhausted {
                component,
                retries: self.retry.max_retries(),
                message,
            }
            .into()),
            StepStatus::Retry | StepStatus::Error => {
                Err(WorkflowError::StepFailed { component, message }.into())
            }
            _ => {
                state.set_status(StepStatus::Completed);
                Ok(())
            }
        }
    }
}
