// SPDX-License-Identifier: MIT

use crate::kit::Result;

use super::state::WorkflowState;
use super::steps::StepExecutor;
use super::types::{Step, StepStatus};

/// Walk the pipeline in order; the first failing step aborts the run
pub async fn run(executor: &StepExecutor<'_>, state: &mut WorkflowState) -> Result<()> {
    for step in Step::PIPELINE {
        executor.execute(step, state).await?;
    }
    state.set_status(StepStatus::Completed);
    Ok(())
}
