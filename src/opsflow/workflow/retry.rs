// SPDX-License-Identifier: MIT

//! Retry/failure policy applied by the graph error handler

use super::state::WorkflowState;
use super::types::StepStatus;

/// Maximum error occurrences tolerated per run
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Count the pending error against the run's budget.
    ///
    /// Returns `Retry` while the counter is below the ceiling, otherwise
    /// `Failed` with a terminal message naming the component.
    pub fn handle_error(&self, state: &mut WorkflowState) -> StepStatus {
        let component = state.component();
        let component_name = component.map(|s| s.as_str()).unwrap_or("unknown");
        let message = state
            .last_error()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string());

        log::error!("Error in {}: {}", component_name, message);

        let attempts = state.increment_retry();
        if attempts < self.max_retries {
            log::info!("Attempting retry {} for {}", attempts, component_name);
            if let Some(step) = component {
                state.mark(step, StepStatus::Retry);
            }
            state.set_status(StepStatus::Retry);
            return StepStatus::Retry;
        }

        if let Some(step) = component {
            state.mark(step, StepStatus::Failed);
        }
        state.set_status(StepStatus::Failed);
        state.set_final_error(format!(
            "Component {} failed after {} retries: {}",
            component_name, self.max_retries, message
        ));
        StepStatus::Failed
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opsflow::workflow::types::Step;

    #[test]
    fn test_ceiling_after_three_errors() {
        let policy = RetryPolicy::default();
        let mut state = WorkflowState::new();

        state.record_error(Step::Monitoring, "connection refused");
        assert_eq!(policy.handle_error(&mut state), StepStatus::Retry);
        assert_eq!(state.status_of(Step::Monitoring), StepStatus::Retry);

        state.record_error(Step::Monitoring, "connection refused");
        assert_eq!(policy.handle_error(&mut state), StepStatus::Retry);

        state.record_error(Step::Monitoring, "connection refused");
        assert_eq!(policy.handle_error(&mut state), StepStatus::Failed);

        assert_eq!(state.status(), StepStatus::Failed);
        assert_eq!(state.status_of(Step::Monitoring), StepStatus::Failed);
        let final_error = state.final_error().unwrap();
        assert!(final_error.contains("3 retries"));
        assert!(final_error.contains("monitoring"));
        assert!(final_error.contains("connection refused"));
    }

    #[test]
    fn test_unknown_component() {
        let policy = RetryPolicy::new(1);
        let mut state = WorkflowState::new();

        assert_eq!(policy.handle_error(&mut state), StepStatus::Failed);
        assert_eq!(
            state.final_error(),
            Some("Component unknown failed after 1 retries: Unknown error")
        );
    }
}
