// SPDX-License-Identifier: MIT

pub mod coordinator;
pub mod events;
pub mod graph;
pub mod retry;
pub mod sequential;
pub mod state;
pub mod steps;
pub mod types;

pub use coordinator::WorkflowCoordinator;
pub use events::{EventEmitter, WorkflowEvent};
pub use retry::{RetryPolicy, MAX_RETRIES};
pub use state::WorkflowState;
pub use types::{ExecutionMode, RunStatus, Step, StepResult, StepStatus, WorkflowResult};
