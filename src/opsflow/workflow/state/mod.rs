// SPDX-License-Identifier: MIT

//! State management for workflow runs
//!
//! This module provides:
//! - `WorkflowState` - per-run step statuses, results, errors and metadata
//! - `StepError` - one entry of the append-only error list

mod store;

pub use store::{StateMetadata, StepError, WorkflowState};
