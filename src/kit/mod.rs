// SPDX-License-Identifier: MIT

//! Shared building blocks: the collaborator `Tool` trait and the error types.

pub mod error;
pub mod tool;

pub use error::{OpsflowError, Result, StorageError, WorkflowError};
pub use tool::Tool;
