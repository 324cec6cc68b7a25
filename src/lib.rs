// SPDX-License-Identifier: MIT

//! Workflow coordination for monitoring and alerting automation.
//!
//! - [`kit`] holds the collaborator `Tool` trait and error types
//! - [`opsflow`] holds the coordinator, its tools, metrics, scheduler and
//!   HTTP surface

pub mod kit;
pub mod opsflow;
