// SPDX-License-Identifier: MIT

pub mod config;
pub mod metrics;
pub mod scheduler;
pub mod server;
pub mod tools;
pub mod workflow;
