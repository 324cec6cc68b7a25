// SPDX-License-Identifier: MIT

//! Explicit state machine over the pipeline steps

mod executor;
mod machine;

pub use executor::GraphRunner;
pub use machine::{transition, Node};
