// SPDX-License-Identifier: MIT

use std::fmt;

use crate::opsflow::workflow::state::WorkflowState;
use crate::opsflow::workflow::types::{Step, StepStatus};

/// Node of the workflow state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Step(Step),
    ErrorHandler,
    End,
}

impl Node {
    pub const ENTRY: Node = Node::Step(Step::LogAnalysis);

    pub fn is_terminal(&self) -> bool {
        matches!(self, Node::End)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Step(step) => write!(f, "{}", step),
            Node::ErrorHandler => f.write_str("error_handler"),
            Node::End => f.write_str("end"),
        }
    }
}

/// Next node after `node` has run against `state`.
///
/// A step in `error` goes to the error handler, otherwise to the next step
/// (or `End` after reporting). The error handler ends the run unless
/// `retry_failed_steps` is set and the verdict was `retry`, in which case
/// the failed step runs again.
pub fn transition(node: Node, state: &WorkflowState, retry_failed_steps: bool) -> Node {
    match node {
        Node::Step(step) => {
            if state.status_of(step) == StepStatus::Error {
                Node::ErrorHandler
            } else {
                step.next().map(Node::Step).unwrap_or(Node::End)
            }
        }
        Node::ErrorHandler => {
            if retry_failed_steps && state.status() == StepStatus::Retry {
                state.component().map(Node::Step).unwrap_or(Node::End)
            } else {
                Node::End
            }
        }
        Node::End => Node::End,
    }
}
