//! Workflow runtime: the state machine core and its orchestration service.

pub mod machine;
pub mod service;

pub use machine::{Execution, Machine, evaluate_expression, is_affirmative, render};
pub use service::WorkflowService;
