//! Workflow domain: definitions, instances, and the persistence contract.

pub mod definition;
pub mod instance;
pub mod repository;

pub use definition::{
    StateKind, StateSpec, TransitionSpec, TransitionValue, WorkflowDefinition, WorkflowDocument,
};
pub use instance::{Suspension, WorkflowInstance};
pub use repository::{InstanceFilter, WorkflowRepository};
