//! Workflow persistence contract.
//!
//! The engine only requires this abstract contract; concrete storage
//! adapters (files, databases, remote APIs) live outside this repository.

use super::instance::{Suspension, WorkflowInstance};
use crate::error::Result;
use async_trait::async_trait;

/// Filter for instance lookups. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceFilter {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub is_active: Option<bool>,
    pub suspension: Option<Suspension>,
}

impl InstanceFilter {
    /// Filter scoped to one user.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn suspended(mut self, suspension: Suspension) -> Self {
        self.suspension = Some(suspension);
        self
    }

    /// Whether the given instance matches every set field.
    pub fn matches(&self, instance: &WorkflowInstance) -> bool {
        self.id.as_deref().is_none_or(|id| id == instance.id)
            && self
                .user_id
                .as_deref()
                .is_none_or(|user| user == instance.user_id)
            && self.is_active.is_none_or(|a| a == instance.is_active)
            && self.suspension.is_none_or(|s| s == instance.suspension)
    }
}

/// An abstract repository for persisting workflow instances.
///
/// Implementations are storage-specific; the engine persists an instance
/// after every transition through this trait.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Inserts or replaces an instance by id.
    async fn upsert(&self, instance: &WorkflowInstance) -> Result<()>;

    /// Returns all instances matching the filter.
    async fn find(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>>;

    /// Deletes an instance by id (no error when absent).
    async fn delete(&self, id: &str) -> Result<()>;

    /// Deletes all instances belonging to a user.
    async fn delete_for_user(&self, user_id: &str) -> Result<()>;
}
