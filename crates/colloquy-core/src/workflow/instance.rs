//! Workflow instances: the persisted runtime state of a workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Suspension state of a workflow instance.
///
/// `Undecided` marks an instance that was interrupted mid-flow by an
/// unrelated request and is awaiting the user's keep/discard decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suspension {
    #[default]
    No,
    Yes,
    Undecided,
}

impl Suspension {
    /// Whether the instance is parked in any form.
    pub fn is_suspended(self) -> bool {
        self != Self::No
    }
}

/// The persisted, per-user runtime state of one workflow.
///
/// Per-user invariants (enforced by the orchestration service, verified by
/// tests): at most one instance is `active ∧ not suspended` (in progress) and
/// at most one is `Undecided` (interrupted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique instance identifier (UUID format).
    pub id: String,
    /// Name of the definition this instance was created from.
    pub definition: String,
    /// Owning user.
    pub user_id: String,
    /// Live variable bag, seeded from the definition.
    pub variables: Map<String, Value>,
    /// Name of the current state.
    pub current_state: String,
    pub is_active: bool,
    #[serde(default)]
    pub suspension: Suspension,
    /// Accumulated transition trace.
    #[serde(default)]
    pub trace: Vec<String>,
    /// User-facing messages emitted by the latest turn.
    #[serde(default)]
    pub last_messages: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Creates a fresh, not-yet-activated instance.
    pub fn new(
        definition: impl Into<String>,
        user_id: impl Into<String>,
        variables: Map<String, Value>,
        initial_state: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            definition: definition.into(),
            user_id: user_id.into(),
            variables,
            current_state: initial_state.into(),
            is_active: false,
            suspension: Suspension::No,
            trace: Vec::new(),
            last_messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this instance is the user's workflow in progress.
    pub fn in_progress(&self) -> bool {
        self.is_active && !self.suspension.is_suspended()
    }

    /// Appends a transition trace entry and bumps the update timestamp.
    pub fn record(&mut self, entry: impl Into<String>) {
        self.trace.push(entry.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspension_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Suspension::Undecided).unwrap(),
            "\"undecided\""
        );
        assert_eq!(serde_json::to_string(&Suspension::No).unwrap(), "\"no\"");
    }

    #[test]
    fn test_in_progress_requires_active_and_not_suspended() {
        let mut instance =
            WorkflowInstance::new("Test", "user-1", Map::new(), "Start");
        assert!(!instance.in_progress());

        instance.is_active = true;
        assert!(instance.in_progress());

        instance.suspension = Suspension::Undecided;
        assert!(!instance.in_progress());
    }
}
