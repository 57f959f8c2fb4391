//! Structured trace records attached to an exchange.

use serde::{Deserialize, Serialize};

/// One append-only trace record describing a processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Component that produced the record (e.g. "dispatcher").
    pub module: String,
    /// Human-readable description of the step.
    pub description: String,
    /// Set when this step resolved the exchange; names the resolving handler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled_by: Option<String>,
}

impl TraceRecord {
    /// Creates a plain trace record.
    pub fn new(module: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            description: description.into(),
            handled_by: None,
        }
    }

    /// Creates a record marking the exchange as handled by `handler`.
    pub fn handled(
        module: impl Into<String>,
        description: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            description: description.into(),
            handled_by: Some(handler.into()),
        }
    }
}
