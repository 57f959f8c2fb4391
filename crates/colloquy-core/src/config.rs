//! Per-application pipeline configuration.
//!
//! Configuration is authored externally; the engine consumes it through the
//! [`ApplicationConfigService`] seam and compiles the pipeline lazily.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One pipeline entry: a single handler name or a parallel group of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineEntry {
    Single(String),
    Parallel(Vec<String>),
}

/// Policy applied when a handler raises during dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole exchange (default).
    #[default]
    Abort,
    /// Log, trace, and continue with the next handler.
    Skip,
}

/// Per-application dispatch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Ordered handler names / parallel-group arrays.
    pub pipeline: Vec<PipelineEntry>,
    /// Fallback answer text when no handler resolves the exchange.
    pub no_answer: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Provider of per-application configuration (external collaborator).
#[async_trait]
pub trait ApplicationConfigService: Send + Sync {
    /// Returns the configuration for the given application id.
    async fn application(&self, app_id: &str) -> Result<ApplicationConfig>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pipeline_entries_deserialize_from_mixed_list() {
        let config: ApplicationConfig = serde_json::from_value(json!({
            "pipeline": ["workflows", ["facts", "smalltalk"], "templates"],
            "no_answer": "Sorry, I have no answer to that.",
        }))
        .unwrap();

        assert_eq!(config.pipeline.len(), 3);
        assert_eq!(
            config.pipeline[1],
            PipelineEntry::Parallel(vec!["facts".to_string(), "smalltalk".to_string()])
        );
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_failure_policy_deserializes_lowercase() {
        let config: ApplicationConfig = serde_json::from_value(json!({
            "pipeline": ["templates"],
            "no_answer": "n/a",
            "failure_policy": "skip",
        }))
        .unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
    }
}
