//! Template items and their declarative directives.
//!
//! A template item is a matched, already-macro-mutated catalog entry: an
//! optional resolved answer value plus the "Think" directives the executor
//! performs before the final pod-shaping step. The serialized shape is the
//! externally-authored JSON document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One name/value setting routed to a context collaborator by name convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSetting {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// A declarative side-effecting instruction embedded in a template item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Directive {
    /// Fire-and-forget entity creation in the graph store.
    Create {
        #[serde(rename = "Entity")]
        entity: Value,
    },
    /// A batch of settings for the personalization/topics/personality stores.
    Context {
        #[serde(rename = "Settings")]
        settings: Vec<ContextSetting>,
    },
    /// Starts a workflow and binds its first-turn message as the answer.
    #[serde(rename = "CreateReturn.Workflow")]
    CreateReturnWorkflow {
        #[serde(rename = "Definition")]
        definition: String,
    },
    /// Creates entities and returns a single-entity pod.
    #[serde(rename = "CreateReturn.Graph")]
    CreateReturnGraph {
        #[serde(rename = "Nodes")]
        nodes: Vec<Value>,
    },
}

/// A matched template item: directives to perform plus the resolved answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateItem {
    /// Resolved answer value shaped into a pod after directive execution.
    #[serde(rename = "Answer", skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    /// Ordered directives executed before pod shaping.
    #[serde(rename = "Think", default)]
    pub think: Vec<Directive>,
}
