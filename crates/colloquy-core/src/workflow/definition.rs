//! Workflow definitions: the immutable, externally-authored templates.
//!
//! Definitions arrive as JSON documents with `Transitions` encoded as
//! `"From->To"` / `"From->To, false"` strings. The document is parsed into a
//! structured, validated [`WorkflowDefinition`] at load time so malformed
//! definitions fail fast instead of mid-conversation.

use crate::error::{ColloquyError, Result};
use crate::template::Directive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The four state kinds a workflow is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    /// No user input; routes on a boolean expression over the variables.
    Decision,
    /// Classifies the input to yes/true or no/false.
    YesNo,
    /// The raw input itself is the accepted value.
    #[serde(rename = "QA")]
    Qa,
    /// Terminal, message-only.
    Dummy,
}

/// One state of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateSpec {
    pub name: String,
    pub kind: StateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enter_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_message: Option<String>,
    /// Routing expression, evaluated on activation (Decision states only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Side-effecting directive run on accept (QA states only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<Directive>,
    #[serde(default)]
    pub initial: bool,
    #[serde(default)]
    pub r#final: bool,
}

/// A transition value: booleans for Decision/YesNo routing, text for QA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransitionValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for TransitionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for TransitionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A structured transition, parsed from its string encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub from: String,
    pub to: String,
    /// Expected accept value; defaults to `true` when the encoding omits it.
    pub expected: TransitionValue,
}

impl TransitionSpec {
    /// Parses the `"From->To"` / `"From->To, false"` string encoding.
    pub fn parse(encoded: &str) -> Result<Self> {
        let (endpoints, expected) = match encoded.split_once(',') {
            Some((endpoints, raw)) => {
                let raw = raw.trim();
                let expected = match raw {
                    "true" => TransitionValue::Bool(true),
                    "false" => TransitionValue::Bool(false),
                    other => TransitionValue::Text(other.to_string()),
                };
                (endpoints, expected)
            }
            None => (encoded, TransitionValue::Bool(true)),
        };

        let (from, to) = endpoints.split_once("->").ok_or_else(|| {
            ColloquyError::config(format!("transition '{encoded}' is missing '->'"))
        })?;
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return Err(ColloquyError::config(format!(
                "transition '{encoded}' has an empty endpoint"
            )));
        }

        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            expected,
        })
    }
}

/// The externally-authored JSON shape of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowDocument {
    pub name: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    pub states: Vec<StateSpec>,
    #[serde(default)]
    pub transitions: Vec<String>,
}

/// A validated workflow definition with structured transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    /// Initial variable bag copied into each new instance.
    pub variables: Map<String, Value>,
    pub states: Vec<StateSpec>,
    pub transitions: Vec<TransitionSpec>,
}

impl WorkflowDefinition {
    /// Parses and validates a definition from its JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: WorkflowDocument = serde_json::from_str(json)
            .map_err(|e| ColloquyError::parse(format!("invalid workflow document: {e}")))?;
        Self::try_from(document)
    }

    /// Looks up a state by name.
    pub fn state(&self, name: &str) -> Option<&StateSpec> {
        self.states.iter().find(|s| s.name == name)
    }

    /// The unique `initial: true` state.
    ///
    /// Validation guarantees it exists for definitions loaded through
    /// [`Self::from_json`]; hand-built definitions may lack one.
    pub fn initial_state(&self) -> Option<&StateSpec> {
        self.states.iter().find(|s| s.initial)
    }

    /// Finds the transition matching `(from, value)`.
    ///
    /// An exact match wins; a text value with no exact match falls back to
    /// the state's default (`expected == true`) transition.
    pub fn transition_for(&self, from: &str, value: &TransitionValue) -> Option<&TransitionSpec> {
        let exact = self
            .transitions
            .iter()
            .find(|t| t.from == from && t.expected == *value);
        match (exact, value) {
            (None, TransitionValue::Text(_)) => self
                .transitions
                .iter()
                .find(|t| t.from == from && t.expected == TransitionValue::Bool(true)),
            (found, _) => found,
        }
    }
}

impl TryFrom<WorkflowDocument> for WorkflowDefinition {
    type Error = ColloquyError;

    fn try_from(document: WorkflowDocument) -> Result<Self> {
        if document.states.is_empty() {
            return Err(ColloquyError::config(format!(
                "workflow '{}' declares no states",
                document.name
            )));
        }

        let initial_count = document.states.iter().filter(|s| s.initial).count();
        if initial_count != 1 {
            return Err(ColloquyError::config(format!(
                "workflow '{}' must declare exactly one initial state, found {initial_count}",
                document.name
            )));
        }

        let transitions = document
            .transitions
            .iter()
            .map(|encoded| TransitionSpec::parse(encoded))
            .collect::<Result<Vec<_>>>()?;

        for transition in &transitions {
            for endpoint in [&transition.from, &transition.to] {
                if !document.states.iter().any(|s| s.name == *endpoint) {
                    return Err(ColloquyError::config(format!(
                        "workflow '{}' transition references undeclared state '{endpoint}'",
                        document.name
                    )));
                }
            }
        }

        Ok(Self {
            name: document.name,
            variables: document.variables,
            states: document.states,
            transitions,
        })
    }
}
