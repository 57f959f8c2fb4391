//! Pod: the typed unit of answer content.
//!
//! An answer is an ordered sequence of pods. The serialized shape is the
//! externally-consumed JSON document, tagged by `DataType`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic reply for input the engine could not interpret.
pub const DONT_UNDERSTAND: &str = "I don't understand.";

/// Generic reply when a directive or workflow fails internally.
pub const INTERNAL_ERROR: &str = "Something went wrong on my side.";

/// A single typed unit of answer content.
///
/// Each variant carries only the fields relevant to its tag; the external
/// JSON shape keeps the historical PascalCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "DataType")]
pub enum Pod {
    /// Plain text content.
    Text {
        #[serde(rename = "Content")]
        content: String,
    },
    /// An ordered list, optionally headed.
    List {
        #[serde(rename = "Head", skip_serializing_if = "Option::is_none")]
        head: Option<String>,
        #[serde(rename = "List")]
        items: Vec<Value>,
    },
    /// A single entity from the graph store.
    SingleEntity {
        #[serde(rename = "Entity")]
        entity: Value,
    },
    /// An error surfaced to the user as content.
    Error {
        #[serde(rename = "Content")]
        content: String,
    },
}

impl Pod {
    /// Creates a text pod.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Creates a list pod.
    pub fn list(head: Option<String>, items: Vec<Value>) -> Self {
        Self::List { head, items }
    }

    /// Creates a single-entity pod.
    pub fn single_entity(entity: Value) -> Self {
        Self::SingleEntity { entity }
    }

    /// Creates an error pod.
    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    /// The generic "I don't understand" pod used for parse failures.
    pub fn dont_understand() -> Self {
        Self::text(DONT_UNDERSTAND)
    }

    /// The generic internal-error pod used when a directive fails.
    pub fn internal_error() -> Self {
        Self::error(INTERNAL_ERROR)
    }

    /// Shapes an answer value into the matching pod variant.
    ///
    /// Strings become `Text`, arrays become `List`, objects become
    /// `SingleEntity`; any other value is rendered as text.
    pub fn from_answer_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::text(s.clone()),
            Value::Array(items) => Self::list(None, items.clone()),
            Value::Object(_) => Self::single_entity(value.clone()),
            other => Self::text(other.to_string()),
        }
    }
}
