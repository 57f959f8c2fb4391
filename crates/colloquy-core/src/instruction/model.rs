//! Parsed instruction structure.

use serde::{Deserialize, Serialize};

/// One instruction parameter, positional (no name) or named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Lower-cased parameter name; `None` for the positional value.
    pub name: Option<String>,
    pub value: String,
}

impl Parameter {
    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }
}

/// A parsed command: ordered command tokens plus ordered parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Lower-cased command tokens in input order.
    pub commands: Vec<String>,
    /// Parameters in input order.
    pub parameters: Vec<Parameter>,
    /// Whether any parameter carries a name.
    pub has_named_arguments: bool,
}

impl Instruction {
    /// Looks up a named parameter value (name comparison is lower-cased).
    pub fn get(&self, name: &str) -> Option<&str> {
        let wanted = name.to_lowercase();
        self.parameters
            .iter()
            .find(|p| p.name.as_deref() == Some(wanted.as_str()))
            .map(|p| p.value.as_str())
    }

    /// The first parameter, `None` when the parameter block was empty.
    pub fn first_parameter(&self) -> Option<&Parameter> {
        self.parameters.first()
    }
}
