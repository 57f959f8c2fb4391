//! Instruction parser.
//!
//! Grammar: segments separated by `>`; all segments except the last are
//! command tokens, the last segment is the parameter block. The block is
//! split on commas; each comma segment splits on the first colon into a
//! named parameter, or continues the previous value when no colon is
//! present. `scheme://` literals are guarded before any splitting so the
//! colon and slashes inside addresses never fragment a value.

use super::model::{Instruction, Parameter};
use regex::Regex;
use std::sync::OnceLock;

/// Segment delimiter of the command grammar.
const DELIMITER: char = '>';

/// Placeholder substituted for `://` while splitting. A control character
/// cannot occur in user input arriving through the chat channels.
const SCHEME_GUARD: char = '\u{1}';

static SCHEME_RE: OnceLock<Regex> = OnceLock::new();

fn scheme_re() -> &'static Regex {
    SCHEME_RE.get_or_init(|| {
        Regex::new(r"([A-Za-z][A-Za-z0-9+.\-]*)://").expect("valid scheme pattern")
    })
}

fn guard_schemes(input: &str) -> String {
    scheme_re()
        .replace_all(input, format!("${{1}}{SCHEME_GUARD}"))
        .into_owned()
}

fn restore_schemes(input: &str) -> String {
    input.replace(SCHEME_GUARD, "://")
}

/// Parses raw text into an [`Instruction`].
///
/// Malformed input never fails: empty input yields an instruction with no
/// commands and no parameters; empty command tokens (leading/trailing
/// delimiters) are filtered; whitespace-only parameter values are dropped.
pub fn parse(raw: &str) -> Instruction {
    let protected = guard_schemes(raw);

    let mut segments: Vec<&str> = protected.split(DELIMITER).collect();
    // `split` always yields at least one segment; the last is the block.
    let block = segments.pop().unwrap_or_default();

    let commands: Vec<String> = segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| restore_schemes(&s.to_lowercase()))
        .collect();

    let mut parameters: Vec<Parameter> = Vec::new();
    for segment in block.split(',') {
        match segment.split_once(':') {
            Some((name, value)) => {
                parameters.push(Parameter {
                    name: Some(name.trim().to_lowercase()),
                    value: value.to_string(),
                });
            }
            None => {
                if let Some(previous) = parameters.last_mut() {
                    // Continuation of the previous value: re-join with the
                    // comma the split consumed.
                    previous.value.push(',');
                    previous.value.push_str(segment);
                } else if !segment.trim().is_empty() {
                    parameters.push(Parameter::positional(segment));
                }
            }
        }
    }

    let parameters: Vec<Parameter> = parameters
        .into_iter()
        .filter_map(|p| {
            let value = restore_schemes(p.value.trim());
            if value.is_empty() {
                None
            } else {
                Some(Parameter {
                    name: p.name,
                    value,
                })
            }
        })
        .collect();

    let has_named_arguments = parameters.iter().any(|p| p.name.is_some());

    Instruction {
        commands,
        parameters,
        has_named_arguments,
    }
}
