//! Exchange domain model.
//!
//! An exchange is one user message together with its in-progress answer and
//! trace. It is owned by the dispatcher for the lifetime of the request and
//! mutated by handlers; the parallel-group fan-out relies on `Clone`.

use super::pod::Pod;
use super::trace::TraceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the requesting user and application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub user_id: String,
    pub app_id: String,
}

impl SecurityContext {
    pub fn new(user_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            app_id: app_id.into(),
        }
    }
}

/// Side-channel NLU annotations set by upstream collaborators.
///
/// The engine reads these but never mutates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f32>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub dates: Vec<DateTime<Utc>>,
}

/// The finalized answer of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub answer: Vec<Pod>,
    pub timestamp: DateTime<Utc>,
}

/// One user message with its in-progress answer and trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Raw input text as received.
    pub raw_input: String,
    /// When the message arrived.
    pub timestamp: DateTime<Utc>,
    /// Requesting user and application.
    pub security: SecurityContext,
    /// Whether the exchange should be written to conversation history.
    pub historize: bool,
    /// NLU side-channel annotations (set upstream).
    #[serde(default)]
    pub annotations: NluAnnotations,
    handled: bool,
    output: Option<Output>,
    trace: Vec<TraceRecord>,
}

impl Exchange {
    /// Creates a fresh, unhandled exchange for the given input.
    pub fn new(raw_input: impl Into<String>, security: SecurityContext) -> Self {
        Self {
            raw_input: raw_input.into(),
            timestamp: Utc::now(),
            security,
            historize: true,
            annotations: NluAnnotations::default(),
            handled: false,
            output: None,
            trace: Vec::new(),
        }
    }

    /// Whether a handler has resolved this exchange.
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Resolves the exchange with an answer, attributing it to `handler`.
    ///
    /// Once handled, no later pipeline stage may overwrite the answer; a
    /// second call is a no-op and returns `false`.
    pub fn resolve(&mut self, handler: &str, answer: Vec<Pod>) -> bool {
        if self.handled {
            return false;
        }
        self.handled = true;
        self.output = Some(Output {
            answer,
            timestamp: Utc::now(),
        });
        self.trace
            .push(TraceRecord::handled("dispatcher", "exchange resolved", handler));
        true
    }

    /// The answer pods, empty while unresolved.
    pub fn answer(&self) -> &[Pod] {
        self.output.as_ref().map(|o| o.answer.as_slice()).unwrap_or(&[])
    }

    /// The finalized output, if any.
    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    /// Appends a plain trace record.
    pub fn add_trace(&mut self, module: &str, description: impl Into<String>) {
        self.trace.push(TraceRecord::new(module, description));
    }

    /// The append-only trace log.
    pub fn trace(&self) -> &[TraceRecord] {
        &self.trace
    }
}
