//! Workflow state machine core.
//!
//! Synchronous transition logic over a definition/instance pair: activation,
//! kind-specific execution, accept/reject routing, and message rendering.
//! Asynchronous concerns (persistence, QA directives) belong to the
//! orchestration service.

use colloquy_core::error::{ColloquyError, Result};
use colloquy_core::workflow::{
    StateKind, StateSpec, TransitionValue, WorkflowDefinition, WorkflowInstance,
};
use serde_json::{Map, Value};

/// Upper bound on chained transitions per turn; definitions are authored
/// data, so a Decision cycle must fail instead of spinning.
const TRANSITION_BUDGET: usize = 32;

/// Outcome of feeding input to the active state.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The turn is complete (transitioned, rejected, or finished).
    Done,
    /// A QA state accepted the raw input; the caller runs the state's
    /// directive (if any) and then drives `accept` with the final value.
    QaPending(String),
}

/// Transition driver over one definition/instance pair.
pub struct Machine<'a> {
    definition: &'a WorkflowDefinition,
    instance: &'a mut WorkflowInstance,
}

impl<'a> Machine<'a> {
    pub fn new(definition: &'a WorkflowDefinition, instance: &'a mut WorkflowInstance) -> Self {
        Self {
            definition,
            instance,
        }
    }

    /// Activates the workflow: only valid while inactive.
    ///
    /// Enters the current state (the initial one for a fresh instance, the
    /// stored one when resuming), emitting its enter message; a Decision
    /// state routes onward immediately.
    pub fn activate(&mut self) -> Result<()> {
        if self.instance.is_active {
            return Err(ColloquyError::execution(format!(
                "workflow '{}' is already active",
                self.instance.definition
            )));
        }
        self.instance.is_active = true;
        self.instance.last_messages.clear();
        self.instance.record("activated");

        let name = self.instance.current_state.clone();
        self.enter_state(&name, TRANSITION_BUDGET)
    }

    /// Feeds user input to the active state.
    pub fn execute(&mut self, input: &str) -> Result<Execution> {
        if !self.instance.is_active {
            return Err(ColloquyError::execution(format!(
                "workflow '{}' is not active",
                self.instance.definition
            )));
        }
        self.instance.last_messages.clear();

        let state = self.current_state()?;
        if let Some(message) = state.execute_message.clone() {
            self.emit(&message);
        }

        match state.kind {
            StateKind::YesNo => {
                // Anything non-affirmative counts as "no".
                let value = TransitionValue::Bool(is_affirmative(input));
                self.accept_within(value, TRANSITION_BUDGET)?;
                Ok(Execution::Done)
            }
            StateKind::Qa => Ok(Execution::QaPending(input.trim().to_string())),
            StateKind::Decision | StateKind::Dummy => Err(ColloquyError::execution(format!(
                "state '{}' does not take user input",
                self.instance.current_state
            ))),
        }
    }

    /// Accepts a value for the current state and transitions.
    ///
    /// A value with no matching transition is treated as a reject: the state
    /// re-prompts and stays active.
    pub fn accept(&mut self, value: TransitionValue) -> Result<()> {
        self.accept_within(value, TRANSITION_BUDGET)
    }

    /// Re-emits the reject message (or `reason`) and stays active.
    pub fn reject(&mut self, reason: Option<&str>) -> Result<()> {
        let state = self.current_state()?;
        let message = reason
            .map(str::to_string)
            .or_else(|| state.reject_message.clone());
        if let Some(message) = message {
            self.emit(&message);
        }
        self.instance.record(format!("rejected in '{}'", self.instance.current_state));
        Ok(())
    }

    /// Marks the instance inactive without transitioning (suspension).
    pub fn deactivate(&mut self) {
        self.instance.is_active = false;
        self.instance.record("deactivated");
    }

    fn accept_within(&mut self, value: TransitionValue, budget: usize) -> Result<()> {
        if budget == 0 {
            return Err(ColloquyError::execution(format!(
                "workflow '{}' exceeded the transition budget (definition cycle?)",
                self.instance.definition
            )));
        }

        let from = self.instance.current_state.clone();
        let Some(transition) = self.definition.transition_for(&from, &value) else {
            return self.reject(None);
        };
        let to = transition.to.clone();

        let state = self.current_state()?;
        if let Some(message) = state.accept_message.clone() {
            self.emit(&message);
        }
        self.instance.record(format!("accepted {value:?}: '{from}' -> '{to}'"));

        self.enter_state(&to, budget - 1)
    }

    fn enter_state(&mut self, name: &str, budget: usize) -> Result<()> {
        let definition = self.definition;
        let state = definition.state(name).ok_or_else(|| {
            ColloquyError::not_found("workflow state", name.to_string())
        })?;

        self.instance.current_state = state.name.clone();
        if let Some(message) = state.enter_message.clone() {
            self.emit(&message);
        }

        if state.r#final {
            // Terminal state: the workflow ends, its message was surfaced.
            self.instance.is_active = false;
            self.instance.record(format!("finished in '{}'", state.name));
            return Ok(());
        }

        if state.kind == StateKind::Decision {
            let expression = state.expression.clone().unwrap_or_default();
            let value = evaluate_expression(&expression, &self.instance.variables)?;
            return self.accept_within(TransitionValue::Bool(value), budget);
        }

        Ok(())
    }

    fn current_state(&self) -> Result<&'a StateSpec> {
        self.definition
            .state(&self.instance.current_state)
            .ok_or_else(|| {
                ColloquyError::not_found(
                    "workflow state",
                    self.instance.current_state.clone(),
                )
            })
    }

    fn emit(&mut self, template: &str) {
        let message = render(template, &self.instance.variables);
        self.instance.last_messages.push(message);
    }
}

/// Classifies user input as affirmative.
pub fn is_affirmative(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "yes" | "y" | "yeah" | "yep" | "sure" | "ok" | "okay" | "true"
    )
}

/// Renders `{variable}` placeholders from the variable bag.
pub fn render(template: &str, variables: &Map<String, Value>) -> String {
    let mut rendered = template.to_string();
    for (name, value) in variables {
        let placeholder = format!("{{{name}}}");
        if rendered.contains(&placeholder) {
            rendered = rendered.replace(&placeholder, &value_text(value));
        }
    }
    rendered
}

/// Evaluates a Decision routing expression over the variable bag.
///
/// Supported forms: `var`, `!var`, `var == literal`, `var != literal`.
/// Values follow JSON truthiness: null/false/0/""/"false" are false.
pub fn evaluate_expression(expression: &str, variables: &Map<String, Value>) -> Result<bool> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(ColloquyError::config(
            "decision state is missing its expression",
        ));
    }

    if let Some((left, right)) = expression.split_once("==") {
        return Ok(operand_text(left, variables) == operand_text(right, variables));
    }
    if let Some((left, right)) = expression.split_once("!=") {
        return Ok(operand_text(left, variables) != operand_text(right, variables));
    }
    if let Some(negated) = expression.strip_prefix('!') {
        return Ok(!truthy(negated.trim(), variables));
    }
    Ok(truthy(expression, variables))
}

fn operand_text(operand: &str, variables: &Map<String, Value>) -> String {
    let operand = operand.trim();
    let unquoted = operand
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| operand.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
    if let Some(literal) = unquoted {
        return literal.to_string();
    }
    match variables.get(operand) {
        Some(value) => value_text(value),
        None => operand.to_string(),
    }
}

fn truthy(name: &str, variables: &Map<String, Value>) -> bool {
    match variables.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Null) | None => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
