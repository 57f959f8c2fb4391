//! Built-in rule-matching handlers wired by the engine.
//!
//! The workflow gate fronts the pipeline for users with live workflow
//! state; the template handler (in [`crate::directive`]) closes it.

use crate::workflow::WorkflowService;
use anyhow::Result;
use async_trait::async_trait;
use colloquy_core::exchange::{Exchange, Pod};
use colloquy_core::instruction;
use std::sync::Arc;

/// Question asked when an unrelated request interrupts a workflow mid-flow.
const INTERRUPT_QUESTION: &str =
    "You are in the middle of '{}'. Keep it for later? (yes/no)";
/// Reply when an interrupted workflow is kept suspended.
const KEPT_REPLY: &str = "Alright, I kept it for later.";
/// Reply when an interrupted workflow is discarded.
const DISCARDED_REPLY: &str = "Okay, I dropped it.";

/// Rule-matching handler that routes exchanges into live workflow state.
///
/// Placed ahead of the command handlers in the pipeline, it:
/// - feeds the input to an interrupted workflow's keep/discard question,
/// - continues the active workflow with conversational input,
/// - or interrupts the active workflow when the input parses to a new
///   top-level command, asking the keep/discard question.
///
/// Users without live workflow state fall through untouched.
pub struct WorkflowGateHandler {
    workflows: Arc<WorkflowService>,
}

impl WorkflowGateHandler {
    pub fn new(workflows: Arc<WorkflowService>) -> Self {
        Self { workflows }
    }
}

#[async_trait]
impl crate::handler::RuleHandler for WorkflowGateHandler {
    fn name(&self) -> &str {
        "workflows"
    }

    async fn process_message(&self, exchange: &mut Exchange) -> Result<()> {
        let ctx = exchange.security.clone();

        // An interrupted workflow owns the next message: it answers the
        // keep/discard question.
        if let Some(interrupted) = self.workflows.interrupted_workflow(&ctx).await? {
            let kept = self
                .workflows
                .resolve_interrupted_workflow(interrupted, exchange)
                .await?;
            let reply = if kept.is_some() {
                KEPT_REPLY
            } else {
                DISCARDED_REPLY
            };
            exchange.resolve(self.name(), vec![Pod::text(reply)]);
            return Ok(());
        }

        let Some(active) = self.workflows.active_workflow(&ctx).await? else {
            return Ok(());
        };

        // A new top-level command abandons the flow; conversational input
        // continues it.
        let parsed = instruction::parse(&exchange.raw_input);
        if parsed.commands.is_empty() {
            let instance = self
                .workflows
                .continue_with_workflow(active, exchange)
                .await?;
            let answer = self.workflows.to_answer(&instance);
            exchange.resolve(self.name(), answer);
        } else {
            let instance = self.workflows.interrupt_workflow(active).await?;
            let question = INTERRUPT_QUESTION.replacen("{}", &instance.definition, 1);
            exchange.resolve(self.name(), vec![Pod::text(question)]);
        }
        Ok(())
    }
}
