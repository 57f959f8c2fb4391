//! Directive executor.
//!
//! Performs the "Think" directives of a matched template item in order
//! (entity creation, context settings, workflow start, graph creation) and
//! shapes the item's resolved answer value into the exchange's answer pods.

use crate::workflow::WorkflowService;
use anyhow::Result;
use async_trait::async_trait;
use colloquy_core::collaborator::{ContextStore, GraphStore, TemplateCatalog};
use colloquy_core::error::ColloquyError;
use colloquy_core::exchange::{Exchange, Pod, SecurityContext};
use colloquy_core::template::{ContextSetting, Directive, TemplateItem};
use serde_json::Value;
use std::sync::Arc;

/// Component name used in trace records.
const MODULE: &str = "directives";

/// Routes context settings to the personalization/topics/personality stores
/// by convention on the setting name.
pub struct ContextRouter {
    personalization: Arc<dyn ContextStore>,
    topics: Arc<dyn ContextStore>,
    personality: Arc<dyn ContextStore>,
}

impl ContextRouter {
    pub fn new(
        personalization: Arc<dyn ContextStore>,
        topics: Arc<dyn ContextStore>,
        personality: Arc<dyn ContextStore>,
    ) -> Self {
        Self {
            personalization,
            topics,
            personality,
        }
    }

    /// Stores one setting with the collaborator its name selects.
    pub async fn add(
        &self,
        setting: &ContextSetting,
        ctx: &SecurityContext,
    ) -> colloquy_core::Result<()> {
        let store = if setting.name.starts_with("topic") {
            &self.topics
        } else if setting.name.starts_with("personality") {
            &self.personality
        } else {
            &self.personalization
        };
        store.add(&setting.name, &setting.value, ctx).await
    }
}

/// Runs a QA state's side-effecting directive on accept.
///
/// Only `Create` and `Context` make sense inside a state; the `CreateReturn`
/// directives belong to template items. The returned value, if any, may
/// become the transition's accepted value.
pub(crate) async fn run_state_directive(
    directive: &Directive,
    graph: &Arc<dyn GraphStore>,
    context: &ContextRouter,
    ctx: &SecurityContext,
) -> colloquy_core::Result<Option<Value>> {
    match directive {
        Directive::Create { entity } => {
            let stored = graph.upsert_entity(entity).await?;
            Ok(Some(stored))
        }
        Directive::Context { settings } => {
            for setting in settings {
                context.add(setting, ctx).await?;
            }
            Ok(None)
        }
        Directive::CreateReturnWorkflow { .. } | Directive::CreateReturnGraph { .. } => {
            Err(ColloquyError::execution(
                "CreateReturn directives are not supported inside workflow states",
            ))
        }
    }
}

/// Executes a template item's directives against an exchange.
pub struct DirectiveExecutor {
    graph: Arc<dyn GraphStore>,
    context: Arc<ContextRouter>,
    workflows: Arc<WorkflowService>,
}

impl DirectiveExecutor {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        context: Arc<ContextRouter>,
        workflows: Arc<WorkflowService>,
    ) -> Self {
        Self {
            graph,
            context,
            workflows,
        }
    }

    /// Performs the item's directives in order, then the final pod-shaping
    /// step for the resolved answer value.
    ///
    /// `CreateReturn.Workflow` failures are caught here and replaced with a
    /// generic internal-error pod; they never propagate to the caller.
    /// Multi-node `CreateReturn.Graph` is an explicit unimplemented case.
    pub async fn execute(
        &self,
        item: TemplateItem,
        exchange: &mut Exchange,
    ) -> Result<TemplateItem> {
        for directive in &item.think {
            match directive {
                Directive::Create { entity } => {
                    // Fire-and-forget relative to the answer.
                    if let Err(error) = self.graph.upsert_entity(entity).await {
                        tracing::warn!("[Directives] entity creation failed: {}", error);
                        exchange.add_trace(MODULE, "entity creation failed");
                    }
                }
                Directive::Context { settings } => {
                    for setting in settings {
                        self.context.add(setting, &exchange.security).await?;
                    }
                }
                Directive::CreateReturnWorkflow { definition } => {
                    match self.workflows.run_workflow(definition, exchange).await {
                        Ok(instance) => {
                            let answer = self.workflows.to_answer(&instance);
                            exchange.resolve(MODULE, answer);
                        }
                        Err(error) => {
                            tracing::error!(
                                "[Directives] starting workflow '{}' failed: {:#}",
                                definition,
                                error
                            );
                            exchange.resolve(MODULE, vec![Pod::internal_error()]);
                        }
                    }
                }
                Directive::CreateReturnGraph { nodes } => match nodes.as_slice() {
                    [node] => {
                        let entity = self.graph.upsert_entity(node).await?;
                        exchange.resolve(MODULE, vec![Pod::single_entity(entity)]);
                    }
                    _ => {
                        return Err(ColloquyError::unimplemented(
                            "CreateReturn.Graph supports single-node results only",
                        )
                        .into());
                    }
                },
            }
        }

        if !exchange.is_handled() {
            if let Some(answer) = &item.answer {
                exchange.resolve(MODULE, vec![Pod::from_answer_value(answer)]);
            }
        }

        Ok(item)
    }
}

/// Rule-matching handler that resolves exchanges from the template catalog.
pub struct TemplateHandler {
    catalog: Arc<dyn TemplateCatalog>,
    executor: Arc<DirectiveExecutor>,
}

impl TemplateHandler {
    pub fn new(catalog: Arc<dyn TemplateCatalog>, executor: Arc<DirectiveExecutor>) -> Self {
        Self { catalog, executor }
    }
}

#[async_trait]
impl crate::handler::RuleHandler for TemplateHandler {
    fn name(&self) -> &str {
        "templates"
    }

    async fn process_message(&self, exchange: &mut Exchange) -> Result<()> {
        let Some(item) = self.catalog.match_input(&exchange.raw_input).await? else {
            return Ok(());
        };
        exchange.add_trace(MODULE, "template matched");
        self.executor.execute(item, exchange).await?;
        Ok(())
    }
}
