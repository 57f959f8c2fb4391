//! Workflow orchestration service.
//!
//! Coordinates the state machine with the persistence contract: starting,
//! continuing, suspending, resuming, and interrupt resolution. Every
//! transition is persisted before the instance is handed back.

use super::machine::{Execution, Machine, is_affirmative};
use crate::directive::{ContextRouter, run_state_directive};
use anyhow::{Context, Result};
use colloquy_core::collaborator::GraphStore;
use colloquy_core::error::ColloquyError;
use colloquy_core::exchange::{Exchange, INTERNAL_ERROR, Pod, SecurityContext};
use colloquy_core::workflow::{
    InstanceFilter, Suspension, TransitionValue, WorkflowDefinition, WorkflowInstance,
    WorkflowRepository,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Orchestrates workflow instances over the persistence contract.
///
/// The repository itself is lock-free; to keep the read-modify-write cycle
/// safe, all mutating operations for one user are serialized through a
/// per-user mutex (two concurrent sessions for the same user cannot
/// interleave).
pub struct WorkflowService {
    /// Loaded definitions by name.
    definitions: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
    repository: Arc<dyn WorkflowRepository>,
    graph: Arc<dyn GraphStore>,
    context: Arc<ContextRouter>,
    /// Per-user serialization of mutating operations.
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowService {
    pub fn new(
        repository: Arc<dyn WorkflowRepository>,
        graph: Arc<dyn GraphStore>,
        context: Arc<ContextRouter>,
    ) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            repository,
            graph,
            context,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a loaded workflow definition under its name.
    pub async fn register_definition(&self, definition: WorkflowDefinition) {
        self.definitions
            .write()
            .await
            .insert(definition.name.clone(), Arc::new(definition));
    }

    /// Starts a fresh instance of the named definition and runs it until the
    /// next user-facing message (or completion), persisting the result.
    pub async fn run_workflow(
        &self,
        definition_name: &str,
        exchange: &mut Exchange,
    ) -> Result<WorkflowInstance> {
        let user_id = exchange.security.user_id.clone();
        let lock = self.user_lock(&user_id).await;
        let _guard = lock.lock().await;

        let definition = self.definition(definition_name).await?;
        let initial = definition.initial_state().ok_or_else(|| {
            ColloquyError::config(format!(
                "workflow '{definition_name}' has no initial state"
            ))
        })?;

        // Starting fresh displaces any workflow already in progress for this
        // user: it becomes interrupted, keeping the per-user invariant.
        if let Some(mut displaced) = self.find_one(
            InstanceFilter::for_user(&user_id)
                .active(true)
                .suspended(Suspension::No),
        )
        .await?
        {
            tracing::warn!(
                "[Workflows] user '{}' starts '{}' while '{}' is in progress, marking it interrupted",
                user_id,
                definition_name,
                displaced.definition
            );
            displaced.suspension = Suspension::Undecided;
            self.repository.upsert(&displaced).await?;
        }

        let mut instance = WorkflowInstance::new(
            definition.name.clone(),
            user_id,
            definition.variables.clone(),
            initial.name.clone(),
        );
        Machine::new(&definition, &mut instance).activate()?;
        self.run_final_directive(&definition, &mut instance, &exchange.security)
            .await;

        self.persist(&instance).await?;
        exchange.add_trace(
            "workflows",
            format!("started workflow '{}' ({})", instance.definition, instance.id),
        );
        Ok(instance)
    }

    /// Feeds the exchange's raw input into the active state and persists the
    /// transition.
    ///
    /// A QA state's directive runs on accept; a directive failure is caught
    /// here, surfaced as a generic internal-error message, and the workflow
    /// is finished rather than left in an inconsistent active state.
    pub async fn continue_with_workflow(
        &self,
        mut instance: WorkflowInstance,
        exchange: &mut Exchange,
    ) -> Result<WorkflowInstance> {
        let lock = self.user_lock(&instance.user_id).await;
        let _guard = lock.lock().await;

        let definition = self.definition(&instance.definition).await?;
        let outcome = Machine::new(&definition, &mut instance).execute(&exchange.raw_input)?;

        if let Execution::QaPending(input) = outcome {
            let directive = definition
                .state(&instance.current_state)
                .and_then(|state| state.directive.clone());

            let value = match directive {
                Some(directive) => {
                    match run_state_directive(
                        &directive,
                        &self.graph,
                        &self.context,
                        &exchange.security,
                    )
                    .await
                    {
                        Ok(result) => directive_transition_value(result, input),
                        Err(error) => {
                            tracing::error!(
                                "[Workflows] directive failed in '{}' of '{}': {}",
                                instance.current_state,
                                instance.definition,
                                error
                            );
                            // Finish instead of leaving the instance active.
                            instance.is_active = false;
                            instance.last_messages = vec![INTERNAL_ERROR.to_string()];
                            instance.record("finished after directive failure");
                            self.persist(&instance).await?;
                            return Ok(instance);
                        }
                    }
                }
                None => TransitionValue::Text(input),
            };
            Machine::new(&definition, &mut instance).accept(value)?;
        }

        self.run_final_directive(&definition, &mut instance, &exchange.security)
            .await;
        self.persist(&instance).await?;
        Ok(instance)
    }

    /// Runs the directive of a `final` destination state once the workflow
    /// has ended there (a final QA state never goes active for input).
    ///
    /// Failures are caught at this boundary: the workflow is already
    /// finished, so only the surfaced message is replaced.
    async fn run_final_directive(
        &self,
        definition: &WorkflowDefinition,
        instance: &mut WorkflowInstance,
        ctx: &SecurityContext,
    ) {
        if instance.is_active {
            return;
        }
        let directive = definition
            .state(&instance.current_state)
            .and_then(|state| state.directive.clone());
        let Some(directive) = directive else {
            return;
        };

        if let Err(error) =
            run_state_directive(&directive, &self.graph, &self.context, ctx).await
        {
            tracing::error!(
                "[Workflows] directive failed in final state '{}' of '{}': {}",
                instance.current_state,
                instance.definition,
                error
            );
            instance.last_messages = vec![INTERNAL_ERROR.to_string()];
            instance.record("directive failed in final state");
        }
    }

    /// The user's workflow in progress, if any.
    pub async fn active_workflow(
        &self,
        ctx: &SecurityContext,
    ) -> Result<Option<WorkflowInstance>> {
        self.find_one(
            InstanceFilter::for_user(&ctx.user_id)
                .active(true)
                .suspended(Suspension::No),
        )
        .await
    }

    /// The user's interrupted workflow awaiting a keep/discard decision.
    pub async fn interrupted_workflow(
        &self,
        ctx: &SecurityContext,
    ) -> Result<Option<WorkflowInstance>> {
        self.find_one(
            InstanceFilter::for_user(&ctx.user_id).suspended(Suspension::Undecided),
        )
        .await
    }

    /// A suspended workflow by id, scoped to the requesting user.
    pub async fn suspended_workflow(
        &self,
        id: &str,
        ctx: &SecurityContext,
    ) -> Result<Option<WorkflowInstance>> {
        self.find_one(
            InstanceFilter::for_user(&ctx.user_id)
                .with_id(id)
                .suspended(Suspension::Yes),
        )
        .await
    }

    /// Parks the instance: deactivated but kept, resumable later.
    pub async fn suspend_workflow(
        &self,
        mut instance: WorkflowInstance,
    ) -> Result<WorkflowInstance> {
        let lock = self.user_lock(&instance.user_id).await;
        let _guard = lock.lock().await;

        let definition = self.definition(&instance.definition).await?;
        Machine::new(&definition, &mut instance).deactivate();
        instance.suspension = Suspension::Yes;
        self.persist(&instance).await?;
        Ok(instance)
    }

    /// Marks an in-progress instance as interrupted by an unrelated request.
    pub async fn interrupt_workflow(
        &self,
        mut instance: WorkflowInstance,
    ) -> Result<WorkflowInstance> {
        let lock = self.user_lock(&instance.user_id).await;
        let _guard = lock.lock().await;

        instance.suspension = Suspension::Undecided;
        instance.record("interrupted by an unrelated request");
        self.persist(&instance).await?;
        Ok(instance)
    }

    /// Resumes a suspended instance in its stored state: the current state
    /// name and variable bag are restored, not reset, and the state's enter
    /// message is re-emitted.
    pub async fn resume_workflow(
        &self,
        mut instance: WorkflowInstance,
        exchange: &mut Exchange,
    ) -> Result<WorkflowInstance> {
        let lock = self.user_lock(&instance.user_id).await;
        let _guard = lock.lock().await;

        let definition = self.definition(&instance.definition).await?;
        instance.suspension = Suspension::No;
        Machine::new(&definition, &mut instance).activate()?;

        self.persist(&instance).await?;
        exchange.add_trace(
            "workflows",
            format!("resumed workflow '{}' ({})", instance.definition, instance.id),
        );
        Ok(instance)
    }

    /// Applies the user's keep/discard decision to an interrupted instance.
    ///
    /// Affirmative input keeps it suspended for later; anything else
    /// discards it. Returns the kept instance, or `None` when discarded.
    pub async fn resolve_interrupted_workflow(
        &self,
        mut instance: WorkflowInstance,
        exchange: &mut Exchange,
    ) -> Result<Option<WorkflowInstance>> {
        let lock = self.user_lock(&instance.user_id).await;
        let _guard = lock.lock().await;

        if is_affirmative(&exchange.raw_input) {
            let definition = self.definition(&instance.definition).await?;
            Machine::new(&definition, &mut instance).deactivate();
            instance.suspension = Suspension::Yes;
            self.persist(&instance).await?;
            exchange.add_trace("workflows", "interrupted workflow kept suspended");
            Ok(Some(instance))
        } else {
            self.repository
                .delete(&instance.id)
                .await
                .context("discarding interrupted workflow")?;
            exchange.add_trace("workflows", "interrupted workflow discarded");
            Ok(None)
        }
    }

    /// Renders the instance's latest message(s) as answer pods.
    pub fn to_answer(&self, instance: &WorkflowInstance) -> Vec<Pod> {
        instance
            .last_messages
            .iter()
            .map(|message| Pod::text(message.clone()))
            .collect()
    }

    /// Renders a one-pod summary of the instance.
    pub fn to_summary(&self, instance: &WorkflowInstance) -> Pod {
        Pod::text(format!(
            "Workflow '{}' is at step '{}'.",
            instance.definition, instance.current_state
        ))
    }

    async fn definition(&self, name: &str) -> Result<Arc<WorkflowDefinition>> {
        self.definitions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ColloquyError::not_found("workflow definition", name).into())
    }

    /// Persists the instance: finished instances are destroyed unless the
    /// caller kept them suspended.
    async fn persist(&self, instance: &WorkflowInstance) -> Result<()> {
        if instance.is_active || instance.suspension.is_suspended() {
            self.repository
                .upsert(instance)
                .await
                .context("persisting workflow instance")?;
        } else {
            self.repository
                .delete(&instance.id)
                .await
                .context("removing finished workflow instance")?;
        }
        Ok(())
    }

    async fn find_one(&self, filter: InstanceFilter) -> Result<Option<WorkflowInstance>> {
        let mut found = self.repository.find(&filter).await?;
        if found.len() > 1 {
            tracing::warn!(
                "[Workflows] expected at most one instance for {:?}, found {}",
                filter,
                found.len()
            );
        }
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Converts a state-directive result into the transition's accepted value.
///
/// Scalar results become the value; anything else falls back to the raw
/// input the QA state accepted.
fn directive_transition_value(result: Option<Value>, input: String) -> TransitionValue {
    match result {
        Some(Value::Bool(b)) => TransitionValue::Bool(b),
        Some(Value::String(s)) => TransitionValue::Text(s),
        _ => TransitionValue::Text(input),
    }
}
