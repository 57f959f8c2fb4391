//! Handler traits and the handler registry.
//!
//! Two handler shapes are supported, unified behind one capability: "given
//! an exchange, optionally resolve it". Command handlers gate on a cheap
//! `can_handle` test; rule-matching handlers are always offered the exchange
//! and decide themselves whether to resolve it.

use anyhow::Result;
use async_trait::async_trait;
use colloquy_core::config::PipelineEntry;
use colloquy_core::error::ColloquyError;
use colloquy_core::exchange::{Exchange, Pod};
use std::collections::HashMap;
use std::sync::Arc;

/// A handler gated by a cheap, stateless prefix/pattern test.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Registry name of this handler.
    fn name(&self) -> &str;

    /// Cheap, stateless test whether this handler applies to the raw input.
    fn can_handle(&self, raw_input: &str) -> bool;

    /// Produces the answer pods for an exchange that passed `can_handle`.
    async fn handle(&self, exchange: &mut Exchange) -> Result<Vec<Pod>>;
}

/// A rule-matching handler: always offered the exchange, resolves it itself.
#[async_trait]
pub trait RuleHandler: Send + Sync {
    /// Registry name of this handler.
    fn name(&self) -> &str;

    /// Processes the exchange, resolving it when a rule matches.
    async fn process_message(&self, exchange: &mut Exchange) -> Result<()>;
}

/// A registered handler of either shape.
#[derive(Clone)]
pub enum RegisteredHandler {
    Command(Arc<dyn CommandHandler>),
    Rule(Arc<dyn RuleHandler>),
}

impl RegisteredHandler {
    pub fn name(&self) -> &str {
        match self {
            Self::Command(h) => h.name(),
            Self::Rule(h) => h.name(),
        }
    }

    /// Offers the exchange to the handler.
    ///
    /// A command handler whose `can_handle` passes and which returns a
    /// non-empty pod list resolves the exchange; a rule handler resolves it
    /// internally or leaves it untouched.
    pub async fn offer(&self, exchange: &mut Exchange) -> Result<()> {
        match self {
            Self::Command(handler) => {
                if !handler.can_handle(&exchange.raw_input) {
                    return Ok(());
                }
                let pods = handler.handle(exchange).await?;
                if !pods.is_empty() {
                    exchange.resolve(handler.name(), pods);
                }
                Ok(())
            }
            Self::Rule(handler) => handler.process_message(exchange).await,
        }
    }
}

/// One compiled pipeline stage: a resolved handler or a parallel group.
#[derive(Clone)]
pub enum CompiledEntry {
    Single(RegisteredHandler),
    Parallel(Vec<RegisteredHandler>),
}

impl std::fmt::Debug for CompiledEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(handler) => f.debug_tuple("Single").field(&handler.name()).finish(),
            Self::Parallel(handlers) => f
                .debug_tuple("Parallel")
                .field(&handlers.iter().map(|h| h.name()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Name → handler map from which per-application pipelines are compiled.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, RegisteredHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command handler under its own name.
    pub fn register_command(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers
            .insert(handler.name().to_string(), RegisteredHandler::Command(handler));
    }

    /// Registers a rule-matching handler under its own name.
    pub fn register_rule(&mut self, handler: Arc<dyn RuleHandler>) {
        self.handlers
            .insert(handler.name().to_string(), RegisteredHandler::Rule(handler));
    }

    /// Looks up a handler by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredHandler> {
        self.handlers.get(name)
    }

    /// Compiles a pipeline definition into resolved entries.
    ///
    /// An unregistered handler name is fatal here, at construction time, not
    /// at dispatch time.
    pub fn compile(&self, pipeline: &[PipelineEntry]) -> Result<Vec<CompiledEntry>> {
        pipeline
            .iter()
            .map(|entry| match entry {
                PipelineEntry::Single(name) => {
                    Ok(CompiledEntry::Single(self.resolve(name)?))
                }
                PipelineEntry::Parallel(names) => Ok(CompiledEntry::Parallel(
                    names
                        .iter()
                        .map(|name| self.resolve(name))
                        .collect::<Result<Vec<_>>>()?,
                )),
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<RegisteredHandler> {
        self.handlers.get(name).cloned().ok_or_else(|| {
            ColloquyError::config(format!("handler '{name}' is not registered")).into()
        })
    }
}
