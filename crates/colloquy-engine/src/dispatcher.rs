//! Pipeline dispatcher.
//!
//! Sequences the per-application handler pipeline over one exchange:
//! single entries run in configured order until one resolves the exchange;
//! parallel groups fan out over exchange clones, join, and merge their pods
//! in group order. Exhaustion always ends in the configured fallback pod.

use crate::handler::{CompiledEntry, HandlerRegistry};
use anyhow::{Context, Result};
use colloquy_core::config::{ApplicationConfigService, FailurePolicy};
use colloquy_core::exchange::{Exchange, Pod};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component name used in trace records.
const MODULE: &str = "dispatcher";

/// A compiled, ready-to-run pipeline for one application.
struct CompiledPipeline {
    entries: Vec<CompiledEntry>,
    no_answer: String,
    failure_policy: FailurePolicy,
}

/// Dispatches exchanges through per-application handler pipelines.
///
/// Compiled pipelines are built lazily on first use and cached by
/// application id. A concurrent first-use race rebuilds the same (pure)
/// pipeline twice; the second build simply replaces the first, and the cache
/// stays bounded by the number of applications.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    config: Arc<dyn ApplicationConfigService>,
    pipelines: RwLock<HashMap<String, Arc<CompiledPipeline>>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        config: Arc<dyn ApplicationConfigService>,
    ) -> Self {
        Self {
            registry,
            config,
            pipelines: RwLock::new(HashMap::new()),
        }
    }

    /// Runs the exchange through its application's pipeline.
    ///
    /// On return the exchange is always handled: by a handler, by a parallel
    /// group, or by the configured fallback pod.
    pub async fn dispatch(&self, exchange: &mut Exchange) -> Result<()> {
        let pipeline = self.pipeline_for(&exchange.security.app_id).await?;

        for entry in &pipeline.entries {
            match entry {
                CompiledEntry::Single(handler) => {
                    exchange.add_trace(
                        MODULE,
                        format!("offering exchange to '{}'", handler.name()),
                    );
                    if let Err(error) = handler.offer(exchange).await {
                        self.handle_failure(
                            pipeline.failure_policy,
                            handler.name(),
                            error,
                            exchange,
                        )?;
                    }
                    if exchange.is_handled() {
                        return Ok(());
                    }
                }
                CompiledEntry::Parallel(group) => {
                    let names: Vec<&str> = group.iter().map(|h| h.name()).collect();
                    exchange.add_trace(
                        MODULE,
                        format!("offering exchange to parallel group [{}]", names.join(", ")),
                    );

                    // One clone per member so handlers cannot observe each
                    // other's partial mutation.
                    let runs = group.iter().map(|handler| {
                        let handler = handler.clone();
                        let mut clone = exchange.clone();
                        async move {
                            let result = handler.offer(&mut clone).await;
                            (handler, clone, result)
                        }
                    });

                    let mut combined: Vec<Pod> = Vec::new();
                    for (handler, clone, result) in join_all(runs).await {
                        match result {
                            // Member order controls concatenation order.
                            Ok(()) => combined.extend_from_slice(clone.answer()),
                            Err(error) => self.handle_failure(
                                pipeline.failure_policy,
                                handler.name(),
                                error,
                                exchange,
                            )?,
                        }
                    }

                    if !combined.is_empty() {
                        exchange.resolve(&names.join("+"), combined);
                        return Ok(());
                    }
                }
            }
        }

        tracing::debug!(
            "[Dispatcher] pipeline exhausted for app '{}', answering fallback",
            exchange.security.app_id
        );
        exchange.resolve(MODULE, vec![Pod::text(pipeline.no_answer.clone())]);
        Ok(())
    }

    /// Applies the configured failure policy to one handler error.
    fn handle_failure(
        &self,
        policy: FailurePolicy,
        handler: &str,
        error: anyhow::Error,
        exchange: &mut Exchange,
    ) -> Result<()> {
        match policy {
            FailurePolicy::Abort => {
                Err(error).with_context(|| format!("handler '{handler}' failed"))
            }
            FailurePolicy::Skip => {
                tracing::warn!("[Dispatcher] handler '{}' failed, skipping: {:#}", handler, error);
                exchange.add_trace(MODULE, format!("handler '{handler}' failed, skipped"));
                Ok(())
            }
        }
    }

    /// Returns the compiled pipeline for an application, building it lazily.
    async fn pipeline_for(&self, app_id: &str) -> Result<Arc<CompiledPipeline>> {
        if let Some(pipeline) = self.pipelines.read().await.get(app_id) {
            return Ok(pipeline.clone());
        }

        let config = self
            .config
            .application(app_id)
            .await
            .with_context(|| format!("no configuration for application '{app_id}'"))?;
        let entries = self
            .registry
            .compile(&config.pipeline)
            .with_context(|| format!("invalid pipeline for application '{app_id}'"))?;

        tracing::debug!(
            "[Dispatcher] compiled pipeline for app '{}' ({} entries)",
            app_id,
            entries.len()
        );

        let pipeline = Arc::new(CompiledPipeline {
            entries,
            no_answer: config.no_answer,
            failure_policy: config.failure_policy,
        });
        self.pipelines
            .write()
            .await
            .insert(app_id.to_string(), pipeline.clone());
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{CommandHandler, RuleHandler};
    use async_trait::async_trait;
    use colloquy_core::config::{ApplicationConfig, PipelineEntry};
    use colloquy_core::error::ColloquyError;
    use colloquy_core::exchange::SecurityContext;

    struct StaticConfig(ApplicationConfig);

    #[async_trait]
    impl ApplicationConfigService for StaticConfig {
        async fn application(
            &self,
            _app_id: &str,
        ) -> colloquy_core::Result<ApplicationConfig> {
            Ok(self.0.clone())
        }
    }

    /// Rule handler that resolves with a fixed set of pods, or never.
    struct Fixed {
        name: &'static str,
        pods: Vec<Pod>,
    }

    #[async_trait]
    impl RuleHandler for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn process_message(&self, exchange: &mut Exchange) -> Result<()> {
            if !self.pods.is_empty() {
                exchange.resolve(self.name, self.pods.clone());
            }
            Ok(())
        }
    }

    struct Failing(&'static str);

    #[async_trait]
    impl RuleHandler for Failing {
        fn name(&self) -> &str {
            self.0
        }

        async fn process_message(&self, _exchange: &mut Exchange) -> Result<()> {
            Err(ColloquyError::execution("boom").into())
        }
    }

    struct Prefix(&'static str);

    #[async_trait]
    impl CommandHandler for Prefix {
        fn name(&self) -> &str {
            self.0
        }

        fn can_handle(&self, raw_input: &str) -> bool {
            raw_input.starts_with(self.0)
        }

        async fn handle(&self, _exchange: &mut Exchange) -> Result<Vec<Pod>> {
            Ok(vec![Pod::text(format!("{} answer", self.0))])
        }
    }

    fn dispatcher(
        registry: HandlerRegistry,
        pipeline: Vec<PipelineEntry>,
        failure_policy: FailurePolicy,
    ) -> Dispatcher {
        Dispatcher::new(
            Arc::new(registry),
            Arc::new(StaticConfig(ApplicationConfig {
                pipeline,
                no_answer: "no answer".to_string(),
                failure_policy,
            })),
        )
    }

    fn exchange(input: &str) -> Exchange {
        Exchange::new(input, SecurityContext::new("user-1", "app-1"))
    }

    fn single(name: &str) -> PipelineEntry {
        PipelineEntry::Single(name.to_string())
    }

    #[tokio::test]
    async fn test_first_resolving_handler_wins_and_is_attributed() {
        let mut registry = HandlerRegistry::new();
        registry.register_rule(Arc::new(Fixed { name: "h1", pods: vec![] }));
        registry.register_rule(Arc::new(Fixed {
            name: "h2",
            pods: vec![Pod::text("from h2")],
        }));
        registry.register_rule(Arc::new(Fixed {
            name: "h3",
            pods: vec![Pod::text("from h3")],
        }));

        let dispatcher = dispatcher(
            registry,
            vec![single("h1"), single("h2"), single("h3")],
            FailurePolicy::Abort,
        );

        let mut ex = exchange("hello");
        dispatcher.dispatch(&mut ex).await.unwrap();

        assert!(ex.is_handled());
        assert_eq!(ex.answer(), &[Pod::text("from h2")]);

        // h1 was observed before h2 resolved; h3 never ran.
        assert!(ex.trace().iter().any(|r| r.description.contains("'h1'")));
        assert!(!ex.trace().iter().any(|r| r.description.contains("'h3'")));

        let attributions: Vec<_> = ex
            .trace()
            .iter()
            .filter_map(|r| r.handled_by.as_deref())
            .collect();
        assert_eq!(attributions, vec!["h2"]);
    }

    #[tokio::test]
    async fn test_parallel_group_concatenates_pods_in_group_order() {
        let mut registry = HandlerRegistry::new();
        registry.register_rule(Arc::new(Fixed {
            name: "a",
            pods: vec![Pod::text("a1"), Pod::text("a2")],
        }));
        registry.register_rule(Arc::new(Fixed {
            name: "b",
            pods: vec![Pod::text("b1")],
        }));

        let dispatcher = dispatcher(
            registry,
            vec![PipelineEntry::Parallel(vec!["a".to_string(), "b".to_string()])],
            FailurePolicy::Abort,
        );

        let mut ex = exchange("hello");
        dispatcher.dispatch(&mut ex).await.unwrap();

        assert!(ex.is_handled());
        assert_eq!(
            ex.answer(),
            &[Pod::text("a1"), Pod::text("a2"), Pod::text("b1")]
        );
    }

    #[tokio::test]
    async fn test_empty_parallel_group_falls_through_to_next_entry() {
        let mut registry = HandlerRegistry::new();
        registry.register_rule(Arc::new(Fixed { name: "a", pods: vec![] }));
        registry.register_rule(Arc::new(Fixed { name: "b", pods: vec![] }));
        registry.register_rule(Arc::new(Fixed {
            name: "later",
            pods: vec![Pod::text("resolved later")],
        }));

        let dispatcher = dispatcher(
            registry,
            vec![
                PipelineEntry::Parallel(vec!["a".to_string(), "b".to_string()]),
                single("later"),
            ],
            FailurePolicy::Abort,
        );

        let mut ex = exchange("hello");
        dispatcher.dispatch(&mut ex).await.unwrap();
        assert_eq!(ex.answer(), &[Pod::text("resolved later")]);
    }

    #[tokio::test]
    async fn test_exhausted_pipeline_answers_fallback_pod() {
        let mut registry = HandlerRegistry::new();
        registry.register_rule(Arc::new(Fixed { name: "h1", pods: vec![] }));

        let dispatcher = dispatcher(registry, vec![single("h1")], FailurePolicy::Abort);

        let mut ex = exchange("hello");
        dispatcher.dispatch(&mut ex).await.unwrap();

        assert!(ex.is_handled());
        assert_eq!(ex.answer(), &[Pod::text("no answer")]);
    }

    #[tokio::test]
    async fn test_abort_policy_propagates_handler_failure() {
        let mut registry = HandlerRegistry::new();
        registry.register_rule(Arc::new(Failing("broken")));

        let dispatcher = dispatcher(registry, vec![single("broken")], FailurePolicy::Abort);

        let mut ex = exchange("hello");
        let err = dispatcher.dispatch(&mut ex).await.unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(!ex.is_handled());
    }

    #[tokio::test]
    async fn test_skip_policy_continues_with_next_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register_rule(Arc::new(Failing("broken")));
        registry.register_rule(Arc::new(Fixed {
            name: "h2",
            pods: vec![Pod::text("recovered")],
        }));

        let dispatcher = dispatcher(
            registry,
            vec![single("broken"), single("h2")],
            FailurePolicy::Skip,
        );

        let mut ex = exchange("hello");
        dispatcher.dispatch(&mut ex).await.unwrap();

        assert_eq!(ex.answer(), &[Pod::text("recovered")]);
        assert!(
            ex.trace()
                .iter()
                .any(|r| r.description.contains("failed, skipped"))
        );
    }

    #[tokio::test]
    async fn test_command_handler_is_skipped_when_prefix_misses() {
        let mut registry = HandlerRegistry::new();
        registry.register_command(Arc::new(Prefix("weather")));
        registry.register_rule(Arc::new(Fixed {
            name: "fallback",
            pods: vec![Pod::text("rule answer")],
        }));

        let dispatcher = dispatcher(
            registry,
            vec![single("weather"), single("fallback")],
            FailurePolicy::Abort,
        );

        let mut ex = exchange("news> today");
        dispatcher.dispatch(&mut ex).await.unwrap();
        assert_eq!(ex.answer(), &[Pod::text("rule answer")]);

        let mut ex = exchange("weather> tomorrow");
        dispatcher.dispatch(&mut ex).await.unwrap();
        assert_eq!(ex.answer(), &[Pod::text("weather answer")]);
    }
}
