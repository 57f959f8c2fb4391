//! Trait seams for external collaborators.
//!
//! The engine never talks to concrete stores: graph/entity creation, the
//! personalization-style context stores, and the template catalog are all
//! consumed through these contracts.

use crate::error::Result;
use crate::exchange::SecurityContext;
use crate::template::TemplateItem;
use async_trait::async_trait;
use serde_json::Value;

/// The entity/graph store collaborator.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates or updates an entity, returning the stored representation.
    async fn upsert_entity(&self, entity: &Value) -> Result<Value>;

    /// Creates a multi-node graph, returning its stored representation.
    async fn create_graph(&self, nodes: &[Value]) -> Result<Value>;
}

/// A key/value context store (personalization, topics, personality).
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Records a name/value setting for the requesting user.
    async fn add(&self, key: &str, value: &str, ctx: &SecurityContext) -> Result<()>;
}

/// The template catalog collaborator.
///
/// Pattern/lookup internals are out of scope here; the engine only needs
/// "given raw input, maybe a matched, macro-mutated template item".
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn match_input(&self, raw_input: &str) -> Result<Option<TemplateItem>>;
}
