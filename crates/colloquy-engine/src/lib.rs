//! Colloquy engine: the application layer of the conversational request
//! engine.
//!
//! Ties the `colloquy-core` domain together: the handler registry and
//! pipeline dispatcher sequence handlers over an exchange, the workflow
//! service drives persisted multi-turn state machines, and the directive
//! executor binds template directives back into the exchange's answer.

pub mod directive;
pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod workflow;

pub use directive::{ContextRouter, DirectiveExecutor, TemplateHandler};
pub use dispatcher::Dispatcher;
pub use handler::{CommandHandler, HandlerRegistry, RegisteredHandler, RuleHandler};
pub use handlers::WorkflowGateHandler;
pub use workflow::WorkflowService;
