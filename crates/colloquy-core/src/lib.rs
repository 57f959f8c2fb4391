//! Colloquy core: domain models and trait seams for the conversational
//! request engine.
//!
//! This crate is storage- and transport-agnostic. It defines the exchange
//! model (one message, its answer, its trace), the instruction grammar, the
//! workflow definition/instance pair with its persistence contract, template
//! directives, and the collaborator traits the engine consumes.

pub mod collaborator;
pub mod config;
pub mod error;
pub mod exchange;
pub mod instruction;
pub mod template;
pub mod workflow;

pub use error::{ColloquyError, Result};
