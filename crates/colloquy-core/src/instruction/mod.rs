//! Instruction parsing: raw text to command tokens plus parameters.

pub mod model;
pub mod parser;

pub use model::{Instruction, Parameter};
pub use parser::parse;
