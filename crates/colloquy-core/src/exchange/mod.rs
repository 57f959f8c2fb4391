//! Exchange model: one user message, its answer, and its trace.

pub mod model;
pub mod pod;
pub mod trace;

pub use model::{Exchange, NluAnnotations, Output, SecurityContext};
pub use pod::{DONT_UNDERSTAND, INTERNAL_ERROR, Pod};
pub use trace::TraceRecord;
