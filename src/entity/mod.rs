//! Entity Interface
//!
//! Three-valued status queries and mutations consumed by the scripting
//! evaluator.

pub mod entity_data;
pub mod entity_interface;

pub use entity_data::{BatchRequest, BatchResult, QueryOutcome};
pub use entity_interface::EntityInterface;
