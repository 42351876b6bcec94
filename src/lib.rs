//! Narrative State — keyword-driven variable tracking for interactive fiction.
//!
//! Keeps numeric story variables (stamina, affection, elapsed time) in step
//! with generated narrative text: keyword hits draw random deltas, guarded
//! by stage constraints, and every variable can be read back as a named
//! stage for prompt building.

pub mod core;
pub mod schema;

pub use crate::core::config::{ConfigError, EngineConfig};
pub use crate::core::engine::{
    EngineError, NoOpReason, Outcome, StageEntry, UpdatePhase, UpdateRecord, VariableEngine,
    VariableEngineBuilder,
};
pub use crate::core::store::{ValueSnapshot, VariableInfo, VariableStore};
pub use crate::schema::stage::{StageDescription, StageDescriptor, StageTransition, StageValue};
