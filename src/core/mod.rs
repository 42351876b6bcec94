pub mod config;
pub mod constraint;
pub mod engine;
pub mod matcher;
pub mod sampler;
pub mod stage;
pub mod store;
