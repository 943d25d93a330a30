//! Binary-side composition for the ascent pipeline.
//!
//! The deterministic core (facts, routing policy, lien priority, decision
//! engine, stores) lives in the `pipeline` crate. This crate wires it to
//! the outside world: configuration, HTTP reasoning backends, the scorer,
//! the per-stage executors, and the orchestrator that drives items through
//! the sequence.

pub mod backends;
pub mod config;
pub mod orchestrator;
pub mod scorer;
pub mod stages;
pub mod state_machine;

pub use config::AscentConfig;
pub use orchestrator::{BatchSummary, ItemReport, Orchestrator};
