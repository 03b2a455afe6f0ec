//! Evalsync – lifecycle tracking for REPL evaluations anchored in live documents
//!
//! This crate keeps the editor side of an interactive evaluator honest:
//! - Every evaluation gets an id, a sticky range in its document, and a status
//!   that only moves through one transition table
//! - Replies from the backend arrive by id and are applied on a single owner
//! - Editing the evaluated text invalidates the evaluation
//! - Interrupts target the oldest batch still in flight
//! - A scripted replay driver exercises the whole lifecycle without an editor

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Evaluation tracker core
pub mod tracker;

/// Scripted replay against an in-memory host
pub mod replay;

// Re-export key types for convenience
pub use tracker::{EvalOptions, Tracker, TrackerConfig};

/// Current version of evalsync
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
