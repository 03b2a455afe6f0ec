//! Error types for the evaluation tracker
//!
//! Domain errors use thiserror. Most of them never reach a caller: the
//! lifecycle code logs and drops stale or out-of-order replies, and only the
//! configuration and replay boundaries propagate failures.

use std::io;
use thiserror::Error;

use super::ids::EvalId;
use super::status::{EvalEvent, EvalStatus};

/// Errors surfaced by the replay boundary
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Unknown document referenced by a caller
    #[error("Document '{0}' not found")]
    DocumentNotFound(String),

    /// Malformed replay script
    #[error("Script error at line {line}: {detail}")]
    Script {
        /// 1-based line number in the script
        line: usize,
        /// Description of the problem
        detail: String,
    },
}

/// State machine violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event is not accepted in the current status
    #[error("Evaluation {id}: cannot apply {event:?} while {from}")]
    Illegal {
        /// Evaluation that rejected the event
        id: EvalId,
        /// Status at the time of the event
        from: EvalStatus,
        /// Rejected event
        event: EvalEvent,
    },

    /// A session was reported for an evaluation that already has one
    #[error("Evaluation {0}: session already set")]
    SessionAlreadySet(EvalId),

    /// A session was reported after the evaluation left `pending`
    #[error("Evaluation {id}: session reported while {status}")]
    SessionNotPending {
        /// Evaluation the session was reported for
        id: EvalId,
        /// Status at the time of the report
        status: EvalStatus,
    },
}

/// Convenience result alias for state machine operations
pub type TransitionResult<T> = std::result::Result<T, TransitionError>;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value failed validation
    #[error("Invalid value for '{field}': {detail}")]
    Invalid {
        /// Offending field name
        field: &'static str,
        /// Why it was rejected
        detail: String,
    },
}

/// Convenience result alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
