//! Backend connection seam
//!
//! The tracker assigns ids and hands fully-formed [`Request`]s to a
//! [`Connection`]. Sending is fire-and-forget: the connection owns its own I/O
//! and reports results later as [`Reply`] messages keyed by id.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::ids::{BatchId, EvalId, SessionId};
use super::render::SymbolInfo;

/// Outgoing message to the evaluator backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Evaluate a region of code
    Eval {
        /// Evaluation id echoed in replies
        id: EvalId,
        /// Batch the evaluation belongs to
        batch_id: BatchId,
        /// Code to run (after any transform template)
        code: String,
        /// Zero-based line of the range start
        line: usize,
        /// Zero-based column of the range start
        column: usize,
        /// Maximum printed result length
        print_quota: Option<usize>,
    },
    /// Evaluate a whole document
    LoadFile {
        /// Evaluation id echoed in replies
        id: EvalId,
        /// Full document text
        code: String,
    },
    /// Resolve a symbol
    Lookup {
        /// Evaluation id echoed in replies
        id: EvalId,
        /// Symbol text
        symbol: String,
        /// Namespace to resolve in
        ns: String,
    },
    /// Ask the backend to stop a batch
    Interrupt {
        /// Batch to stop
        batch_id: BatchId,
        /// Representative member of the batch
        id: EvalId,
        /// Session the batch runs in, when known
        session: Option<SessionId>,
    },
}

/// Outgoing side of the backend connection
pub trait Connection {
    /// Queue a request. Never blocks on the backend.
    fn send(&mut self, request: Request);
}

/// Asynchronous completion reported by the backend, keyed by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "kebab-case")]
pub enum Reply {
    /// The backend accepted the request in a session
    Session {
        /// Evaluation id
        id: EvalId,
        /// Backend session token
        session: SessionId,
    },
    /// Evaluation returned a value
    Success {
        /// Evaluation id
        id: EvalId,
        /// Printed value
        value: String,
        /// Time the backend spent evaluating
        #[serde(default, with = "millis")]
        elapsed: Option<Duration>,
    },
    /// Evaluation raised
    Exception {
        /// Evaluation id
        id: EvalId,
        /// Short message
        value: String,
        /// Source file reported by the backend
        #[serde(default)]
        source: Option<String>,
        /// Line reported by the backend
        #[serde(default)]
        line: Option<u32>,
        /// Column reported by the backend
        #[serde(default)]
        column: Option<u32>,
        /// Extended trace text
        #[serde(default)]
        trace: Option<String>,
    },
    /// Symbol lookup answered; `None` when nothing was found
    Lookup {
        /// Evaluation id
        id: EvalId,
        /// Symbol metadata
        #[serde(default)]
        info: Option<SymbolInfo>,
    },
    /// Backend finished with an id or with a whole batch
    Done {
        /// Evaluation id or batch id
        token: u64,
    },
}

impl Reply {
    /// Evaluation the reply targets, if it names a single one
    pub fn id(&self) -> Option<EvalId> {
        match self {
            Reply::Session { id, .. }
            | Reply::Success { id, .. }
            | Reply::Exception { id, .. }
            | Reply::Lookup { id, .. } => Some(*id),
            Reply::Done { .. } => None,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Connection that records every request
///
/// Clones share the same log, so a test can keep one handle while the
/// tracker owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnection {
    sent: Arc<Mutex<Vec<Request>>>,
}

impl RecordingConnection {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every request sent so far
    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    /// Interrupt requests sent so far
    pub fn interrupts(&self) -> Vec<Request> {
        self.sent
            .lock()
            .iter()
            .filter(|request| matches!(request, Request::Interrupt { .. }))
            .cloned()
            .collect()
    }

    /// Drain the log
    pub fn take(&self) -> Vec<Request> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Connection for RecordingConnection {
    fn send(&mut self, request: Request) {
        tracing::trace!(?request, "recorded request");
        self.sent.lock().push(request);
    }
}
