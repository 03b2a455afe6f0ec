//! Identifiers for evaluations, batches, documents, and windows
//!
//! Evaluation ids are small integers handed to the backend and echoed back in
//! every reply, so they come from a monotonic allocator owned by the tracker.
//! Document and window identities are opaque UUIDs handed out by the host.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a single evaluation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvalId(pub u64);

impl fmt::Display for EvalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by every evaluation submitted in one user action
///
/// Always equal to the id of the first evaluation of the group, so batches
/// order the same way their members were created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl From<EvalId> for BatchId {
    fn from(id: EvalId) -> Self {
        Self(id.0)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque backend session token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a session token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an open document
///
/// A key into the host's document table; holding one never keeps the
/// document alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Create a new random DocumentId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a window (owner of a status bar)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub Uuid);

impl WindowId {
    /// Create a new random WindowId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic evaluation id source
///
/// Ids are never reused for the lifetime of the allocator, regardless of how
/// many evaluations have been erased.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    /// Last issued value before the first allocation
    pub const SEED: u64 = 9;

    /// Create an allocator whose first id is `SEED + 1`
    pub fn new() -> Self {
        Self { last: Self::SEED }
    }

    /// Issue the next id
    pub fn next(&mut self) -> EvalId {
        self.last += 1;
        EvalId(self.last)
    }

    /// Most recently issued id, if any
    pub fn last(&self) -> Option<EvalId> {
        (self.last > Self::SEED).then_some(EvalId(self.last))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
