//! The evaluation entity
//!
//! An [`Evaluation`] ties together the id the backend echoes back, the range
//! of source it covers, the batch it was submitted with, and whatever the
//! backend eventually returned. Status only moves through
//! [`Evaluation::transition`], which defers to the table in
//! [`super::status`].

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::TrackerConfig;
use super::error::{TransitionError, TransitionResult};
use super::host::{Annotation, OverlayId, RangeHandle};
use super::ids::{BatchId, DocumentId, EvalId, SessionId, WindowId};
use super::range::TextRange;
use super::render::{self, escape};
use super::status::{EvalEvent, EvalStatus};

/// Label shown while an interrupt is outstanding
pub const INTERRUPTING_LABEL: &str = "Interrupting...";

/// Completion hook, called at most once
pub type FinishHook = Box<dyn FnOnce(&Evaluation) + Send>;

static FAIL_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":fail\s+[1-9]\d*").expect("valid fail-count pattern"));
static ERROR_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":error\s+[1-9]\d*").expect("valid error-count pattern"));

/// True if a returned value reports a nonzero `:fail` or `:error` count.
///
/// This is a plain text scan, so a value that merely contains such a marker
/// in its data is classified as a failure too.
pub fn reports_failure(value: &str) -> bool {
    FAIL_COUNT.is_match(value) || ERROR_COUNT.is_match(value)
}

/// Where an evaluation is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Annotated inline over a tracked range
    Inline {
        /// Owning document
        document: DocumentId,
        /// Host range handle
        handle: RangeHandle,
    },
    /// Shown in a window's status bar
    StatusBar {
        /// Owning window
        window: WindowId,
    },
}

/// Location details attached to an exception reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    /// Source file
    pub source: Option<String>,
    /// Line
    pub line: Option<u32>,
    /// Column
    pub column: Option<u32>,
    /// Extended trace
    pub trace: Option<String>,
}

/// One evaluation request and its outcome
pub struct Evaluation {
    id: EvalId,
    batch_id: BatchId,
    placement: Placement,
    status: EvalStatus,
    code: String,
    session: Option<SessionId>,
    value: Option<String>,
    elapsed: Option<Duration>,
    exception: Option<ExceptionInfo>,
    pub(crate) overlay: Option<OverlayId>,
    on_finish: Option<FinishHook>,
    expand_on_finish: bool,
    created_at: DateTime<Utc>,
}

impl Evaluation {
    pub(crate) fn new(
        id: EvalId,
        batch_id: BatchId,
        placement: Placement,
        code: String,
        on_finish: Option<FinishHook>,
        expand_on_finish: bool,
    ) -> Self {
        Self {
            id,
            batch_id,
            placement,
            status: EvalStatus::Pending,
            code,
            session: None,
            value: None,
            elapsed: None,
            exception: None,
            overlay: None,
            on_finish,
            expand_on_finish,
            created_at: Utc::now(),
        }
    }

    /// Evaluation id
    pub fn id(&self) -> EvalId {
        self.id
    }

    /// Batch id (own id when submitted alone)
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Display placement
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Owning document, for inline evaluations
    pub fn document(&self) -> Option<DocumentId> {
        match self.placement {
            Placement::Inline { document, .. } => Some(document),
            Placement::StatusBar { .. } => None,
        }
    }

    /// Range handle, for inline evaluations
    pub fn handle(&self) -> Option<RangeHandle> {
        match self.placement {
            Placement::Inline { handle, .. } => Some(handle),
            Placement::StatusBar { .. } => None,
        }
    }

    /// Current status
    pub fn status(&self) -> EvalStatus {
        self.status
    }

    /// Source text captured at creation
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Backend session, once reported
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Returned value or exception message
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Backend-reported evaluation time
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Exception details, present only in `exception`
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }

    /// Extended trace, present only in `exception`
    pub fn trace(&self) -> Option<&str> {
        self.exception.as_ref()?.trace.as_deref()
    }

    /// Whether a detail overlay is open
    pub fn overlay_open(&self) -> bool {
        self.overlay.is_some()
    }

    /// Whether the detail overlay opens on successful completion
    pub fn expand_on_finish(&self) -> bool {
        self.expand_on_finish
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply an event and return the new status.
    pub(crate) fn transition(&mut self, event: EvalEvent) -> TransitionResult<EvalStatus> {
        let next = self.status.apply(self.id, event)?;
        tracing::debug!(id = %self.id, from = %self.status, to = %next, "evaluation transition");
        self.status = next;
        Ok(next)
    }

    pub(crate) fn complete(
        &mut self,
        value: String,
        elapsed: Option<Duration>,
    ) -> TransitionResult<EvalStatus> {
        let failed = reports_failure(&value);
        let status = self.transition(EvalEvent::Reply { failed })?;
        self.value = Some(value);
        self.elapsed = elapsed;
        Ok(status)
    }

    pub(crate) fn raise(
        &mut self,
        value: String,
        info: ExceptionInfo,
    ) -> TransitionResult<EvalStatus> {
        let status = self.transition(EvalEvent::Raise)?;
        self.value = Some(value);
        self.exception = Some(info);
        Ok(status)
    }

    pub(crate) fn set_session(&mut self, session: SessionId) -> TransitionResult<()> {
        if self.session.is_some() {
            return Err(TransitionError::SessionAlreadySet(self.id));
        }
        if self.status != EvalStatus::Pending {
            return Err(TransitionError::SessionNotPending {
                id: self.id,
                status: self.status,
            });
        }
        self.session = Some(session);
        Ok(())
    }

    pub(crate) fn take_finish_hook(&mut self) -> Option<FinishHook> {
        self.on_finish.take()
    }

    /// Unescaped label for the current status, `None` for a bare range.
    pub fn label(&self, config: &TrackerConfig, phase: &str) -> Option<String> {
        match self.status {
            EvalStatus::Pending => Some(phase.to_string()),
            EvalStatus::Interrupt => Some(INTERRUPTING_LABEL.to_string()),
            EvalStatus::Lookup => None,
            EvalStatus::Success | EvalStatus::Failure | EvalStatus::Exception => {
                let value = self.value.as_deref().filter(|v| !v.is_empty())?;
                match render::format_elapsed(self.elapsed, config.elapsed_threshold()) {
                    Some(time) => Some(format!("{} {}", time, value)),
                    None => Some(value.to_string()),
                }
            }
        }
    }

    /// Inline decoration for the current status.
    pub fn annotation(&self, config: &TrackerConfig, phase: &str) -> Annotation {
        Annotation {
            scope: scope_for(self.status).to_string(),
            color: config.colors.get(self.status.as_str()).cloned(),
            label: self.label(config, phase).map(|label| escape(&label)),
        }
    }
}

impl fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluation")
            .field("id", &self.id)
            .field("batch_id", &self.batch_id)
            .field("placement", &self.placement)
            .field("status", &self.status)
            .field("code", &self.code)
            .field("session", &self.session)
            .field("value", &self.value)
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

/// Style scope used for a status
pub fn scope_for(status: EvalStatus) -> &'static str {
    match status {
        EvalStatus::Pending | EvalStatus::Interrupt | EvalStatus::Lookup => "region.bluish",
        EvalStatus::Success => "region.greenish",
        EvalStatus::Failure | EvalStatus::Exception => "region.redish",
    }
}

/// Serializable view of an evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSnapshot {
    /// Evaluation id
    pub id: EvalId,
    /// Batch id
    pub batch_id: BatchId,
    /// Status
    pub status: EvalStatus,
    /// Captured source text
    pub code: String,
    /// Returned value or message
    pub value: Option<String>,
    /// Backend session
    pub session: Option<SessionId>,
    /// Whether a detail overlay is open
    pub overlay_open: bool,
    /// Owning document for inline evaluations
    pub document: Option<DocumentId>,
    /// Owning window for status-bar evaluations
    pub window: Option<WindowId>,
    /// Current range, if it still resolves
    pub range: Option<TextRange>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl EvalSnapshot {
    pub(crate) fn of(eval: &Evaluation, range: Option<TextRange>) -> Self {
        let window = match eval.placement {
            Placement::StatusBar { window } => Some(window),
            Placement::Inline { .. } => None,
        };
        Self {
            id: eval.id,
            batch_id: eval.batch_id,
            status: eval.status,
            code: eval.code.clone(),
            value: eval.value.clone(),
            session: eval.session.clone(),
            overlay_open: eval.overlay_open(),
            document: eval.document(),
            window,
            range,
            created_at: eval.created_at(),
        }
    }
}
