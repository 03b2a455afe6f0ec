//! Completion callbacks and detail overlays
//!
//! Every callback takes an id the backend echoes back. An id that is no longer
//! live (erased by an edit, a clear, or a newer evaluation on the same line)
//! is expected and dropped quietly, as is a reply the state machine rejects.

use super::connection::{Connection, Reply};
use super::eval::{ExceptionInfo, Placement};
use super::host::DocumentHost;
use super::ids::{EvalId, SessionId};
use super::range::TextRange;
use super::render::{self, OverlayKind, SymbolInfo};
use super::status::{EvalEvent, EvalStatus};
use super::Tracker;
use serde::Serialize;
use std::time::Duration;

/// Result of a toggle request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// An overlay was opened
    Opened,
    /// The open overlay was closed
    Closed,
    /// The evaluation was erased (lookups close by going away)
    Erased,
    /// Nothing was under the cursor, so a symbol lookup went out instead
    LookupRequested(EvalId),
    /// Nothing to show for this evaluation
    Unavailable,
}

impl<H: DocumentHost, C: Connection> Tracker<H, C> {
    /// Route a backend reply to its callback.
    pub fn handle_reply(&mut self, reply: Reply) {
        tracing::trace!(id = ?reply.id(), "reply received");
        match reply {
            Reply::Session { id, session } => self.on_session(id, session),
            Reply::Success { id, value, elapsed } => self.on_success(id, value, elapsed),
            Reply::Exception {
                id,
                value,
                source,
                line,
                column,
                trace,
            } => self.on_exception(
                id,
                value,
                ExceptionInfo {
                    source,
                    line,
                    column,
                    trace,
                },
            ),
            Reply::Lookup { id, info } => self.on_lookup(id, info),
            Reply::Done { token } => self.on_done(token),
        }
    }

    /// Record the backend session an evaluation runs in.
    pub fn on_session(&mut self, id: EvalId, session: SessionId) {
        let Some(eval) = self.registry.find_by_id_mut(id) else {
            tracing::debug!(id = %id, "session for stale evaluation");
            return;
        };
        if let Err(err) = eval.set_session(session) {
            tracing::debug!("{}", err);
        }
    }

    /// A value came back. Classified as `failure` when it reports a nonzero
    /// fail/error count, `success` otherwise.
    pub fn on_success(&mut self, id: EvalId, value: String, elapsed: Option<Duration>) {
        let Some(eval) = self.registry.find_by_id_mut(id) else {
            tracing::debug!(id = %id, "success for stale evaluation");
            return;
        };
        match eval.complete(value, elapsed) {
            Ok(status) => self.finish(id, status),
            Err(err) => tracing::debug!("Ignoring reply: {}", err),
        }
    }

    /// The evaluation raised.
    pub fn on_exception(&mut self, id: EvalId, value: String, info: ExceptionInfo) {
        let Some(eval) = self.registry.find_by_id_mut(id) else {
            tracing::debug!(id = %id, "exception for stale evaluation");
            return;
        };
        match eval.raise(value, info) {
            Ok(status) => self.finish(id, status),
            Err(err) => tracing::debug!("Ignoring reply: {}", err),
        }
    }

    /// A symbol lookup came back; show its metadata below the symbol.
    pub fn on_lookup(&mut self, id: EvalId, info: Option<SymbolInfo>) {
        let Some(eval) = self.registry.find_by_id_mut(id) else {
            tracing::debug!(id = %id, "lookup for stale evaluation");
            return;
        };
        match eval.transition(EvalEvent::LookupResolved) {
            Ok(status) => {
                self.open_overlay(id, render::lookup_body(info.as_ref()));
                self.finish(id, status);
            }
            Err(err) => tracing::debug!("Ignoring reply: {}", err),
        }
    }

    fn finish(&mut self, id: EvalId, status: EvalStatus) {
        self.render(id);

        let Some(eval) = self.registry.find_by_id_mut(id) else {
            return;
        };
        let hook = eval.take_finish_hook();
        let expand = eval.expand_on_finish() && status.is_completed_eval();

        if let Some(hook) = hook {
            if let Some(eval) = self.registry.find_by_id(id) {
                hook(eval);
            }
        }
        if expand && !self.eval(id).is_some_and(|eval| eval.overlay_open()) {
            self.toggle_overlay(id);
        }
    }

    /// Show or hide the detail overlay of an evaluation.
    ///
    /// Successful values are re-wrapped, failures are shown as errors,
    /// exceptions show their trace, and a lookup is erased outright.
    pub fn toggle_overlay(&mut self, id: EvalId) -> ToggleOutcome {
        let Some(status) = self.registry.find_by_id(id).map(|eval| eval.status()) else {
            return ToggleOutcome::Unavailable;
        };

        if status == EvalStatus::Lookup {
            self.erase(id);
            return ToggleOutcome::Erased;
        }
        if self.close_overlay(id) {
            return ToggleOutcome::Closed;
        }

        let width = self.config.wrap_width;
        let body = self.registry.find_by_id(id).and_then(|eval| match status {
            EvalStatus::Success => eval
                .value()
                .map(|value| render::detail_body(value, OverlayKind::Value, width)),
            EvalStatus::Failure => eval
                .value()
                .map(|value| render::detail_body(value, OverlayKind::Failure, width)),
            EvalStatus::Exception => eval
                .trace()
                .map(|trace| render::detail_body(trace, OverlayKind::Trace, width)),
            EvalStatus::Pending | EvalStatus::Interrupt | EvalStatus::Lookup => None,
        });

        self.show(id, body)
    }

    /// Show or hide the exception trace, whatever toggle-info would do.
    ///
    /// Evaluations without a trace are left alone.
    pub fn toggle_trace(&mut self, id: EvalId) -> ToggleOutcome {
        let width = self.config.wrap_width;
        let Some(body) = self
            .registry
            .find_by_id(id)
            .and_then(|eval| eval.trace())
            .map(|trace| render::detail_body(trace, OverlayKind::Trace, width))
        else {
            return ToggleOutcome::Unavailable;
        };

        if self.close_overlay(id) {
            return ToggleOutcome::Closed;
        }
        self.show(id, Some(body))
    }

    fn show(&mut self, id: EvalId, body: Option<String>) -> ToggleOutcome {
        match body {
            Some(body) => {
                if self.open_overlay(id, body) {
                    ToggleOutcome::Opened
                } else {
                    ToggleOutcome::Unavailable
                }
            }
            None => ToggleOutcome::Unavailable,
        }
    }

    fn close_overlay(&mut self, id: EvalId) -> bool {
        let Some(overlay) = self
            .registry
            .find_by_id_mut(id)
            .and_then(|eval| eval.overlay.take())
        else {
            return false;
        };
        self.host.close_overlay(overlay);
        true
    }

    /// Open an overlay at the start of the line below the evaluated range.
    fn open_overlay(&mut self, id: EvalId, body: String) -> bool {
        let Some(eval) = self.registry.find_by_id(id) else {
            return false;
        };
        let Placement::Inline { document, handle } = eval.placement() else {
            return false;
        };
        let Some(range) = self.host.resolve(handle) else {
            tracing::trace!(id = %id, "range unresolved, no overlay");
            return false;
        };
        let Some(line) = self.host.line(document, TextRange::point(range.end)) else {
            return false;
        };

        if let Some(previous) = self
            .registry
            .find_by_id_mut(id)
            .and_then(|eval| eval.overlay.take())
        {
            self.host.close_overlay(previous);
        }
        let overlay = self.host.open_overlay(document, line.start, body);
        if let Some(eval) = self.registry.find_by_id_mut(id) {
            eval.overlay = Some(overlay);
        }
        true
    }
}
