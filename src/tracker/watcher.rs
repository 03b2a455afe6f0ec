//! Invalidation on document edits
//!
//! The host reports each batch of edits as the ranges they changed, already
//! expressed in post-edit coordinates. An evaluation goes away when its range
//! collapsed, or when an edit touched it and the text under it no longer
//! matches what was evaluated.

use super::Tracker;
use super::connection::Connection;
use super::host::DocumentHost;
use super::ids::DocumentId;
use super::range::{Bias, TextEdit, TextRange};
use super::registry::Scope;

/// Spans changed by a batch of edits applied in order, in the coordinates of
/// the text after the last edit, sorted and merged.
pub fn changed_ranges(edits: &[TextEdit]) -> Vec<TextRange> {
    let mut spans: Vec<TextRange> = Vec::with_capacity(edits.len());
    for edit in edits {
        for span in spans.iter_mut() {
            *span = widen_through(*span, edit);
        }
        spans.push(edit.changed());
    }
    spans.sort_by_key(|span| (span.start, span.end));

    let mut merged: Vec<TextRange> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if last.touches(&span) => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

// A changed span keeps covering whatever a later edit put at its edges.
fn widen_through(span: TextRange, edit: &TextEdit) -> TextRange {
    TextRange::new(
        edit.map_pos(span.start, Bias::Left),
        edit.map_pos(span.end, Bias::Right),
    )
}

impl<H: DocumentHost, C: Connection> Tracker<H, C> {
    /// Invalidate evaluations in `document` after edits covering `changes`.
    ///
    /// Safe to call repeatedly for the same edits. Returns the number erased.
    pub fn on_text_changed(&mut self, document: DocumentId, changes: &[TextRange]) -> usize {
        let erased = self.erase_where(Scope::Document(document), |eval, host| {
            let Some(handle) = eval.handle() else {
                return false;
            };
            let Some(range) = host.resolve(handle) else {
                return true;
            };
            changes.iter().any(|change| change.touches(&range))
                && host.substr(document, range).as_deref() != Some(eval.code())
        });

        if erased > 0 {
            tracing::debug!(document = %document, erased, "invalidated by edit");
        }
        erased
    }

    /// Erase everything anchored in a closed document.
    pub fn on_document_closed(&mut self, document: DocumentId) -> usize {
        let erased = self.erase_where(Scope::Document(document), |_, _| true);
        tracing::debug!(document = %document, erased, "document closed");
        erased
    }
}
