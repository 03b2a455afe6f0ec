//! Batch interrupt cascade and batch-wide completion
//!
//! Evaluations submitted together share a [`BatchId`] equal to the id of the
//! first member. Interrupts always target the oldest batch still in flight,
//! and the backend is told once per batch.

use super::Tracker;
use super::connection::{Connection, Request};
use super::eval::Evaluation;
use super::host::DocumentHost;
use super::ids::{BatchId, DocumentId, EvalId, WindowId};
use super::status::{EvalEvent, EvalStatus};

impl<H: DocumentHost, C: Connection> Tracker<H, C> {
    /// Interrupt the oldest in-flight batch.
    ///
    /// Candidates are the pending evaluations of `document` plus the
    /// status-bar evaluation of `window` while it is pending. Every
    /// candidate in the lowest batch moves to `interrupt`, and exactly one
    /// interrupt request naming the batch and its first member is sent.
    pub fn interrupt_oldest(
        &mut self,
        window: Option<WindowId>,
        document: DocumentId,
    ) -> Option<BatchId> {
        let mut candidates: Vec<(BatchId, EvalId)> = self
            .registry
            .find_by_status(document, EvalStatus::Pending)
            .iter(&self.registry)
            .map(|eval| (eval.batch_id(), eval.id()))
            .collect();

        if let Some(status_eval) = window
            .and_then(|window| self.registry.status_eval(window))
            .filter(|eval| eval.status() == EvalStatus::Pending)
        {
            candidates.push((status_eval.batch_id(), status_eval.id()));
        }

        let (batch_id, representative) = candidates.iter().copied().min()?;
        let session = self
            .registry
            .find_by_id(representative)
            .and_then(Evaluation::session)
            .cloned();

        tracing::info!(batch = %batch_id, id = %representative, "interrupting batch");
        self.conn.send(Request::Interrupt {
            batch_id,
            id: representative,
            session,
        });

        for (_, id) in candidates.into_iter().filter(|(batch, _)| *batch == batch_id) {
            let Some(eval) = self.registry.find_by_id_mut(id) else {
                continue;
            };
            match eval.transition(EvalEvent::Interrupt) {
                Ok(_) => self.render(id),
                Err(err) => tracing::debug!("{}", err),
            }
        }

        Some(batch_id)
    }

    /// Backend finished with `token`: a single evaluation id, or failing that
    /// a whole batch. Anything resolved that is still in flight was abandoned
    /// and gets erased.
    pub fn on_done(&mut self, token: u64) {
        let resolved: Vec<EvalId> = match self.registry.find_by_id(EvalId(token)) {
            Some(eval) => vec![eval.id()],
            None => self
                .registry
                .iter()
                .filter(|eval| eval.batch_id() == BatchId(token))
                .map(Evaluation::id)
                .collect(),
        };

        if resolved.is_empty() {
            tracing::trace!(token, "done for unknown id or batch");
            return;
        }

        for id in resolved {
            let in_flight = self
                .registry
                .find_by_id(id)
                .is_some_and(|eval| eval.status().is_in_flight());
            if in_flight {
                tracing::debug!(id = %id, "abandoned by backend");
                self.erase(id);
            }
        }
    }
}
