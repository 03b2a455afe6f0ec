//! Evaluation registry and lookups
//!
//! The registry owns every live [`Evaluation`]. Inline evaluations are indexed
//! twice, by id and by owning document; both indexes change together in
//! [`EvalRegistry::insert`] and [`EvalRegistry::remove`] and nowhere else.
//! Each window may additionally hold one status-bar evaluation, which lives
//! outside both indexes but is found by id like any other.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::eval::{Evaluation, Placement};
use super::host::DocumentHost;
use super::ids::{DocumentId, EvalId, WindowId};
use super::range::TextRange;
use super::status::EvalStatus;

/// Extent of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Inline evaluations of one document
    Document(DocumentId),
    /// Every evaluation, status-bar ones included
    All,
}

/// Process-wide index of live evaluations
#[derive(Debug, Default)]
pub struct EvalRegistry {
    evals: BTreeMap<EvalId, Evaluation>,
    by_document: HashMap<DocumentId, BTreeSet<EvalId>>,
    status_evals: HashMap<WindowId, Evaluation>,
}

impl EvalRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an evaluation.
    ///
    /// A status-bar evaluation replaces the window's previous one, which is
    /// handed back so the caller can release it.
    pub(crate) fn insert(&mut self, eval: Evaluation) -> Option<Evaluation> {
        match eval.placement() {
            Placement::Inline { document, .. } => {
                self.by_document.entry(document).or_default().insert(eval.id());
                self.evals.insert(eval.id(), eval)
            }
            Placement::StatusBar { window } => self.status_evals.insert(window, eval),
        }
    }

    /// Remove an evaluation from every index.
    pub(crate) fn remove(&mut self, id: EvalId) -> Option<Evaluation> {
        if let Some(eval) = self.evals.remove(&id) {
            if let Some(document) = eval.document() {
                if let Some(ids) = self.by_document.get_mut(&document) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        self.by_document.remove(&document);
                    }
                }
            }
            return Some(eval);
        }

        let window = self
            .status_evals
            .iter()
            .find(|(_, eval)| eval.id() == id)
            .map(|(window, _)| *window)?;
        self.status_evals.remove(&window)
    }

    /// Find an evaluation by id, status-bar evaluations included.
    pub fn find_by_id(&self, id: EvalId) -> Option<&Evaluation> {
        self.status_evals
            .values()
            .find(|eval| eval.id() == id)
            .or_else(|| self.evals.get(&id))
    }

    pub(crate) fn find_by_id_mut(&mut self, id: EvalId) -> Option<&mut Evaluation> {
        if let Some(eval) = self.status_evals.values_mut().find(|eval| eval.id() == id) {
            return Some(eval);
        }
        self.evals.get_mut(&id)
    }

    /// First evaluation in `document` whose range touches `range`.
    pub fn find_by_range<H: DocumentHost + ?Sized>(
        &self,
        host: &H,
        document: DocumentId,
        range: TextRange,
    ) -> Option<EvalId> {
        self.document_ids(document).into_iter().find(|id| {
            self.evals
                .get(id)
                .and_then(Evaluation::handle)
                .and_then(|handle| host.resolve(handle))
                .is_some_and(|resolved| resolved.touches(&range))
        })
    }

    /// Evaluations in `document` with `status`.
    ///
    /// The document index is copied now; statuses are checked as the scan is
    /// walked, so evaluations erased in the meantime are skipped.
    pub fn find_by_status(&self, document: DocumentId, status: EvalStatus) -> StatusScan {
        StatusScan {
            ids: self.document_ids(document),
            status,
        }
    }

    /// Status-bar evaluation of a window
    pub fn status_eval(&self, window: WindowId) -> Option<&Evaluation> {
        self.status_evals.get(&window)
    }

    /// Snapshot of the ids in `scope`, in creation order.
    pub fn ids_in_scope(&self, scope: Scope) -> Vec<EvalId> {
        match scope {
            Scope::Document(document) => self.document_ids(document),
            Scope::All => {
                let mut ids: Vec<EvalId> = self.evals.keys().copied().collect();
                ids.extend(self.status_evals.values().map(Evaluation::id));
                ids
            }
        }
    }

    /// Snapshot of the inline ids of `document`, in creation order.
    pub fn document_ids(&self, document: DocumentId) -> Vec<EvalId> {
        self.by_document
            .get(&document)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Iterate over every live evaluation, status-bar ones last.
    pub fn iter(&self) -> impl Iterator<Item = &Evaluation> {
        self.evals.values().chain(self.status_evals.values())
    }

    /// Number of live evaluations, status-bar ones included
    pub fn len(&self) -> usize {
        self.evals.len() + self.status_evals.len()
    }

    /// True when nothing is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of documents that currently own evaluations
    pub fn document_count(&self) -> usize {
        self.by_document.len()
    }
}

/// Restartable scan over evaluations with a given status
#[derive(Debug, Clone)]
pub struct StatusScan {
    ids: Vec<EvalId>,
    status: EvalStatus,
}

impl StatusScan {
    /// Walk the scan against the live registry. May be called repeatedly.
    pub fn iter<'r>(
        &'r self,
        registry: &'r EvalRegistry,
    ) -> impl Iterator<Item = &'r Evaluation> + 'r {
        self.ids
            .iter()
            .filter_map(|id| registry.evals.get(id))
            .filter(|eval| eval.status() == self.status)
    }

    /// Matching ids at the time of the call.
    pub fn ids(&self, registry: &EvalRegistry) -> Vec<EvalId> {
        self.iter(registry).map(Evaluation::id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::host::MemoryHost;
    use crate::tracker::ids::BatchId;
    use crate::tracker::status::EvalEvent;

    fn inline(
        host: &mut MemoryHost,
        document: DocumentId,
        id: u64,
        range: TextRange,
    ) -> Evaluation {
        let handle = host.track(document, range);
        Evaluation::new(
            EvalId(id),
            BatchId(id),
            Placement::Inline { document, handle },
            String::new(),
            None,
            false,
        )
    }

    #[test]
    fn test_insert_and_remove_keep_indexes_together() {
        let mut host = MemoryHost::new();
        let doc = host.open(WindowId::new(), "(+ 1 2)\n(+ 3 4)\n");
        let mut registry = EvalRegistry::new();

        registry.insert(inline(&mut host, doc, 10, TextRange::new(0, 7)));
        registry.insert(inline(&mut host, doc, 11, TextRange::new(8, 15)));
        assert_eq!(registry.document_ids(doc), vec![EvalId(10), EvalId(11)]);

        let removed = registry.remove(EvalId(10)).unwrap();
        assert_eq!(removed.id(), EvalId(10));
        assert_eq!(registry.document_ids(doc), vec![EvalId(11)]);
        assert!(registry.find_by_id(EvalId(10)).is_none());

        registry.remove(EvalId(11));
        assert_eq!(registry.document_count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_by_id_includes_status_bar() {
        let window = WindowId::new();
        let mut registry = EvalRegistry::new();
        registry.insert(Evaluation::new(
            EvalId(20),
            BatchId(20),
            Placement::StatusBar { window },
            String::new(),
            None,
            false,
        ));

        assert_eq!(registry.find_by_id(EvalId(20)).map(Evaluation::id), Some(EvalId(20)));
        assert_eq!(registry.ids_in_scope(Scope::All), vec![EvalId(20)]);
        assert!(registry.remove(EvalId(20)).is_some());
        assert!(registry.status_eval(window).is_none());
    }

    #[test]
    fn test_find_by_range_touches() {
        let mut host = MemoryHost::new();
        let doc = host.open(WindowId::new(), "(+ 1 2) (+ 3 4)");
        let mut registry = EvalRegistry::new();
        registry.insert(inline(&mut host, doc, 10, TextRange::new(0, 7)));
        registry.insert(inline(&mut host, doc, 11, TextRange::new(8, 15)));

        assert_eq!(registry.find_by_range(&host, doc, TextRange::point(7)), Some(EvalId(10)));
        assert_eq!(registry.find_by_range(&host, doc, TextRange::point(12)), Some(EvalId(11)));
        assert_eq!(registry.find_by_range(&host, DocumentId::new(), TextRange::point(1)), None);
    }

    #[test]
    fn test_status_scan_is_restartable_and_skips_erased() {
        let mut host = MemoryHost::new();
        let doc = host.open(WindowId::new(), "a\nb\nc\n");
        let mut registry = EvalRegistry::new();
        for (i, start) in [0usize, 2, 4].into_iter().enumerate() {
            let range = TextRange::new(start, start + 1);
            registry.insert(inline(&mut host, doc, 10 + i as u64, range));
        }
        registry
            .find_by_id_mut(EvalId(11))
            .unwrap()
            .transition(EvalEvent::Interrupt)
            .unwrap();

        let scan = registry.find_by_status(doc, EvalStatus::Pending);
        assert_eq!(scan.ids(&registry), vec![EvalId(10), EvalId(12)]);
        assert_eq!(scan.ids(&registry), vec![EvalId(10), EvalId(12)]);

        registry.remove(EvalId(12));
        assert_eq!(scan.ids(&registry), vec![EvalId(10)]);
    }
}
