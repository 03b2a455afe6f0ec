//! Document substrate seam
//!
//! The tracker never owns documents. It talks to the editing substrate through
//! [`DocumentHost`]: sticky range handles, inline annotations, block overlays,
//! and the per-window status text. [`MemoryHost`] is a rope-backed
//! implementation used by the replay driver and the tests.

use ropey::Rope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::{DocumentId, WindowId};
use super::range::{CharIdx, TextEdit, TextRange};

/// Handle to a range tracked by the host across edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeHandle(pub u64);

/// Handle to an open overlay panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

/// Inline decoration drawn over a tracked range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Style scope name
    pub scope: String,
    /// Explicit color override
    pub color: Option<String>,
    /// Escaped label text; `None` draws a bare outline
    pub label: Option<String>,
}

/// Editing substrate consumed by the tracker
pub trait DocumentHost {
    /// Start tracking `range` in `document`.
    fn track(&mut self, document: DocumentId, range: TextRange) -> RangeHandle;

    /// Current position of a tracked range, or `None` once it is gone.
    fn resolve(&self, handle: RangeHandle) -> Option<TextRange>;

    /// Stop tracking and remove any annotation.
    fn untrack(&mut self, handle: RangeHandle);

    /// Replace the decoration of a tracked range.
    fn set_annotation(&mut self, handle: RangeHandle, annotation: Annotation);

    /// Remove the decoration but keep tracking the range.
    fn clear_annotation(&mut self, handle: RangeHandle);

    /// Current text under `range`.
    fn substr(&self, document: DocumentId, range: TextRange) -> Option<String>;

    /// Span of the full lines covered by `range`, excluding the final newline.
    fn line(&self, document: DocumentId, range: TextRange) -> Option<TextRange>;

    /// Zero-based line and column of `pos`.
    fn line_col(&self, document: DocumentId, pos: CharIdx) -> Option<(usize, usize)>;

    /// Document length in characters.
    fn char_count(&self, document: DocumentId) -> Option<usize>;

    /// Window that displays `document`.
    fn window_of(&self, document: DocumentId) -> Option<WindowId>;

    /// Open a block overlay below `anchor`.
    fn open_overlay(&mut self, document: DocumentId, anchor: CharIdx, body: String) -> OverlayId;

    /// Close an overlay. Unknown ids are ignored.
    fn close_overlay(&mut self, overlay: OverlayId);

    /// Set or clear the status-bar text of a window.
    fn set_status(&mut self, window: WindowId, text: Option<String>);
}

/// Overlay panel recorded by [`MemoryHost`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlay {
    /// Owning document
    pub document: DocumentId,
    /// Anchor point (start of the line below the evaluated range)
    pub anchor: CharIdx,
    /// Rendered body
    pub body: String,
}

struct Document {
    window: WindowId,
    text: Rope,
}

struct Tracked {
    document: DocumentId,
    range: TextRange,
    collapsed: bool,
    annotation: Option<Annotation>,
}

/// In-memory editing substrate
#[derive(Default)]
pub struct MemoryHost {
    documents: HashMap<DocumentId, Document>,
    tracked: HashMap<RangeHandle, Tracked>,
    overlays: HashMap<OverlayId, Overlay>,
    status: HashMap<WindowId, String>,
    next_handle: u64,
    next_overlay: u64,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a document with initial text in `window`.
    pub fn open(&mut self, window: WindowId, text: &str) -> DocumentId {
        let id = DocumentId::new();
        self.documents.insert(
            id,
            Document {
                window,
                text: Rope::from_str(text),
            },
        );
        id
    }

    /// Drop a document together with everything anchored in it.
    pub fn close(&mut self, document: DocumentId) {
        self.documents.remove(&document);
        self.tracked.retain(|_, tracked| tracked.document != document);
        self.overlays.retain(|_, overlay| overlay.document != document);
    }

    /// Replace `range` with `text`, shifting every tracked range in the document.
    ///
    /// Returns the applied edit, or `None` for an unknown document.
    pub fn edit(&mut self, document: DocumentId, range: TextRange, text: &str) -> Option<TextEdit> {
        let doc = self.documents.get_mut(&document)?;
        let len = doc.text.len_chars();
        let replaced = TextRange::new(range.start.min(len), range.end.min(len));

        doc.text.remove(replaced.start..replaced.end);
        doc.text.insert(replaced.start, text);

        let edit = TextEdit {
            replaced,
            inserted: text.chars().count(),
        };

        for tracked in self.tracked.values_mut() {
            if tracked.document != document || tracked.collapsed {
                continue;
            }
            let mapped = tracked.range.map_through(&edit);
            tracked.collapsed = mapped.is_empty() && !tracked.range.is_empty();
            tracked.range = mapped;
        }

        Some(edit)
    }

    /// Full text of a document.
    pub fn text(&self, document: DocumentId) -> Option<String> {
        self.documents.get(&document).map(|doc| doc.text.to_string())
    }

    /// Current decoration of a tracked range.
    pub fn annotation(&self, handle: RangeHandle) -> Option<&Annotation> {
        self.tracked.get(&handle)?.annotation.as_ref()
    }

    /// Look up an open overlay.
    pub fn overlay(&self, overlay: OverlayId) -> Option<&Overlay> {
        self.overlays.get(&overlay)
    }

    /// Number of open overlays.
    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    /// Number of tracked ranges (live or collapsed).
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Status-bar text of a window.
    pub fn status(&self, window: WindowId) -> Option<&str> {
        self.status.get(&window).map(String::as_str)
    }

    fn line_bounds(text: &Rope, pos: CharIdx) -> (CharIdx, CharIdx) {
        let pos = pos.min(text.len_chars());
        let line_idx = text.char_to_line(pos);
        let start = text.line_to_char(line_idx);
        let line = text.line(line_idx);
        let mut len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && line.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        (start, start + len)
    }
}

impl DocumentHost for MemoryHost {
    fn track(&mut self, document: DocumentId, range: TextRange) -> RangeHandle {
        self.next_handle += 1;
        let handle = RangeHandle(self.next_handle);
        self.tracked.insert(
            handle,
            Tracked {
                document,
                range,
                collapsed: false,
                annotation: None,
            },
        );
        handle
    }

    fn resolve(&self, handle: RangeHandle) -> Option<TextRange> {
        let tracked = self.tracked.get(&handle)?;
        if tracked.collapsed || !self.documents.contains_key(&tracked.document) {
            return None;
        }
        Some(tracked.range)
    }

    fn untrack(&mut self, handle: RangeHandle) {
        self.tracked.remove(&handle);
    }

    fn set_annotation(&mut self, handle: RangeHandle, annotation: Annotation) {
        if let Some(tracked) = self.tracked.get_mut(&handle) {
            tracked.annotation = Some(annotation);
        }
    }

    fn clear_annotation(&mut self, handle: RangeHandle) {
        if let Some(tracked) = self.tracked.get_mut(&handle) {
            tracked.annotation = None;
        }
    }

    fn substr(&self, document: DocumentId, range: TextRange) -> Option<String> {
        let doc = self.documents.get(&document)?;
        let len = doc.text.len_chars();
        if range.end > len {
            return None;
        }
        Some(doc.text.slice(range.start..range.end).to_string())
    }

    fn line(&self, document: DocumentId, range: TextRange) -> Option<TextRange> {
        let doc = self.documents.get(&document)?;
        let (start, _) = Self::line_bounds(&doc.text, range.start);
        let (_, end) = Self::line_bounds(&doc.text, range.end);
        Some(TextRange::new(start, end.max(start)))
    }

    fn line_col(&self, document: DocumentId, pos: CharIdx) -> Option<(usize, usize)> {
        let doc = self.documents.get(&document)?;
        if pos > doc.text.len_chars() {
            return None;
        }
        let line = doc.text.char_to_line(pos);
        Some((line, pos - doc.text.line_to_char(line)))
    }

    fn char_count(&self, document: DocumentId) -> Option<usize> {
        self.documents.get(&document).map(|doc| doc.text.len_chars())
    }

    fn window_of(&self, document: DocumentId) -> Option<WindowId> {
        self.documents.get(&document).map(|doc| doc.window)
    }

    fn open_overlay(&mut self, document: DocumentId, anchor: CharIdx, body: String) -> OverlayId {
        self.next_overlay += 1;
        let id = OverlayId(self.next_overlay);
        self.overlays.insert(
            id,
            Overlay {
                document,
                anchor,
                body,
            },
        );
        id
    }

    fn close_overlay(&mut self, overlay: OverlayId) {
        self.overlays.remove(&overlay);
    }

    fn set_status(&mut self, window: WindowId, text: Option<String>) {
        match text {
            Some(text) => {
                self.status.insert(window, text);
            }
            None => {
                self.status.remove(&window);
            }
        }
    }
}
