//! Text ranges and sticky-range mapping through edits
//!
//! Positions are character offsets into a document. A [`TextRange`] is
//! half-open: `start` is inclusive, `end` exclusive.

use serde::{Deserialize, Serialize};

/// A position in a document, measured in characters.
pub type CharIdx = usize;

/// A half-open span of characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    /// First character of the span
    pub start: CharIdx,
    /// One past the last character of the span
    pub end: CharIdx,
}

impl TextRange {
    /// Create a range, normalizing reversed endpoints.
    pub fn new(a: CharIdx, b: CharIdx) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Zero-width range at `pos`.
    pub fn point(pos: CharIdx) -> Self {
        Self::new(pos, pos)
    }

    /// Number of characters covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for a zero-width range.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Interior overlap test.
    ///
    /// Two ranges intersect when they are equal or when an endpoint of one
    /// falls strictly inside the other. Ranges that merely share an endpoint
    /// do not intersect.
    pub fn intersects(&self, other: &TextRange) -> bool {
        let (lb, le) = (self.start, self.end);
        let (rb, re) = (other.start, other.end);
        (lb == rb && le == re)
            || (rb > lb && rb < le)
            || (re > lb && re < le)
            || (lb > rb && lb < re)
            || (le > rb && le < re)
    }

    /// Closed overlap test: intersecting or abutting ranges touch.
    pub fn touches(&self, other: &TextRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Map this range through a replacement of `edit` by `inserted` chars.
    ///
    /// The start sticks to the right of an insertion at its position and the
    /// end sticks to the left, so typing at either boundary never grows the
    /// range. Endpoints inside the replaced span collapse to its start.
    pub fn map_through(&self, edit: &TextEdit) -> TextRange {
        TextRange {
            start: edit.map_pos(self.start, Bias::Right),
            end: edit.map_pos(self.end, Bias::Left),
        }
        .clamped()
    }

    fn clamped(self) -> Self {
        if self.end < self.start {
            Self::point(self.start)
        } else {
            self
        }
    }
}

/// Which side of an insertion a mapped position lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Position stays before insertions at the same location.
    Left,
    /// Position moves after insertions at the same location.
    Right,
}

/// One replacement: `replaced` (old coordinates) becomes `inserted` chars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
    /// Span removed from the old text
    pub replaced: TextRange,
    /// Number of characters inserted at `replaced.start`
    pub inserted: usize,
}

impl TextEdit {
    /// Signed change in document length.
    pub fn delta(&self) -> i64 {
        self.inserted as i64 - self.replaced.len() as i64
    }

    /// Span covered by the inserted text, in new coordinates.
    pub fn changed(&self) -> TextRange {
        TextRange::new(self.replaced.start, self.replaced.start + self.inserted)
    }

    /// Map an old position into new coordinates.
    pub fn map_pos(&self, pos: CharIdx, bias: Bias) -> CharIdx {
        let TextRange { start, end } = self.replaced;
        if pos < start {
            pos
        } else if pos > end || (pos == end && end > start) {
            apply_delta(pos, self.delta())
        } else if pos == start && start == end {
            // pure insertion at `pos`
            match bias {
                Bias::Left => pos,
                Bias::Right => pos + self.inserted,
            }
        } else {
            // inside the replaced span
            match bias {
                Bias::Left => start,
                Bias::Right if pos == start => start,
                Bias::Right => start + self.inserted,
            }
        }
    }
}

fn apply_delta(position: CharIdx, delta: i64) -> CharIdx {
    (position as i64).saturating_add(delta).max(0) as CharIdx
}
