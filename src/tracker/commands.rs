//! User-facing command adapters
//!
//! Each command turns one editor action into tracker operations: create
//! evaluations and send their requests, toggle an overlay, erase, or
//! interrupt. Commands that need a cursor take a [`Cursor`]; the toggles and
//! copy only apply to a single selection.

use serde::Serialize;
use std::sync::Arc;

use super::Tracker;
use super::connection::{Connection, Request};
use super::eval::{Evaluation, FinishHook};
use super::host::DocumentHost;
use super::ids::{BatchId, DocumentId, EvalId};
use super::lifecycle::ToggleOutcome;
use super::range::{CharIdx, TextRange};
use super::registry::Scope;
use super::EvalOptions;

/// Namespace assumed when the caller does not know one
pub const DEFAULT_NS: &str = "user";

const SYMBOL_DELIMITERS: &[char] = &[
    '(', ')', '[', ']', '{', '}', '"', '\'', ';', ',', '`', '@', '^', '~',
];

/// Selection state of the view a command runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Active document
    pub document: DocumentId,
    /// Current selections
    pub selections: Vec<TextRange>,
    /// Namespace of the code around the cursor, when known
    pub ns: Option<String>,
}

impl Cursor {
    /// Cursor with a single caret at `pos`
    pub fn caret(document: DocumentId, pos: CharIdx) -> Self {
        Self {
            document,
            selections: vec![TextRange::point(pos)],
            ns: None,
        }
    }

    fn single(&self) -> Option<TextRange> {
        match self.selections.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn ns(&self) -> &str {
        self.ns.as_deref().unwrap_or(DEFAULT_NS)
    }
}

/// Shared completion callback for submitted evaluations
pub type SharedHook = Arc<dyn Fn(&Evaluation) + Send + Sync>;

/// Options for [`Tracker::submit_evaluation`]
#[derive(Clone, Default)]
pub struct SubmitOptions {
    /// Maximum printed result length
    pub print_quota: Option<usize>,
    /// Template wrapped around the code before sending (`%code`, `%ns`, `%symbol`)
    pub transform: Option<String>,
    /// Namespace substituted for `%ns`
    pub ns: Option<String>,
    /// Open the detail overlay on successful completion
    pub expand: bool,
    /// Called once per evaluation when it finishes
    pub on_finish: Option<SharedHook>,
}

impl std::fmt::Debug for SubmitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitOptions")
            .field("print_quota", &self.print_quota)
            .field("transform", &self.transform)
            .field("ns", &self.ns)
            .field("expand", &self.expand)
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}

/// Result of [`Tracker::copy_result_at`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOutcome {
    /// Value of the evaluation under the cursor
    Value(String),
    /// Nothing to copy; the caller should perform a plain copy
    Fallback,
}

/// Substitute `%code`, `%ns` and `%symbol` in a transform template.
pub fn apply_template(
    template: &str,
    code: &str,
    ns: Option<&str>,
    symbol: Option<&str>,
) -> String {
    template
        .replace("%code", code)
        .replace("%symbol", symbol.unwrap_or("nil"))
        .replace("%ns", ns.unwrap_or(DEFAULT_NS))
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !SYMBOL_DELIMITERS.contains(&c)
}

impl<H: DocumentHost, C: Connection> Tracker<H, C> {
    /// Evaluate each non-empty range as one batch.
    ///
    /// The batch is named after the first evaluation created. Returns the ids
    /// in submission order.
    pub fn submit_evaluation(
        &mut self,
        document: DocumentId,
        ranges: &[TextRange],
        options: SubmitOptions,
    ) -> Vec<EvalId> {
        let mut batch: Option<BatchId> = None;
        let mut ids = Vec::with_capacity(ranges.len());

        for &range in ranges {
            if range.is_empty() {
                tracing::debug!(?range, "skipping empty range");
                continue;
            }
            let Some((line, column)) = self.host.line_col(document, range.start) else {
                tracing::warn!(document = %document, "submit to unknown document");
                break;
            };

            let on_finish = options.on_finish.clone().map(|hook| {
                Box::new(move |eval: &Evaluation| hook(eval)) as FinishHook
            });
            let eval_options = EvalOptions {
                batch,
                on_finish,
                expand: options.expand,
            };
            let Some(id) = self.create(document, range, eval_options) else {
                continue;
            };
            let batch_id = *batch.get_or_insert(id.into());

            let Some(eval) = self.registry.find_by_id(id) else {
                continue;
            };
            let code = match &options.transform {
                Some(template) => {
                    apply_template(template, eval.code(), options.ns.as_deref(), None)
                }
                None => eval.code().to_string(),
            };

            self.conn.send(Request::Eval {
                id,
                batch_id,
                code,
                line,
                column,
                print_quota: options.print_quota,
            });
            ids.push(id);
        }

        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "submitted evaluations");
        }
        ids
    }

    /// Load the whole document, reporting in the window's status bar.
    pub fn submit_buffer(&mut self, document: DocumentId, options: EvalOptions) -> Option<EvalId> {
        let window = self.host.window_of(document)?;
        let len = self.host.char_count(document)?;
        let code = self.host.substr(document, TextRange::new(0, len))?;

        let id = self.create_status(window, code.clone(), options);
        self.conn.send(Request::LoadFile { id, code });
        Some(id)
    }

    /// Look up the symbol under `range`.
    pub fn request_lookup(
        &mut self,
        document: DocumentId,
        range: TextRange,
        ns: &str,
    ) -> Option<EvalId> {
        let id = self.create(document, range, EvalOptions::default())?;
        let symbol = self.eval(id)?.code().to_string();

        tracing::debug!(id = %id, symbol = %symbol, "symbol lookup");
        self.conn.send(Request::Lookup {
            id,
            symbol,
            ns: ns.to_string(),
        });
        Some(id)
    }

    /// Interrupt the oldest batch in flight in the document or its window.
    pub fn interrupt(&mut self, document: DocumentId) -> Option<BatchId> {
        let window = self.host.window_of(document);
        self.interrupt_oldest(window, document)
    }

    /// Erase finished evaluations of the document and its window's status
    /// bar. In-flight ones stay unless `force` is set.
    pub fn clear_completed(&mut self, document: DocumentId, force: bool) -> usize {
        let mut erased = self.erase_where(Scope::Document(document), |eval, _| {
            force || !eval.status().is_in_flight()
        });

        let status_id = self
            .host
            .window_of(document)
            .and_then(|window| self.registry.status_eval(window))
            .filter(|eval| force || !eval.status().is_in_flight())
            .map(Evaluation::id);
        if let Some(id) = status_id {
            erased += usize::from(self.erase(id));
        }
        erased
    }

    /// Evaluation under a single-selection cursor
    pub fn eval_at(&self, cursor: &Cursor) -> Option<EvalId> {
        let selection = cursor.single()?;
        self.registry.find_by_range(&self.host, cursor.document, selection)
    }

    /// Show or hide whatever belongs under the cursor, falling back to a
    /// symbol lookup when nothing does.
    pub fn toggle_info_at(&mut self, cursor: &Cursor) -> ToggleOutcome {
        if cursor.single().is_none() {
            return ToggleOutcome::Unavailable;
        }
        match self.eval_at(cursor) {
            Some(id) => self.toggle_overlay(id),
            None => self.toggle_symbol_at(cursor),
        }
    }

    /// Hide the open overlay under the cursor, or look up the symbol there.
    pub fn toggle_symbol_at(&mut self, cursor: &Cursor) -> ToggleOutcome {
        let Some(selection) = cursor.single() else {
            return ToggleOutcome::Unavailable;
        };
        if let Some(id) = self.eval_at(cursor) {
            if self.eval(id).is_some_and(Evaluation::overlay_open) {
                self.erase(id);
                return ToggleOutcome::Erased;
            }
        }

        let region = if selection.is_empty() {
            self.symbol_at(cursor.document, selection.start)
        } else {
            Some(selection)
        };
        region
            .and_then(|region| self.request_lookup(cursor.document, region, cursor.ns()))
            .map_or(ToggleOutcome::Unavailable, ToggleOutcome::LookupRequested)
    }

    /// Show or hide the trace of the exception under the cursor.
    pub fn toggle_trace_at(&mut self, cursor: &Cursor) -> ToggleOutcome {
        match self.eval_at(cursor) {
            Some(id) => self.toggle_trace(id),
            None => ToggleOutcome::Unavailable,
        }
    }

    /// Value of the evaluation under a single caret.
    pub fn copy_result_at(&self, cursor: &Cursor) -> CopyOutcome {
        let caret = cursor.single().filter(TextRange::is_empty);
        caret
            .and_then(|_| self.eval_at(cursor))
            .and_then(|id| self.eval(id))
            .and_then(Evaluation::value)
            .filter(|value| !value.is_empty())
            .map_or(CopyOutcome::Fallback, |value| CopyOutcome::Value(value.to_string()))
    }

    /// Span of the symbol touching `pos`, bounded by whitespace and
    /// delimiters on the same line.
    pub fn symbol_at(&self, document: DocumentId, pos: CharIdx) -> Option<TextRange> {
        let line = self.host.line(document, TextRange::point(pos))?;
        let chars: Vec<char> = self.host.substr(document, line)?.chars().collect();
        let offset = pos.checked_sub(line.start)?.min(chars.len());

        let start = chars[..offset]
            .iter()
            .rposition(|c| !is_symbol_char(*c))
            .map_or(0, |i| i + 1);
        let end = chars[offset..]
            .iter()
            .position(|c| !is_symbol_char(*c))
            .map_or(chars.len(), |i| offset + i);

        (start < end).then(|| TextRange::new(line.start + start, line.start + end))
    }
}
