//! Evaluation tracker and public API
//!
//! This module provides the [`Tracker`] service object that owns the
//! evaluation registry and coordinates the document host and the backend
//! connection. All mutation happens through `&mut Tracker`, so a single owner
//! (normally the dispatcher loop in [`dispatch`]) serializes every create,
//! completion, interrupt, and invalidation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

// Submodules
pub mod batch;
pub mod commands;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod host;
pub mod ids;
pub mod lifecycle;
pub mod progress;
pub mod range;
pub mod registry;
pub mod render;
pub mod status;
pub mod storage;
pub mod watcher;

use connection::Connection;
use error::{ConfigError, ConfigResult};
use eval::{EvalSnapshot, Evaluation, FinishHook, Placement};
use host::DocumentHost;
use ids::{BatchId, DocumentId, EvalId, IdAllocator, WindowId};
use progress::Progress;
use range::TextRange;
use registry::{EvalRegistry, Scope};

/// Configuration for the evaluation tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Column at which overlay text is re-wrapped
    pub wrap_width: usize,

    /// Elapsed times below this are left out of labels
    pub elapsed_threshold_ms: u64,

    /// Spinner frames for pending evaluations (built-in set when empty)
    pub progress_frames: Vec<String>,

    /// Per-status color overrides, keyed by status name
    pub colors: HashMap<String, String>,

    /// Send an interrupt when erasing a pending evaluation with a known session
    pub courtesy_interrupt: bool,

    /// Enable debug tracing
    pub debug: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            wrap_width: 80,
            elapsed_threshold_ms: 100,
            progress_frames: Vec::new(),
            colors: HashMap::new(),
            courtesy_interrupt: true,
            debug: false,
        }
    }
}

impl TrackerConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        storage::load_config(path)
    }

    /// Elapsed-time display threshold
    pub fn elapsed_threshold(&self) -> Duration {
        Duration::from_millis(self.elapsed_threshold_ms)
    }

    /// Reject values the tracker cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.wrap_width == 0 {
            return Err(ConfigError::Invalid {
                field: "wrap_width",
                detail: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Options for a single evaluation
#[derive(Default)]
pub struct EvalOptions {
    /// Batch to join; a fresh batch named after the new id when `None`
    pub batch: Option<BatchId>,
    /// Hook run once the evaluation reaches a terminal status
    pub on_finish: Option<FinishHook>,
    /// Open the detail overlay as soon as the evaluation completes
    pub expand: bool,
}

impl std::fmt::Debug for EvalOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalOptions")
            .field("batch", &self.batch)
            .field("expand", &self.expand)
            .finish_non_exhaustive()
    }
}

/// The evaluation tracker
///
/// Owns the registry and the id allocator; borrows nothing. Created at
/// startup, swept with [`Tracker::shutdown`] at exit.
pub struct Tracker<H, C> {
    config: TrackerConfig,
    registry: EvalRegistry,
    ids: IdAllocator,
    progress: Progress,
    host: H,
    conn: C,
}

impl<H: DocumentHost, C: Connection> Tracker<H, C> {
    /// Create a tracker over a host and a backend connection
    pub fn new(config: TrackerConfig, host: H, conn: C) -> Self {
        let progress = Progress::new(&config.progress_frames);
        Self {
            config,
            registry: EvalRegistry::new(),
            ids: IdAllocator::new(),
            progress,
            host,
            conn,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Get the registry
    pub fn registry(&self) -> &EvalRegistry {
        &self.registry
    }

    /// Get the document host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Get mutable access to the document host
    ///
    /// Edits made through this handle must be reported with
    /// [`Tracker::on_text_changed`] before the next registry access.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Get the backend connection
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Get the progress indicator
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Look up a live evaluation
    pub fn eval(&self, id: EvalId) -> Option<&Evaluation> {
        self.registry.find_by_id(id)
    }

    /// Create a pending evaluation over `range`.
    ///
    /// Any evaluation whose range intersects the lines covered by `range` is
    /// erased first. Returns `None` for an unknown document.
    pub fn create(
        &mut self,
        document: DocumentId,
        range: TextRange,
        options: EvalOptions,
    ) -> Option<EvalId> {
        let line = self.host.line(document, range)?;
        let code = self.host.substr(document, range)?;

        self.erase_where(Scope::Document(document), |eval, host| {
            eval.handle()
                .and_then(|handle| host.resolve(handle))
                .is_some_and(|existing| existing.intersects(&line))
        });

        let id = self.ids.next();
        let batch_id = options.batch.unwrap_or_else(|| id.into());
        let handle = self.host.track(document, range);
        let eval = Evaluation::new(
            id,
            batch_id,
            Placement::Inline { document, handle },
            code,
            options.on_finish,
            options.expand,
        );
        self.registry.insert(eval);

        tracing::debug!(id = %id, batch = %batch_id, ?range, "created evaluation");
        self.render(id);
        self.progress.wake();
        Some(id)
    }

    /// Create the status-bar evaluation of `window`, replacing any previous one.
    pub fn create_status(
        &mut self,
        window: WindowId,
        code: String,
        options: EvalOptions,
    ) -> EvalId {
        if let Some(previous) = self.registry.status_eval(window).map(Evaluation::id) {
            self.erase(previous);
        }

        let id = self.ids.next();
        let batch_id = options.batch.unwrap_or_else(|| id.into());
        let eval = Evaluation::new(
            id,
            batch_id,
            Placement::StatusBar { window },
            code,
            options.on_finish,
            options.expand,
        );
        self.registry.insert(eval);

        tracing::debug!(id = %id, window = %window, "created status-bar evaluation");
        self.render(id);
        self.progress.wake();
        id
    }

    /// Erase an evaluation: drop it from the registry and release its
    /// decoration and overlay. A pending evaluation with a known session gets
    /// a fire-and-forget interrupt. Returns false if the id is not live.
    pub fn erase(&mut self, id: EvalId) -> bool {
        let Some(eval) = self.registry.remove(id) else {
            tracing::trace!(id = %id, "erase of unknown evaluation");
            return false;
        };

        match eval.placement() {
            Placement::Inline { handle, .. } => self.host.untrack(handle),
            Placement::StatusBar { window } => self.host.set_status(window, None),
        }
        if let Some(overlay) = eval.overlay {
            self.host.close_overlay(overlay);
        }

        let courtesy =
            self.config.courtesy_interrupt && eval.status() == status::EvalStatus::Pending;
        match eval.session() {
            Some(session) if courtesy => {
                tracing::debug!(
                    id = %id,
                    session = %session,
                    "erased pending evaluation, interrupting"
                );
                self.conn.send(connection::Request::Interrupt {
                    batch_id: eval.batch_id(),
                    id,
                    session: Some(session.clone()),
                });
            }
            _ => tracing::debug!(id = %id, status = %eval.status(), "erased evaluation"),
        }
        true
    }

    /// Erase every evaluation in `scope` matching `predicate`.
    ///
    /// Matches are decided against a snapshot before anything is erased.
    /// Returns the number erased.
    pub fn erase_where<P>(&mut self, scope: Scope, mut predicate: P) -> usize
    where
        P: FnMut(&Evaluation, &H) -> bool,
    {
        let doomed: Vec<EvalId> = self
            .registry
            .ids_in_scope(scope)
            .into_iter()
            .filter(|id| {
                self.registry
                    .find_by_id(*id)
                    .is_some_and(|eval| predicate(eval, &self.host))
            })
            .collect();

        doomed.into_iter().filter(|id| self.erase(*id)).count()
    }

    /// Redraw the decoration of an evaluation for its current status.
    ///
    /// Skipped when the range no longer resolves; the mutation watcher decides
    /// whether such an evaluation goes away.
    pub(crate) fn render(&mut self, id: EvalId) {
        let Some(eval) = self.registry.find_by_id(id) else {
            return;
        };
        let annotation = eval.annotation(&self.config, self.progress.phase());

        match eval.placement() {
            Placement::Inline { handle, .. } => {
                if self.host.resolve(handle).is_none() {
                    tracing::trace!(id = %id, "range unresolved, skipping redraw");
                    return;
                }
                if annotation.label.is_none() {
                    self.host.clear_annotation(handle);
                }
                self.host.set_annotation(handle, annotation);
            }
            Placement::StatusBar { window } => {
                self.host.set_status(window, annotation.label);
            }
        }
    }

    /// Advance the spinner and redraw pending evaluations.
    ///
    /// Returns false (and puts the indicator to sleep) once nothing is in flight.
    pub fn tick(&mut self) -> bool {
        let in_flight = self.registry.iter().any(|eval| eval.status().is_in_flight());
        if !in_flight {
            self.progress.sleep();
            return false;
        }

        self.progress.advance();
        let pending: Vec<EvalId> = self
            .registry
            .iter()
            .filter(|eval| eval.status() == status::EvalStatus::Pending)
            .map(Evaluation::id)
            .collect();
        for id in pending {
            self.render(id);
        }
        true
    }

    /// Serializable view of every live evaluation
    pub fn snapshot(&self) -> Vec<EvalSnapshot> {
        self.registry
            .iter()
            .map(|eval| {
                let range = eval.handle().and_then(|handle| self.host.resolve(handle));
                EvalSnapshot::of(eval, range)
            })
            .collect()
    }

    /// Erase everything, in every scope
    pub fn shutdown(&mut self) -> usize {
        let erased = self.erase_where(Scope::All, |_, _| true);
        self.progress.sleep();
        tracing::info!("Tracker shut down, erased {} evaluations", erased);
        erased
    }
}
