//! Scripted replay driver
//!
//! A script is newline-delimited JSON, one [`Step`] per line. Documents are
//! named in the script and live in a [`MemoryHost`]; requests land in a
//! [`RecordingConnection`]. Replies, edits, closes and editor commands are
//! posted to a [`Mailbox`] and applied by the dispatcher, the way a real
//! connection and editor would deliver them. Blank lines and lines starting
//! with `//` are skipped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::path::Path;

use crate::tracker::commands::{Cursor, SubmitOptions};
use crate::tracker::connection::{RecordingConnection, Reply, Request};
use crate::tracker::dispatch::{self, Command, Inbox, Mailbox};
use crate::tracker::error::TrackerError;
use crate::tracker::eval::EvalSnapshot;
use crate::tracker::host::MemoryHost;
use crate::tracker::ids::{DocumentId, WindowId};
use crate::tracker::range::{CharIdx, TextRange};
use crate::tracker::watcher::changed_ranges;
use crate::tracker::{EvalOptions, Tracker, TrackerConfig};

/// One scripted action
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum Step {
    /// Open a named document
    Open {
        /// Script name of the document
        doc: String,
        /// Initial text
        text: String,
    },
    /// Submit ranges for evaluation as one batch
    Eval {
        /// Target document
        doc: String,
        /// `[start, end)` character ranges
        ranges: Vec<(CharIdx, CharIdx)>,
        /// Maximum printed result length
        #[serde(default)]
        print_quota: Option<usize>,
        /// Transform template
        #[serde(default)]
        transform: Option<String>,
        /// Namespace for `%ns`
        #[serde(default)]
        ns: Option<String>,
        /// Open the overlay on completion
        #[serde(default)]
        expand: bool,
    },
    /// Load a whole document
    Buffer {
        /// Target document
        doc: String,
    },
    /// Replace `[start, end)` with `text`
    Edit {
        /// Target document
        doc: String,
        /// Start of the replaced span
        start: CharIdx,
        /// End of the replaced span
        end: CharIdx,
        /// Replacement text
        #[serde(default)]
        text: String,
    },
    /// Deliver a backend reply
    Reply {
        /// The reply
        reply: Reply,
    },
    /// Interrupt the oldest batch
    Interrupt {
        /// Target document
        doc: String,
    },
    /// Clear finished evaluations
    Clear {
        /// Target document
        doc: String,
        /// Clear in-flight ones too
        #[serde(default)]
        force: bool,
    },
    /// Toggle info at a caret
    Toggle {
        /// Target document
        doc: String,
        /// Caret position
        at: CharIdx,
    },
    /// Toggle the exception trace at a caret
    Trace {
        /// Target document
        doc: String,
        /// Caret position
        at: CharIdx,
    },
    /// Toggle symbol info at a caret
    Lookup {
        /// Target document
        doc: String,
        /// Caret position
        at: CharIdx,
        /// Namespace to resolve in
        #[serde(default)]
        ns: Option<String>,
    },
    /// Copy the result at a caret
    Copy {
        /// Target document
        doc: String,
        /// Caret position
        at: CharIdx,
    },
    /// Close a document
    Close {
        /// Target document
        doc: String,
    },
    /// Advance the progress indicator
    Tick,
    /// Erase everything and stop replaying
    Shutdown,
}

/// What a step produced, when it produced anything
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    /// 1-based script line
    pub line: usize,
    /// Result of the step
    pub result: serde_json::Value,
}

/// Final state after a replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Text of each open document, by script name
    pub documents: BTreeMap<String, String>,
    /// Live evaluations at the end
    pub evaluations: Vec<EvalSnapshot>,
    /// Every request sent to the backend, in order
    pub requests: Vec<Request>,
    /// Results of steps that return something
    pub outcomes: Vec<StepOutcome>,
}

struct Replay {
    tracker: Tracker<MemoryHost, RecordingConnection>,
    conn: RecordingConnection,
    mailbox: Mailbox,
    inbox: tokio::sync::mpsc::UnboundedReceiver<Inbox>,
    window: WindowId,
    documents: HashMap<String, DocumentId>,
    outcomes: Vec<StepOutcome>,
    stopped: bool,
}

impl Replay {
    fn new(config: TrackerConfig) -> Self {
        let conn = RecordingConnection::new();
        let (mailbox, inbox) = dispatch::mailbox();
        Self {
            tracker: Tracker::new(config, MemoryHost::new(), conn.clone()),
            conn,
            mailbox,
            inbox,
            window: WindowId::new(),
            documents: HashMap::new(),
            outcomes: Vec::new(),
            stopped: false,
        }
    }

    fn document(&self, name: &str) -> Result<DocumentId, TrackerError> {
        self.documents
            .get(name)
            .copied()
            .ok_or_else(|| TrackerError::DocumentNotFound(name.to_string()))
    }

    fn record(&mut self, line: usize, result: impl Serialize) -> Result<()> {
        let result = serde_json::to_value(result).context("Failed to encode step result")?;
        self.outcomes.push(StepOutcome { line, result });
        Ok(())
    }

    fn post(&mut self, line: usize, message: Inbox) -> Result<()> {
        if !self.mailbox.post(message) {
            return Err(stopped(line));
        }
        self.settle(line);
        Ok(())
    }

    fn command(&mut self, line: usize, command: Command) -> Result<()> {
        let mut outcome = self.mailbox.command(command).ok_or_else(|| stopped(line))?;
        self.settle(line);
        let outcome = outcome.try_recv().map_err(|_| TrackerError::Script {
            line,
            detail: "command was not applied".to_string(),
        })?;
        self.record(line, outcome)
    }

    fn settle(&mut self, line: usize) {
        if let ControlFlow::Break(erased) = self.tracker.drain(&mut self.inbox) {
            tracing::info!(line, erased, "replay shut down");
            self.stopped = true;
        }
    }

    fn apply(&mut self, line: usize, step: Step) -> Result<()> {
        match step {
            Step::Open { doc, text } => {
                if self.documents.contains_key(&doc) {
                    return Err(TrackerError::Script {
                        line,
                        detail: format!("document '{}' already open", doc),
                    }
                    .into());
                }
                let id = self.tracker.host_mut().open(self.window, &text);
                self.documents.insert(doc, id);
            }
            Step::Eval {
                doc,
                ranges,
                print_quota,
                transform,
                ns,
                expand,
            } => {
                let document = self.document(&doc)?;
                let ranges: Vec<TextRange> = ranges
                    .into_iter()
                    .map(|(start, end)| TextRange::new(start, end))
                    .collect();
                let options = SubmitOptions {
                    print_quota,
                    transform,
                    ns,
                    expand,
                    on_finish: None,
                };
                self.command(
                    line,
                    Command::Submit {
                        document,
                        ranges,
                        options,
                    },
                )?;
            }
            Step::Buffer { doc } => {
                let document = self.document(&doc)?;
                let options = EvalOptions::default();
                self.command(line, Command::SubmitBuffer { document, options })?;
            }
            Step::Edit { doc, start, end, text } => {
                let document = self.document(&doc)?;
                let edit = self
                    .tracker
                    .host_mut()
                    .edit(document, TextRange::new(start, end), &text)
                    .ok_or_else(|| TrackerError::DocumentNotFound(doc.clone()))?;
                self.post(
                    line,
                    Inbox::TextChanged {
                        document,
                        changes: changed_ranges(&[edit]),
                    },
                )?;
            }
            Step::Reply { reply } => self.post(line, Inbox::Reply(reply))?,
            Step::Interrupt { doc } => {
                let document = self.document(&doc)?;
                self.command(line, Command::Interrupt(document))?;
            }
            Step::Clear { doc, force } => {
                let document = self.document(&doc)?;
                self.command(line, Command::Clear { document, force })?;
            }
            Step::Toggle { doc, at } => {
                let cursor = Cursor::caret(self.document(&doc)?, at);
                self.command(line, Command::ToggleInfo(cursor))?;
            }
            Step::Trace { doc, at } => {
                let cursor = Cursor::caret(self.document(&doc)?, at);
                self.command(line, Command::ToggleTrace(cursor))?;
            }
            Step::Lookup { doc, at, ns } => {
                let cursor = Cursor {
                    ns,
                    ..Cursor::caret(self.document(&doc)?, at)
                };
                self.command(line, Command::ToggleSymbol(cursor))?;
            }
            Step::Copy { doc, at } => {
                let cursor = Cursor::caret(self.document(&doc)?, at);
                self.command(line, Command::CopyResult(cursor))?;
            }
            Step::Close { doc } => {
                let document = self.document(&doc)?;
                self.tracker.host_mut().close(document);
                self.documents.remove(&doc);
                self.post(line, Inbox::DocumentClosed(document))?;
            }
            Step::Tick => self.post(line, Inbox::Tick)?,
            Step::Shutdown => self.post(line, Inbox::Shutdown)?,
        }
        Ok(())
    }

    fn report(self) -> ReplayReport {
        let host = self.tracker.host();
        let documents = self
            .documents
            .iter()
            .filter_map(|(name, id)| Some((name.clone(), host.text(*id)?)))
            .collect();
        ReplayReport {
            documents,
            evaluations: self.tracker.snapshot(),
            requests: self.conn.sent(),
            outcomes: self.outcomes,
        }
    }
}

fn stopped(line: usize) -> anyhow::Error {
    TrackerError::Script {
        line,
        detail: "dispatcher stopped".to_string(),
    }
    .into()
}

/// Parse a script into numbered steps.
pub fn parse_script(script: &str) -> Result<Vec<(usize, Step)>> {
    script
        .lines()
        .enumerate()
        .map(|(index, text)| (index + 1, text.trim()))
        .filter(|(_, text)| !text.is_empty() && !text.starts_with("//"))
        .map(|(line, text)| {
            serde_json::from_str::<Step>(text)
                .map(|step| (line, step))
                .map_err(|err| {
                    anyhow::Error::from(TrackerError::Script {
                        line,
                        detail: err.to_string(),
                    })
                })
        })
        .collect()
}

/// Replay a script and report the final state.
pub fn run_script(script: &str, config: TrackerConfig) -> Result<ReplayReport> {
    let steps = parse_script(script)?;
    let mut replay = Replay::new(config);

    for (line, step) in steps {
        if replay.stopped {
            tracing::warn!(line, "steps after shutdown ignored");
            break;
        }
        tracing::debug!(line, ?step, "replaying step");
        replay
            .apply(line, step)
            .with_context(|| format!("Replay failed at line {}", line))?;
    }

    Ok(replay.report())
}

/// Replay a script file.
pub fn run_file(path: &Path, config: TrackerConfig) -> Result<ReplayReport> {
    let script = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {:?}", path))?;
    run_script(&script, config)
}
