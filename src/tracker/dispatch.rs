//! Single-owner dispatcher loop
//!
//! Replies, editor notifications and editor commands can originate anywhere;
//! they reach the tracker only as [`Inbox`] messages through a [`Mailbox`].
//! The task running [`Tracker::run`] owns the tracker and applies messages
//! one at a time, so every state change happens on that task. Commands answer
//! on a oneshot channel.

use serde::Serialize;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::commands::{CopyOutcome, Cursor, SubmitOptions};
use super::connection::{Connection, Reply};
use super::host::DocumentHost;
use super::ids::{BatchId, DocumentId, EvalId};
use super::lifecycle::ToggleOutcome;
use super::range::TextRange;
use super::{EvalOptions, Tracker};

/// Spinner frame interval while anything is in flight
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Editor action run on the dispatcher task
#[derive(Debug)]
pub enum Command {
    /// Evaluate ranges as one batch
    Submit {
        /// Target document
        document: DocumentId,
        /// Ranges to evaluate
        ranges: Vec<TextRange>,
        /// Submission options
        options: SubmitOptions,
    },
    /// Load the whole document
    SubmitBuffer {
        /// Target document
        document: DocumentId,
        /// Options for the status-bar evaluation
        options: EvalOptions,
    },
    /// Interrupt the oldest batch in flight
    Interrupt(DocumentId),
    /// Erase finished evaluations
    Clear {
        /// Target document
        document: DocumentId,
        /// Erase in-flight ones too
        force: bool,
    },
    /// Toggle whatever is under the cursor
    ToggleInfo(Cursor),
    /// Toggle symbol info under the cursor
    ToggleSymbol(Cursor),
    /// Toggle the exception trace under the cursor
    ToggleTrace(Cursor),
    /// Copy the value under the cursor
    CopyResult(Cursor),
}

/// Answer to a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    /// Ids created by [`Command::Submit`]
    Submitted(Vec<EvalId>),
    /// Status-bar evaluation created by [`Command::SubmitBuffer`]
    Loaded(Option<EvalId>),
    /// Batch hit by [`Command::Interrupt`]
    Interrupted(Option<BatchId>),
    /// Number erased by [`Command::Clear`]
    Cleared(usize),
    /// Result of a toggle
    Toggled(ToggleOutcome),
    /// Result of [`Command::CopyResult`]
    Copied(CopyOutcome),
}

/// Message consumed by the dispatcher
#[derive(Debug)]
pub enum Inbox {
    /// Backend reply
    Reply(Reply),
    /// Edits landed in a document
    TextChanged {
        /// Edited document
        document: DocumentId,
        /// Changed spans, post-edit coordinates
        changes: Vec<TextRange>,
    },
    /// A document was closed
    DocumentClosed(DocumentId),
    /// Editor command, answered on `respond` when present
    Command {
        /// The action
        command: Command,
        /// Where the outcome goes
        respond: Option<oneshot::Sender<CommandOutcome>>,
    },
    /// Advance the progress indicator
    Tick,
    /// Erase everything and stop
    Shutdown,
}

/// Sending half handed to the connection and the editor glue
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<Inbox>,
}

/// Create a mailbox and the receiver the dispatcher drains.
pub fn mailbox() -> (Mailbox, mpsc::UnboundedReceiver<Inbox>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Mailbox { tx }, rx)
}

impl Mailbox {
    /// Post a message. Returns false once the dispatcher has stopped.
    pub fn post(&self, message: Inbox) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Post a backend reply
    pub fn reply(&self, reply: Reply) -> bool {
        self.post(Inbox::Reply(reply))
    }

    /// Post an edit notification
    pub fn text_changed(&self, document: DocumentId, changes: Vec<TextRange>) -> bool {
        self.post(Inbox::TextChanged { document, changes })
    }

    /// Post a close notification
    pub fn document_closed(&self, document: DocumentId) -> bool {
        self.post(Inbox::DocumentClosed(document))
    }

    /// Ask the dispatcher to shut down
    pub fn shutdown(&self) -> bool {
        self.post(Inbox::Shutdown)
    }

    /// Queue a command. The receiver yields its outcome once the dispatcher
    /// has applied it; `None` once the dispatcher has stopped.
    pub fn command(&self, command: Command) -> Option<oneshot::Receiver<CommandOutcome>> {
        let (respond, outcome) = oneshot::channel();
        self.post(Inbox::Command {
            command,
            respond: Some(respond),
        })
        .then_some(outcome)
    }

    /// Queue a command and wait for its outcome.
    pub async fn request(&self, command: Command) -> Option<CommandOutcome> {
        self.command(command)?.await.ok()
    }
}

impl<H: DocumentHost, C: Connection> Tracker<H, C> {
    /// Apply one message. Breaks with the number of evaluations swept on
    /// shutdown.
    pub fn handle(&mut self, message: Inbox) -> ControlFlow<usize> {
        match message {
            Inbox::Reply(reply) => self.handle_reply(reply),
            Inbox::TextChanged { document, changes } => {
                self.on_text_changed(document, &changes);
            }
            Inbox::DocumentClosed(document) => {
                self.on_document_closed(document);
            }
            Inbox::Command { command, respond } => {
                let outcome = self.execute(command);
                if let Some(respond) = respond {
                    if respond.send(outcome).is_err() {
                        tracing::trace!("command caller went away");
                    }
                }
            }
            Inbox::Tick => {
                self.tick();
            }
            Inbox::Shutdown => return ControlFlow::Break(self.shutdown()),
        }
        ControlFlow::Continue(())
    }

    /// Run one editor command.
    pub fn execute(&mut self, command: Command) -> CommandOutcome {
        match command {
            Command::Submit {
                document,
                ranges,
                options,
            } => CommandOutcome::Submitted(self.submit_evaluation(document, &ranges, options)),
            Command::SubmitBuffer { document, options } => {
                CommandOutcome::Loaded(self.submit_buffer(document, options))
            }
            Command::Interrupt(document) => CommandOutcome::Interrupted(self.interrupt(document)),
            Command::Clear { document, force } => {
                CommandOutcome::Cleared(self.clear_completed(document, force))
            }
            Command::ToggleInfo(cursor) => CommandOutcome::Toggled(self.toggle_info_at(&cursor)),
            Command::ToggleSymbol(cursor) => {
                CommandOutcome::Toggled(self.toggle_symbol_at(&cursor))
            }
            Command::ToggleTrace(cursor) => CommandOutcome::Toggled(self.toggle_trace_at(&cursor)),
            Command::CopyResult(cursor) => CommandOutcome::Copied(self.copy_result_at(&cursor)),
        }
    }

    /// Apply every message already queued, without waiting.
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<Inbox>) -> ControlFlow<usize> {
        while let Ok(message) = rx.try_recv() {
            if let ControlFlow::Break(erased) = self.handle(message) {
                return ControlFlow::Break(erased);
            }
        }
        ControlFlow::Continue(())
    }

    /// Run until [`Inbox::Shutdown`] or until every mailbox is dropped.
    ///
    /// While anything is in flight the spinner advances every
    /// [`TICK_INTERVAL`]. Returns the number of evaluations swept at exit.
    pub async fn run(&mut self, mut rx: mpsc::UnboundedReceiver<Inbox>) -> usize {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let awake = self.progress.is_awake();
            let message = tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(message) => message,
                    None => {
                        tracing::debug!("All mailboxes dropped, stopping dispatcher");
                        return self.shutdown();
                    }
                },
                _ = ticker.tick(), if awake => Inbox::Tick,
            };

            if let ControlFlow::Break(erased) = self.handle(message) {
                return erased;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::connection::RecordingConnection;
    use crate::tracker::host::MemoryHost;
    use crate::tracker::ids::WindowId;
    use crate::tracker::status::EvalStatus;
    use crate::tracker::{EvalOptions, TrackerConfig};

    fn setup(text: &str) -> (Tracker<MemoryHost, RecordingConnection>, DocumentId) {
        let mut host = MemoryHost::new();
        let doc = host.open(WindowId::new(), text);
        (
            Tracker::new(TrackerConfig::default(), host, RecordingConnection::new()),
            doc,
        )
    }

    #[test]
    fn test_drain_applies_in_order() {
        let (mut tracker, doc) = setup("(+ 1 2)\n");
        let id = tracker.create(doc, TextRange::new(0, 7), EvalOptions::default()).unwrap();
        let (mailbox, mut rx) = mailbox();

        mailbox.reply(Reply::Success {
            id,
            value: "3".into(),
            elapsed: None,
        });
        mailbox.reply(Reply::Success {
            id,
            value: ":fail 1".into(),
            elapsed: None,
        });

        assert_eq!(tracker.drain(&mut rx), ControlFlow::Continue(()));
        let eval = tracker.eval(id).unwrap();
        assert_eq!(eval.status(), EvalStatus::Success);
        assert_eq!(eval.value(), Some("3"));
    }

    #[test]
    fn test_drain_stops_at_shutdown() {
        let (mut tracker, doc) = setup("(+ 1 2)\n");
        tracker.create(doc, TextRange::new(0, 7), EvalOptions::default());
        let (mailbox, mut rx) = mailbox();

        mailbox.shutdown();
        mailbox.document_closed(doc);

        assert_eq!(tracker.drain(&mut rx), ControlFlow::Break(1));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (mut tracker, doc) = setup("(+ 1 2)\n(+ 3 4)\n");
        let first = tracker.create(doc, TextRange::new(0, 7), EvalOptions::default()).unwrap();
        tracker.create(doc, TextRange::new(8, 15), EvalOptions::default());
        let (mailbox, rx) = mailbox();

        let sender = mailbox.clone();
        tokio::spawn(async move {
            sender.reply(Reply::Success {
                id: first,
                value: "3".into(),
                elapsed: None,
            });
            sender.shutdown();
        });

        assert_eq!(tracker.run(rx).await, 2);
        assert!(tracker.registry().is_empty());
        assert!(!mailbox.reply(Reply::Done { token: 10 }));
    }

    #[tokio::test]
    async fn test_commands_while_running() {
        let (mut tracker, doc) = setup("(+ 1 2)\n(/ 1 0)\n");
        let (mailbox, rx) = mailbox();

        let client = async {
            let submitted = mailbox
                .request(Command::Submit {
                    document: doc,
                    ranges: vec![TextRange::new(0, 7), TextRange::new(8, 15)],
                    options: SubmitOptions::default(),
                })
                .await;
            let ids = match submitted {
                Some(CommandOutcome::Submitted(ids)) => ids,
                other => panic!("unexpected outcome {:?}", other),
            };
            mailbox.reply(Reply::Success {
                id: ids[0],
                value: "3".into(),
                elapsed: None,
            });
            let copied = mailbox.request(Command::CopyResult(Cursor::caret(doc, 3))).await;
            let interrupted = mailbox.request(Command::Interrupt(doc)).await;
            mailbox.shutdown();
            (ids, copied, interrupted)
        };

        let (swept, (ids, copied, interrupted)) = tokio::join!(tracker.run(rx), client);

        assert_eq!(ids, vec![EvalId(10), EvalId(11)]);
        assert_eq!(
            copied,
            Some(CommandOutcome::Copied(CopyOutcome::Value("3".into())))
        );
        assert_eq!(
            interrupted,
            Some(CommandOutcome::Interrupted(Some(BatchId(10))))
        );
        assert_eq!(swept, 2);
    }

    #[test]
    fn test_command_without_respond() {
        let (mut tracker, doc) = setup("(+ 1 2)\n");
        let (mailbox, mut rx) = mailbox();

        mailbox.post(Inbox::Command {
            command: Command::Submit {
                document: doc,
                ranges: vec![TextRange::new(0, 7)],
                options: SubmitOptions::default(),
            },
            respond: None,
        });

        assert_eq!(tracker.drain(&mut rx), ControlFlow::Continue(()));
        assert_eq!(tracker.registry().len(), 1);
    }

    #[test]
    fn test_command_after_stop() {
        let (_, doc) = setup("(+ 1 2)\n");
        let (mailbox, rx) = mailbox();
        drop(rx);

        assert!(mailbox.command(Command::Interrupt(doc)).is_none());
    }

    #[tokio::test]
    async fn test_run_stops_when_mailboxes_dropped() {
        let (mut tracker, doc) = setup("(+ 1 2)\n");
        tracker.create(doc, TextRange::new(0, 7), EvalOptions::default());
        let (mailbox, rx) = mailbox();
        drop(mailbox);

        assert_eq!(tracker.run(rx).await, 1);
    }
}
