//! Batch interrupt tests
//!
//! Covers the cascade from the oldest in-flight batch, the status-bar
//! evaluation taking part in it, and batch-wide `done` cleanup.

use evalsync::tracker::commands::SubmitOptions;
use evalsync::tracker::connection::{RecordingConnection, Reply, Request};
use evalsync::tracker::host::MemoryHost;
use evalsync::tracker::ids::{BatchId, DocumentId, EvalId, SessionId, WindowId};
use evalsync::tracker::range::TextRange;
use evalsync::tracker::status::EvalStatus;
use evalsync::{EvalOptions, Tracker, TrackerConfig};

type TestTracker = Tracker<MemoryHost, RecordingConnection>;

fn tracker_with(text: &str) -> (TestTracker, WindowId, DocumentId, RecordingConnection) {
    let window = WindowId::new();
    let mut host = MemoryHost::new();
    let doc = host.open(window, text);
    let conn = RecordingConnection::new();
    (Tracker::new(TrackerConfig::default(), host, conn.clone()), window, doc, conn)
}

fn in_batch(batch: u64) -> EvalOptions {
    EvalOptions {
        batch: Some(BatchId(batch)),
        ..EvalOptions::default()
    }
}

fn status(tracker: &TestTracker, id: EvalId) -> EvalStatus {
    tracker.eval(id).unwrap().status()
}

#[test]
fn interrupt_cascades_through_oldest_batch() {
    let (mut tracker, window, doc, conn) = tracker_with("(c)\n(a)\n(b)\n");
    // created first, but in the younger batch
    let c = tracker.create(doc, TextRange::new(0, 3), in_batch(7)).unwrap();
    let a = tracker.create(doc, TextRange::new(4, 7), in_batch(5)).unwrap();
    let b = tracker.create(doc, TextRange::new(8, 11), in_batch(5)).unwrap();
    tracker.on_session(a, SessionId::new("s-1"));

    assert_eq!(tracker.interrupt_oldest(Some(window), doc), Some(BatchId(5)));

    assert_eq!(status(&tracker, a), EvalStatus::Interrupt);
    assert_eq!(status(&tracker, b), EvalStatus::Interrupt);
    assert_eq!(status(&tracker, c), EvalStatus::Pending);
    assert_eq!(
        conn.interrupts(),
        vec![Request::Interrupt {
            batch_id: BatchId(5),
            id: a,
            session: Some(SessionId::new("s-1")),
        }]
    );
}

#[test]
fn interrupted_evaluation_still_completes() {
    let (mut tracker, window, doc, _) = tracker_with("(a)\n(b)\n");
    let ids = tracker.submit_evaluation(
        doc,
        &[TextRange::new(0, 3), TextRange::new(4, 7)],
        SubmitOptions::default(),
    );
    tracker.interrupt_oldest(Some(window), doc);

    tracker.on_success(ids[0], "nil".into(), None);
    tracker.on_success(ids[1], ":error 1".into(), None);

    assert_eq!(status(&tracker, ids[0]), EvalStatus::Success);
    assert_eq!(status(&tracker, ids[1]), EvalStatus::Failure);
}

#[test]
fn interrupted_evaluation_cannot_be_interrupted_again() {
    let (mut tracker, window, doc, conn) = tracker_with("(a)\n");
    tracker.create(doc, TextRange::new(0, 3), EvalOptions::default());

    assert!(tracker.interrupt_oldest(Some(window), doc).is_some());
    assert!(tracker.interrupt_oldest(Some(window), doc).is_none());
    assert_eq!(conn.interrupts().len(), 1);
}

#[test]
fn interrupted_status_bar_evaluation_yields_to_younger_batches() {
    let (mut tracker, window, doc, conn) = tracker_with("(a)\n");
    let loading = tracker.create_status(window, "(load)".into(), EvalOptions::default());
    let a = tracker.create(doc, TextRange::new(0, 3), EvalOptions::default()).unwrap();

    assert_eq!(tracker.interrupt_oldest(Some(window), doc), Some(BatchId::from(loading)));
    assert_eq!(tracker.interrupt_oldest(Some(window), doc), Some(BatchId::from(a)));
    assert_eq!(tracker.interrupt_oldest(Some(window), doc), None);

    assert_eq!(status(&tracker, loading), EvalStatus::Interrupt);
    assert_eq!(status(&tracker, a), EvalStatus::Interrupt);
    assert_eq!(conn.interrupts().len(), 2);
}

#[test]
fn done_for_batch_erases_abandoned_members() {
    let (mut tracker, window, doc, _) = tracker_with("(a)\n(b)\n(c)\n");
    let ids = tracker.submit_evaluation(
        doc,
        &[TextRange::new(0, 3), TextRange::new(4, 7), TextRange::new(8, 11)],
        SubmitOptions::default(),
    );
    tracker.on_success(ids[0], "1".into(), None);
    tracker.interrupt_oldest(Some(window), doc);

    // the first member is still live, so its id resolves as a single evaluation
    tracker.handle_reply(Reply::Done { token: ids[0].0 });
    assert!(tracker.eval(ids[0]).is_some());
    assert_eq!(status(&tracker, ids[1]), EvalStatus::Interrupt);

    tracker.erase(ids[0]);
    tracker.handle_reply(Reply::Done { token: ids[0].0 });
    assert!(tracker.eval(ids[1]).is_none());
    assert!(tracker.eval(ids[2]).is_none());
}

#[test]
fn done_keeps_lookups() {
    let (mut tracker, _, doc, _) = tracker_with("(inc 1)\n");
    let id = tracker.request_lookup(doc, TextRange::new(1, 4), "user").unwrap();
    tracker.handle_reply(Reply::Lookup { id, info: None });

    tracker.handle_reply(Reply::Done { token: id.0 });
    assert_eq!(status(&tracker, id), EvalStatus::Lookup);
}

#[test]
fn unknown_done_token_is_noop() {
    let (mut tracker, _, doc, _) = tracker_with("(a)\n");
    let id = tracker.create(doc, TextRange::new(0, 3), EvalOptions::default()).unwrap();

    tracker.handle_reply(Reply::Done { token: 4242 });
    assert_eq!(status(&tracker, id), EvalStatus::Pending);
}
