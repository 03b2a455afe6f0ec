//! Document mutation tests
//!
//! Verifies that edits shift, keep or invalidate evaluations, alone and
//! through the dispatcher.

use evalsync::tracker::connection::{RecordingConnection, Reply};
use evalsync::tracker::dispatch::{self, Inbox};
use evalsync::tracker::host::{DocumentHost, MemoryHost};
use evalsync::tracker::ids::{DocumentId, EvalId, WindowId};
use evalsync::tracker::range::TextRange;
use evalsync::tracker::status::EvalStatus;
use evalsync::tracker::watcher::changed_ranges;
use evalsync::{EvalOptions, Tracker, TrackerConfig};
use std::ops::ControlFlow;

type TestTracker = Tracker<MemoryHost, RecordingConnection>;

fn tracker_with(text: &str) -> (TestTracker, DocumentId) {
    let mut host = MemoryHost::new();
    let doc = host.open(WindowId::new(), text);
    (Tracker::new(TrackerConfig::default(), host, RecordingConnection::new()), doc)
}

fn range_of(tracker: &TestTracker, id: EvalId) -> Option<TextRange> {
    let handle = tracker.eval(id)?.handle()?;
    tracker.host().resolve(handle)
}

#[test]
fn edits_flow_through_the_dispatcher() {
    let (mut tracker, doc) = tracker_with("(+ 1 2)\n(+ 3 4)\n");
    let first = tracker.create(doc, TextRange::new(0, 7), EvalOptions::default()).unwrap();
    let second = tracker.create(doc, TextRange::new(8, 15), EvalOptions::default()).unwrap();
    let (mailbox, mut rx) = dispatch::mailbox();

    let edit = tracker.host_mut().edit(doc, TextRange::new(5, 6), "9").unwrap();
    mailbox.text_changed(doc, changed_ranges(&[edit]));
    mailbox.reply(Reply::Success {
        id: first,
        value: "11".into(),
        elapsed: None,
    });
    mailbox.reply(Reply::Success {
        id: second,
        value: "7".into(),
        elapsed: None,
    });

    assert_eq!(tracker.drain(&mut rx), ControlFlow::Continue(()));
    assert!(tracker.eval(first).is_none());
    assert_eq!(tracker.eval(second).unwrap().status(), EvalStatus::Success);
}

#[test]
fn deleting_a_line_above_shifts_the_range() {
    let (mut tracker, doc) = tracker_with("(def a 1)\n(def b 2)\n(+ a b)\n");
    let id = tracker.create(doc, TextRange::new(20, 27), EvalOptions::default()).unwrap();

    let edit = tracker.host_mut().edit(doc, TextRange::new(0, 10), "").unwrap();
    assert_eq!(tracker.on_text_changed(doc, &changed_ranges(&[edit])), 0);

    assert_eq!(range_of(&tracker, id), Some(TextRange::new(10, 17)));
    assert_eq!(tracker.host().substr(doc, TextRange::new(10, 17)).as_deref(), Some("(+ a b)"));
}

#[test]
fn deleting_the_evaluated_line_erases() {
    let (mut tracker, doc) = tracker_with("(def a 1)\n(+ a 1)\n");
    let id = tracker.create(doc, TextRange::new(10, 17), EvalOptions::default()).unwrap();

    let edit = tracker.host_mut().edit(doc, TextRange::new(9, 17), "").unwrap();
    assert_eq!(tracker.on_text_changed(doc, &changed_ranges(&[edit])), 1);
    assert!(tracker.eval(id).is_none());
}

#[test]
fn typing_at_the_boundary_keeps_the_evaluation() {
    let (mut tracker, doc) = tracker_with("(+ 1 2)\n");
    let id = tracker.create(doc, TextRange::new(0, 7), EvalOptions::default()).unwrap();

    let edit = tracker.host_mut().edit(doc, TextRange::point(7), " ; three").unwrap();
    assert_eq!(tracker.on_text_changed(doc, &changed_ranges(&[edit])), 0);
    assert_eq!(range_of(&tracker, id), Some(TextRange::new(0, 7)));
}

#[test]
fn edits_that_restore_the_text_keep_the_evaluation() {
    let (mut tracker, doc) = tracker_with("(+ 1 2)\n");
    let id = tracker.create(doc, TextRange::new(0, 7), EvalOptions::default()).unwrap();

    let typed = tracker.host_mut().edit(doc, TextRange::new(3, 4), "10").unwrap();
    let undone = tracker.host_mut().edit(doc, TextRange::new(3, 5), "1").unwrap();

    assert_eq!(tracker.on_text_changed(doc, &changed_ranges(&[typed, undone])), 0);
    assert_eq!(tracker.eval(id).unwrap().code(), "(+ 1 2)");
}

#[test]
fn repeated_invalidation_is_harmless() {
    let (mut tracker, doc) = tracker_with("(+ 1 2)\n(+ 3 4)\n");
    tracker.create(doc, TextRange::new(0, 7), EvalOptions::default());
    tracker.create(doc, TextRange::new(8, 15), EvalOptions::default());

    let edit = tracker.host_mut().edit(doc, TextRange::new(0, 16), "").unwrap();
    let changes = changed_ranges(&[edit]);

    assert_eq!(tracker.on_text_changed(doc, &changes), 2);
    assert_eq!(tracker.on_text_changed(doc, &changes), 0);
    assert!(tracker.registry().is_empty());
}

#[test]
fn completed_evaluations_are_invalidated_too() {
    let (mut tracker, doc) = tracker_with("(+ 1 2)\n");
    let id = tracker.create(doc, TextRange::new(0, 7), EvalOptions::default()).unwrap();
    tracker.on_success(id, "3".into(), None);
    tracker.toggle_overlay(id);

    let edit = tracker.host_mut().edit(doc, TextRange::new(1, 2), "*").unwrap();
    tracker.on_text_changed(doc, &changed_ranges(&[edit]));

    assert!(tracker.eval(id).is_none());
    assert_eq!(tracker.host().overlay_count(), 0);
}

#[test]
fn closing_a_document_sweeps_it() {
    let (mut tracker, doc) = tracker_with("(a)\n");
    let other = tracker.host_mut().open(WindowId::new(), "(b)\n");
    tracker.create(doc, TextRange::new(0, 3), EvalOptions::default());
    let kept = tracker.create(other, TextRange::new(0, 3), EvalOptions::default()).unwrap();
    let (mailbox, mut rx) = dispatch::mailbox();

    tracker.host_mut().close(doc);
    mailbox.post(Inbox::DocumentClosed(doc));
    assert_eq!(tracker.drain(&mut rx), ControlFlow::Continue(()));

    assert_eq!(tracker.registry().len(), 1);
    assert!(tracker.eval(kept).is_some());
}
