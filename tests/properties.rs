//! Property tests for id allocation, line occupancy and sticky ranges

use evalsync::tracker::connection::RecordingConnection;
use evalsync::tracker::host::{DocumentHost, MemoryHost};
use evalsync::tracker::ids::{EvalId, WindowId};
use evalsync::tracker::range::TextRange;
use evalsync::{EvalOptions, Tracker, TrackerConfig};
use proptest::prelude::*;
use std::collections::HashSet;

const LINES: [&str; 5] = ["(a) (b) (c)", "(def x 1)", "", "(run)", "(+ 1 2) (+ 3 4)"];

fn document_text() -> String {
    LINES.iter().map(|line| format!("{}\n", line)).collect()
}

fn line_picks() -> impl Strategy<Value = Vec<(usize, usize, usize)>> {
    prop::collection::vec((0usize..5, 0usize..16, 1usize..6), 1..40)
}

fn line_start(index: usize) -> usize {
    LINES[..index].iter().map(|line| line.chars().count() + 1).sum()
}

proptest! {
    #[test]
    fn ids_are_strictly_increasing(picks in line_picks()) {
        let mut host = MemoryHost::new();
        let doc = host.open(WindowId::new(), &document_text());
        let mut tracker = Tracker::new(TrackerConfig::default(), host, RecordingConnection::new());

        let mut last: Option<EvalId> = None;
        for (index, offset, len) in picks {
            let start = line_start(index);
            let width = LINES[index].len();
            let range = TextRange::new(
                start + offset.min(width),
                start + (offset + len).min(width),
            );
            if let Some(id) = tracker.create(doc, range, EvalOptions::default()) {
                prop_assert!(id >= EvalId(10));
                if let Some(previous) = last {
                    prop_assert!(id > previous);
                }
                last = Some(id);
            }
        }
    }

    #[test]
    fn one_live_evaluation_per_line(picks in line_picks()) {
        let mut host = MemoryHost::new();
        let doc = host.open(WindowId::new(), &document_text());
        let mut tracker = Tracker::new(TrackerConfig::default(), host, RecordingConnection::new());

        for (index, offset, len) in picks {
            let width = LINES[index].len();
            let start = line_start(index);
            let range = TextRange::new(
                start + offset.min(width),
                start + (offset + len).min(width),
            );
            if range.is_empty() {
                continue;
            }
            tracker.create(doc, range, EvalOptions::default());

            let mut lines = HashSet::new();
            for eval in tracker.registry().iter() {
                let resolved = tracker.host().resolve(eval.handle().unwrap()).unwrap();
                let (line, _) = tracker.host().line_col(doc, resolved.start).unwrap();
                prop_assert!(lines.insert(line), "two evaluations on line {}", line);
            }
        }
    }

    #[test]
    fn edits_outside_a_range_preserve_its_text(
        before in "[a-z ]{0,8}",
        after in "[a-z ]{0,8}",
        at_end in any::<bool>(),
    ) {
        let mut host = MemoryHost::new();
        let doc = host.open(WindowId::new(), "(def x 1)\n(+ x 2)\n(run)\n");
        let handle = host.track(doc, TextRange::new(10, 17));

        host.edit(doc, TextRange::point(0), &before);
        let range = host.resolve(handle).unwrap();
        let insert_at = if at_end { range.end } else { range.end + 1 };
        host.edit(doc, TextRange::point(insert_at), &after);

        let range = host.resolve(handle).unwrap();
        let text = host.substr(doc, range);
        prop_assert_eq!(text.as_deref(), Some("(+ x 2)"));
    }
}
