//! Undo/redo history.

use nbfiddle::history::{EditHistory, HISTORY_CAPACITY};
use nbfiddle::notebook::{Cell, Notebook};

fn snapshot(source: &str) -> Notebook {
    let mut nb = Notebook::create();
    nb.push(Cell::code(source));
    nb
}

fn first_source(nb: Option<&Notebook>) -> Option<String> {
    nb.and_then(|n| n.cells().first()).map(|c| c.source.clone())
}

#[test]
fn empty_history_cannot_move() {
    let mut history = EditHistory::new();
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert!(history.undo().is_none());
    assert!(history.redo().is_none());
}

#[test]
fn undo_then_redo_walks_snapshots() {
    let mut history = EditHistory::new();
    history.record(snapshot("a"));
    history.record(snapshot("b"));
    history.record(snapshot("c"));

    assert_eq!(first_source(history.undo()), Some("b".to_owned()));
    assert_eq!(first_source(history.undo()), Some("a".to_owned()));
    assert!(history.undo().is_none());
    assert_eq!(first_source(history.redo()), Some("b".to_owned()));
    assert_eq!(first_source(history.redo()), Some("c".to_owned()));
    assert!(history.redo().is_none());
}

#[test]
fn recording_after_undo_discards_redo_branch() {
    let mut history = EditHistory::new();
    history.record(snapshot("a"));
    history.record(snapshot("b"));
    history.record(snapshot("c"));
    let _ = history.undo();
    let _ = history.undo();

    history.record(snapshot("d"));

    assert!(!history.can_redo());
    assert_eq!(history.len(), 2);
    assert_eq!(first_source(history.undo()), Some("a".to_owned()));
}

#[test]
fn capacity_drops_oldest_snapshot() {
    let mut history = EditHistory::new();
    let total = HISTORY_CAPACITY.saturating_add(5);
    for i in 0..total {
        history.record(snapshot(&i.to_string()));
    }

    assert_eq!(history.len(), HISTORY_CAPACITY);
    let mut oldest = None;
    while let Some(nb) = history.undo() {
        oldest = first_source(Some(nb));
    }
    assert_eq!(oldest, Some("5".to_owned()));
}

#[test]
fn clear_forgets_everything() {
    let mut history = EditHistory::new();
    history.record(snapshot("a"));
    history.record(snapshot("b"));

    history.clear();

    assert!(history.is_empty());
    assert!(!history.can_undo());
}
