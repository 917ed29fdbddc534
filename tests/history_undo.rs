use modal_mini::buffer::Buffer;
use modal_mini::history::History;
use modal_mini::selection::{Range, Selection};
use modal_mini::transaction::{Assoc, Change, ChangeSet, Transaction};
use modal_mini::{EditError, Editor, Mode};

mod support;
use support::{cursor, feed};

#[test]
fn test_undo_redo_single_steps() {
    let mut ed = Editor::new("abc");
    feed(&mut ed, "x x");
    assert_eq!(ed.text(), "c");
    feed(&mut ed, "u");
    assert_eq!(ed.text(), "bc");
    feed(&mut ed, "u");
    assert_eq!(ed.text(), "abc");
    assert!(!ed.undo(), "empty history is a no-op");
    assert_eq!(ed.text(), "abc");

    feed(&mut ed, "U");
    assert_eq!(ed.text(), "bc");
    feed(&mut ed, "C-r");
    assert_eq!(ed.text(), "c");
    assert!(!ed.redo());
}

#[test]
fn test_new_edit_clears_redo() {
    let mut ed = Editor::new("abc");
    feed(&mut ed, "x u");
    assert!(ed.history().can_redo());
    feed(&mut ed, "l x");
    assert_eq!(ed.text(), "ac");
    assert!(!ed.history().can_redo());
}

#[test]
fn test_undo_restores_selection() {
    let mut ed = Editor::new("hello world");
    feed(&mut ed, "w d w 0");
    assert_eq!(ed.text(), "hello ");
    assert_eq!(cursor(&ed), 0);
    feed(&mut ed, "u");
    assert_eq!(ed.text(), "hello world");
    assert_eq!(cursor(&ed), 6);
}

#[test]
fn test_insert_session_is_one_step() {
    let mut ed = Editor::new("");
    feed(&mut ed, "i a b c ret d esc");
    assert_eq!(ed.text(), "abc\nd");
    assert_eq!(ed.history().undo_len(), 1);
    feed(&mut ed, "u");
    assert_eq!(ed.text(), "");
    assert_eq!(ed.mode(), Mode::Normal);
    feed(&mut ed, "U");
    assert_eq!(ed.text(), "abc\nd");
}

#[test]
fn test_undo_count() {
    let mut ed = Editor::new("abcd");
    feed(&mut ed, "x x x 2 u");
    assert_eq!(ed.text(), "bcd");
}

#[test]
fn test_motions_are_not_recorded() {
    let mut ed = Editor::new("a b c\nd");
    feed(&mut ed, "w w j k b v l esc");
    assert_eq!(ed.history().undo_len(), 0);
    assert!(!ed.history().can_undo());
}

#[test]
fn test_version_moves_on_every_change() {
    let mut ed = Editor::new("abc");
    let v0 = ed.buffer().version();
    feed(&mut ed, "x");
    let v1 = ed.buffer().version();
    feed(&mut ed, "u");
    let v2 = ed.buffer().version();
    feed(&mut ed, "U");
    let v3 = ed.buffer().version();
    assert!(v0 < v1 && v1 < v2 && v2 < v3);
    feed(&mut ed, "l h");
    assert_eq!(ed.buffer().version(), v3);
}

#[test]
fn test_commit_then_undo_is_identity() {
    let mut buffer = Buffer::new("one two three");
    let mut history = History::new();
    let before = Selection::new(vec![Range::point(0), Range::point(4)], 1);
    let tx = Transaction::change(vec![
        Change::replace(0, 3, "1"),
        Change::insert(7, "!"),
        Change::delete(7, 13),
    ]);

    let after = history
        .commit(&mut buffer, &tx, &before, Mode::Normal)
        .unwrap();
    assert_eq!(buffer.contents(), "1 two!");
    assert_eq!(after.len(), 2);

    let restored = history.undo(&mut buffer).unwrap().unwrap();
    assert_eq!(buffer.contents(), "one two three");
    assert_eq!(restored.selection, before);
    assert_eq!(restored.mode, Mode::Normal);
}

#[test]
fn test_group_collects_revisions() {
    let mut buffer = Buffer::new("");
    let mut history = History::new();
    let sel = Selection::point(0);
    history.begin_group(&sel, Mode::Normal);
    for (i, ch) in ["a", "b", "c"].iter().enumerate() {
        let tx = Transaction::change(vec![Change::insert(i, *ch)]);
        history
            .commit(&mut buffer, &tx, &Selection::point(i), Mode::Insert)
            .unwrap();
    }
    assert_eq!(history.undo_len(), 0, "open group is not sealed yet");
    assert!(history.can_undo());
    assert!(history.end_group());
    assert_eq!(history.undo_len(), 1);

    let restored = history.undo(&mut buffer).unwrap().unwrap();
    assert_eq!(buffer.contents(), "");
    assert_eq!(restored.applied.len(), 3);
    assert_eq!(restored.selection, sel);
}

#[test]
fn test_empty_group_leaves_no_entry() {
    let mut history = History::new();
    history.begin_group(&Selection::point(0), Mode::Normal);
    assert!(!history.end_group());
    assert_eq!(history.undo_len(), 0);
}

#[test]
fn test_invalid_transaction_leaves_buffer_untouched() {
    let mut buffer = Buffer::new("abc");
    let mut history = History::new();
    let before = Selection::point(0);

    let out_of_bounds = Transaction::change(vec![Change::delete(2, 9)]);
    let err = history
        .commit(&mut buffer, &out_of_bounds, &before, Mode::Normal)
        .unwrap_err();
    assert!(matches!(err, EditError::ChangeOutOfBounds { .. }));

    let overlapping = Transaction::new(ChangeSet::from_changes(vec![
        Change::delete(0, 2),
        Change::delete(1, 3),
    ]));
    let err = history
        .commit(&mut buffer, &overlapping, &before, Mode::Normal)
        .unwrap_err();
    assert!(matches!(err, EditError::OverlappingChanges { at: 1 }));

    let bad_selection = Transaction::change(vec![Change::delete(0, 1)])
        .with_selection(Selection::point(10));
    let err = history
        .commit(&mut buffer, &bad_selection, &before, Mode::Normal)
        .unwrap_err();
    assert!(matches!(err, EditError::InconsistentSelection { .. }));

    assert_eq!(buffer.contents(), "abc");
    assert_eq!(buffer.version(), 0);
    assert!(!history.can_undo());
}

#[test]
fn test_change_set_maps_positions() {
    let changes = ChangeSet::from_changes(vec![Change::insert(2, "xy"), Change::delete(4, 6)]);
    assert_eq!(changes.map_pos(1, Assoc::After), 1);
    assert_eq!(changes.map_pos(2, Assoc::Before), 2);
    assert_eq!(changes.map_pos(2, Assoc::After), 4);
    assert_eq!(changes.map_pos(5, Assoc::Before), 6);
    assert_eq!(changes.map_pos(7, Assoc::After), 7);
    assert_eq!(changes.len_after(8), 8);
}
