#![allow(dead_code)]

pub mod mock_clipboard;
pub mod mock_host;

use std::time::Instant;

use modal_mini::selection::{Range, Selection};
use modal_mini::{Editor, KeyInput, parse_sequence};

/// Feed keys in `C-x` notation, all at the same instant so nothing times out.
pub fn feed(editor: &mut Editor, keys: &str) {
    feed_at(editor, keys, Instant::now());
}

pub fn feed_at(editor: &mut Editor, keys: &str, now: Instant) {
    for key in parse_sequence(keys).unwrap() {
        editor.handle_key(key, now);
    }
}

pub fn key(c: char) -> KeyInput {
    KeyInput::char(c)
}

/// Head of the primary range.
pub fn cursor(editor: &Editor) -> usize {
    editor.selection().primary().head
}

pub fn carets(editor: &mut Editor, positions: &[usize]) {
    let ranges = positions.iter().map(|&p| Range::point(p)).collect();
    editor.set_selection(Selection::new(ranges, 0));
}

pub fn heads(editor: &Editor) -> Vec<usize> {
    editor.selection().iter().map(|r| r.head).collect()
}
