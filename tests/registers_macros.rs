use std::time::Instant;

use modal_mini::register::{BLACKHOLE, DEFAULT_MACRO, GlobalRegisters, RegisterValue, Registers, UNNAMED};
use modal_mini::{Editor, KeyInput, parse_sequence};

mod support;
use support::mock_clipboard::MockClipboard;
use support::{carets, cursor, feed};

fn text_of(ed: &Editor, name: char) -> Option<Vec<String>> {
    ed.registers().fragments(name)
}

#[test]
fn test_named_register_yank_and_paste() {
    let mut ed = Editor::new("foo bar");
    feed(&mut ed, "\" a y w");
    assert_eq!(text_of(&ed, 'a'), Some(vec!["foo ".to_string()]));
    assert_eq!(text_of(&ed, UNNAMED), Some(vec!["foo ".to_string()]));
    feed(&mut ed, "\" a P");
    assert_eq!(ed.text(), "foo foo bar");
}

#[test]
fn test_register_selection_applies_once() {
    let mut ed = Editor::new("abc");
    feed(&mut ed, "\" a x x");
    assert_eq!(text_of(&ed, 'a'), Some(vec!["a".to_string()]));
    assert_eq!(text_of(&ed, UNNAMED), Some(vec!["b".to_string()]));
}

#[test]
fn test_blackhole_keeps_unnamed() {
    let mut ed = Editor::new("foo bar baz");
    feed(&mut ed, "y w w \" _ d w");
    assert_eq!(ed.text(), "foo baz");
    assert_eq!(text_of(&ed, UNNAMED), Some(vec!["foo ".to_string()]));
    assert_eq!(text_of(&ed, BLACKHOLE), None);
}

#[test]
fn test_motions_do_not_touch_registers() {
    let mut ed = Editor::new("foo bar");
    feed(&mut ed, "w b e $ 0");
    assert_eq!(text_of(&ed, UNNAMED), None);
}

#[test]
fn test_last_fragment_is_reused() {
    let mut ed = Editor::new("ab\ncd\nef");
    ed.registers_mut().yank('a', vec!["X".to_string()]);
    carets(&mut ed, &[0, 3, 6]);
    feed(&mut ed, "\" a P");
    assert_eq!(ed.text(), "Xab\nXcd\nXef");
}

#[test]
fn test_global_registers_are_shared() {
    let globals = GlobalRegisters::new();
    let mut one = Registers::new(globals.clone(), vec!['*', '+']);
    let two = Registers::new(globals.clone(), vec!['*', '+']);

    one.yank('*', vec!["shared".to_string()]);
    one.yank('l', vec!["local".to_string()]);
    assert_eq!(two.fragments('*'), Some(vec!["shared".to_string()]));
    assert_eq!(two.fragments('l'), None);
    assert_eq!(two.fragments(UNNAMED), None, "unnamed is per document");
}

#[test]
fn test_clipboard_register_mirrors_system_clipboard() {
    let clipboard = MockClipboard::new();
    let globals = GlobalRegisters::new().with_clipboard(Box::new(clipboard.clone()));
    let mut regs = Registers::new(globals, vec!['+']);

    regs.yank('+', vec!["a".to_string(), "b".to_string()]);
    assert_eq!(clipboard.content().as_deref(), Some("a\nb"));
    assert_eq!(regs.fragments('+'), Some(vec!["a".to_string(), "b".to_string()]));

    clipboard.put("from outside");
    assert_eq!(regs.fragments('+'), Some(vec!["from outside".to_string()]));
}

#[test]
fn test_macro_record_and_replay() {
    let mut ed = Editor::new("one\ntwo\nthree");
    feed(&mut ed, "Q A ! esc j Q");
    assert!(!ed.is_recording());
    assert_eq!(
        ed.registers().macro_keys(DEFAULT_MACRO),
        Some(parse_sequence("A ! esc j").unwrap())
    );
    feed(&mut ed, "q q");
    assert_eq!(ed.text(), "one!\ntwo!\nthree!");
}

#[test]
fn test_macro_into_named_register_with_count() {
    let mut ed = Editor::new("abcdef");
    feed(&mut ed, "\" m Q x Q");
    assert_eq!(ed.text(), "bcdef");
    assert!(matches!(
        ed.registers().get('m'),
        Some(RegisterValue::Macro(keys)) if keys == vec![KeyInput::char('x')]
    ));
    feed(&mut ed, "\" m 3 q");
    assert_eq!(ed.text(), "ef");
}

#[test]
fn test_macro_replay_matches_live_session() {
    let start = "alpha beta\ngamma delta\n";
    let session = "w c w B esc j 0 d e x";

    let mut live = Editor::new(start);
    feed(&mut live, &format!("Q {session} Q"));
    let keys = live.registers().macro_keys(DEFAULT_MACRO).unwrap();

    let mut replayed = Editor::new(start);
    let now = Instant::now();
    for key in keys {
        replayed.handle_key(key, now);
    }
    assert_eq!(replayed.text(), live.text());
    assert_eq!(replayed.selection(), live.selection());
    assert_eq!(replayed.mode(), live.mode());
}

#[test]
fn test_macro_keeps_pending_sequences() {
    let mut ed = Editor::new("a\nb\nc\nd");
    feed(&mut ed, "Q g g Q G q");
    assert_eq!(cursor(&ed), 0, "replayed g g resolves as a sequence");
}

#[test]
fn test_recursive_macro_terminates() {
    let mut ed = Editor::new("abc");
    feed(&mut ed, "Q q Q");
    assert!(ed.handle_key(KeyInput::char('q'), Instant::now()));
    assert_eq!(ed.text(), "abc");
}

#[test]
fn test_repeat_delete() {
    let mut ed = Editor::new("a b c d");
    feed(&mut ed, "d w .");
    assert_eq!(ed.text(), "c d");

    let mut ed = Editor::new("abcdef");
    feed(&mut ed, "2 x .");
    assert_eq!(ed.text(), "ef");
}

#[test]
fn test_repeat_insert_session() {
    let mut ed = Editor::new("foo\nbar");
    feed(&mut ed, "A ! esc j .");
    assert_eq!(ed.text(), "foo!\nbar!");
    assert_eq!(ed.history().undo_len(), 2);
}

#[test]
fn test_repeat_change() {
    let mut ed = Editor::new("foo bar");
    feed(&mut ed, "c w X esc w .");
    assert_eq!(ed.text(), "X X");
}

#[test]
fn test_repeat_ignores_motions_and_yanks() {
    let mut ed = Editor::new("abcdef");
    feed(&mut ed, "x l y l $ 0 .");
    assert_eq!(ed.text(), "cdef");
}

#[test]
fn test_counted_self_replay_terminates() {
    let mut ed = Editor::new("abc");
    feed(&mut ed, "Q 3 q Q");
    assert_eq!(ed.registers().macro_keys(DEFAULT_MACRO), Some(parse_sequence("3 q").unwrap()));
    assert!(ed.handle_key(KeyInput::char('q'), Instant::now()));
    assert_eq!(ed.text(), "abc");
}

#[test]
fn test_macro_replays_another_macro() {
    let mut ed = Editor::new("abcdefgh");
    feed(&mut ed, "\" b Q x Q");
    feed(&mut ed, "\" a Q \" b 2 q Q");
    assert_eq!(ed.text(), "defgh");
    feed(&mut ed, "\" a q");
    assert_eq!(ed.text(), "fgh");
}

#[test]
fn test_mutually_recursive_macros_terminate() {
    let mut ed = Editor::new("abcdef");
    ed.registers_mut().set_macro('a', parse_sequence("x \" b 2 q").unwrap());
    ed.registers_mut().set_macro('b', parse_sequence("x \" a 2 q").unwrap());
    feed(&mut ed, "\" a q");
    // a deletes one char, b deletes one each run, and nested a is refused.
    assert_eq!(ed.text(), "def");
}

#[test]
fn test_register_selection_dropped_by_motion() {
    let mut ed = Editor::new("abcdef");
    feed(&mut ed, "y l \" a l l x");
    assert_eq!(text_of(&ed, 'a'), None);
    assert_eq!(text_of(&ed, UNNAMED), Some(vec!["c".to_string()]));
}
