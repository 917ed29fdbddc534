use std::time::{Duration, Instant};

use modal_mini::selection::Range;
use modal_mini::{DocumentId, Engine, FocusContext, KeyCode, Mode, RawKeyEvent, parse_sequence};

mod support;
use support::mock_clipboard::MockClipboard;
use support::mock_host::MockHost;

const DOC: DocumentId = DocumentId(1);

fn open(engine: &mut Engine, id: DocumentId, text: &str) -> MockHost {
    let host = MockHost::new(text);
    engine.init_document(id, host.boxed());
    host
}

fn typed(engine: &mut Engine, id: DocumentId, chars: &str) {
    for ch in chars.chars() {
        engine.push_event(id, FocusContext::Document, &RawKeyEvent::typed(ch));
    }
}

/// Send keys in notation as pressed events.
fn press(engine: &mut Engine, id: DocumentId, keys: &str) {
    let now = Instant::now();
    for key in parse_sequence(keys).unwrap() {
        let event = RawKeyEvent::Pressed {
            code: key.code,
            mods: key.mods,
        };
        engine.push_event_at(id, FocusContext::Document, &event, now);
    }
}

fn mode(engine: &Engine, id: DocumentId) -> Mode {
    engine.document(id).unwrap().editor().mode()
}

#[test]
fn test_edit_is_mirrored_into_host() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "abc");
    assert!(engine.push_event(DOC, FocusContext::Document, &RawKeyEvent::typed('x')));
    assert_eq!(host.text(), "bc");
    assert_eq!(host.replace_calls(), 1);
    assert_eq!(host.selections(), vec![Range::point(0)]);
}

#[test]
fn test_events_outside_editable_documents_pass_through() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "abc");
    let x = RawKeyEvent::typed('x');
    assert!(!engine.push_event(DOC, FocusContext::Other, &x));
    assert!(!engine.push_event(DOC, FocusContext::ReadOnlyDocument, &x));
    assert!(!engine.push_event(DocumentId(99), FocusContext::Document, &x));
    assert_eq!(host.text(), "abc");
}

#[test]
fn test_motion_pushes_selection_only() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "abc");
    assert!(engine.push_event(DOC, FocusContext::Document, &RawKeyEvent::pressed(KeyCode::Right)));
    assert_eq!(host.selections(), vec![Range::point(1)]);
    assert_eq!(host.replace_calls(), 0);
}

#[test]
fn test_host_selection_is_adopted() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "abc");
    host.select(vec![Range::point(2)]);
    typed(&mut engine, DOC, "x");
    assert_eq!(host.text(), "ab");
}

#[test]
fn test_multiple_carets_push_every_change() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "abc\ndef");
    host.select(vec![Range::point(0), Range::point(4)]);
    typed(&mut engine, DOC, "x");
    assert_eq!(host.text(), "bc\nef");
    assert_eq!(host.replace_calls(), 2);

    let editor = engine.document(DOC).unwrap().editor();
    assert_eq!(host.selections(), editor.selection().ranges());
    assert_eq!(host.primary(), editor.selection().primary_index());
}

#[test]
fn test_external_edit_drops_history() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "abc");
    typed(&mut engine, DOC, "x");
    assert_eq!(host.text(), "bc");

    host.set_text("something else");
    typed(&mut engine, DOC, "u");
    assert_eq!(host.text(), "something else");
    let editor = engine.document(DOC).unwrap().editor();
    assert_eq!(editor.text(), "something else");
    assert!(!editor.history().can_undo());
}

#[test]
fn test_undo_and_redo_sync_host() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "one two");
    press(&mut engine, DOC, "d w");
    assert_eq!(host.text(), "two");
    press(&mut engine, DOC, "u");
    assert_eq!(host.text(), "one two");
    press(&mut engine, DOC, "U");
    assert_eq!(host.text(), "two");
}

#[test]
fn test_control_characters_are_named_keys() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "abc");
    typed(&mut engine, DOC, "i\r\u{1b}");
    assert_eq!(host.text(), "\nabc");
    assert_eq!(mode(&engine, DOC), Mode::Normal);

    typed(&mut engine, DOC, "u");
    assert_eq!(host.text(), "abc");
    // Ctrl-R arrives as the control character it produces.
    typed(&mut engine, DOC, "\u{12}");
    assert_eq!(host.text(), "\nabc");

    assert!(!engine.push_event(DOC, FocusContext::Document, &RawKeyEvent::typed('\0')));
}

#[test]
fn test_insert_typing_reaches_host() {
    let mut engine = Engine::new();
    let host = open(&mut engine, DOC, "");
    typed(&mut engine, DOC, "ihello\u{1b}");
    assert_eq!(host.text(), "hello");
    assert_eq!(host.replace_calls(), 5);
}

#[test]
fn test_engine_tick_flushes_pending_sequence() {
    let mut engine = Engine::new();
    open(&mut engine, DOC, "abc");
    let t0 = Instant::now();
    engine.push_event_at(DOC, FocusContext::Document, &RawKeyEvent::typed('g'), t0);
    let pending = engine.document(DOC).unwrap().editor().snapshot().pending_keys;
    assert_eq!(pending.len(), 1);

    assert!(!engine.tick(DOC, t0 + Duration::from_millis(10)));
    assert!(engine.tick(DOC, t0 + Duration::from_secs(1)));
    assert!(engine.document(DOC).unwrap().editor().pending().is_idle());
    assert!(!engine.tick(DocumentId(7), t0));
}

#[test]
fn test_documents_keep_separate_state() {
    let mut engine = Engine::new();
    let first = open(&mut engine, DocumentId(1), "aaa");
    let second = open(&mut engine, DocumentId(2), "bbb");
    typed(&mut engine, DocumentId(1), "i");
    assert_eq!(mode(&engine, DocumentId(1)), Mode::Insert);
    assert_eq!(mode(&engine, DocumentId(2)), Mode::Normal);

    typed(&mut engine, DocumentId(2), "x");
    typed(&mut engine, DocumentId(1), "x");
    assert_eq!(second.text(), "bb");
    assert_eq!(first.text(), "xaaa");
}

#[test]
fn test_global_registers_cross_documents() {
    let mut engine = Engine::new();
    open(&mut engine, DocumentId(1), "foo bar");
    let second = open(&mut engine, DocumentId(2), "xyz");

    typed(&mut engine, DocumentId(1), "\"*yw");
    typed(&mut engine, DocumentId(2), "p");
    assert_eq!(second.text(), "xyz", "unnamed register is per document");
    typed(&mut engine, DocumentId(2), "\"*P");
    assert_eq!(second.text(), "foo xyz");
}

#[test]
fn test_clipboard_register() {
    let clipboard = MockClipboard::new();
    let mut engine = Engine::builder()
        .clipboard(Box::new(clipboard.clone()))
        .build()
        .unwrap();
    let host = open(&mut engine, DOC, "abc def");

    typed(&mut engine, DOC, "\"+yw");
    assert_eq!(clipboard.content().as_deref(), Some("abc "));

    clipboard.put("XY");
    typed(&mut engine, DOC, "\"+P");
    assert_eq!(host.text(), "XYabc def");
}

#[test]
fn test_dispose_and_reinit() {
    let mut engine = Engine::new();
    open(&mut engine, DOC, "abc");
    typed(&mut engine, DOC, "i");
    assert_eq!(mode(&engine, DOC), Mode::Insert);

    let host = open(&mut engine, DOC, "fresh");
    assert_eq!(mode(&engine, DOC), Mode::Normal);
    assert_eq!(engine.document(DOC).unwrap().editor().text(), "fresh");

    assert!(engine.dispose_document(DOC));
    assert!(!engine.dispose_document(DOC));
    assert!(!engine.push_event(DOC, FocusContext::Document, &RawKeyEvent::typed('x')));
    assert_eq!(host.text(), "fresh");
}
