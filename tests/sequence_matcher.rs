use std::sync::Arc;
use std::time::{Duration, Instant};

use modal_mini::{Editor, EngineConfig, KeymapMode, Mode, Registers};

mod support;
use support::{cursor, feed, feed_at, key};

fn editor_with(text: &str, bindings: &[(KeymapMode, &str, &str)]) -> Editor {
    let mut config = EngineConfig::default();
    for (mode, keys, command) in bindings {
        config.keymap.bind(*mode, keys, command);
    }
    let keymaps = config.build_keymaps().unwrap();
    Editor::with_config(text, Arc::new(keymaps), &config, Registers::default())
}

#[test]
fn test_quick_sequence_runs_bound_command() {
    let mut ed = editor_with("abc", &[(KeymapMode::Normal, "g x", "goto_line_end")]);
    feed(&mut ed, "g x");
    assert_eq!(ed.text(), "abc");
    assert_eq!(cursor(&ed), 3);
}

#[test]
fn test_late_key_starts_a_new_sequence() {
    let mut ed = editor_with("abc", &[(KeymapMode::Normal, "g x", "goto_line_end")]);
    let t0 = Instant::now();
    feed_at(&mut ed, "g", t0);
    assert_eq!(ed.snapshot().pending_keys, vec![key('g')]);
    feed_at(&mut ed, "x", t0 + Duration::from_millis(500));
    assert_eq!(ed.text(), "bc", "expired prefix is dropped, x deletes");
    assert!(ed.pending().is_idle());
}

#[test]
fn test_key_inside_timeout_continues_sequence() {
    let mut ed = editor_with("abc", &[(KeymapMode::Normal, "g x", "goto_line_end")]);
    let t0 = Instant::now();
    feed_at(&mut ed, "g", t0);
    feed_at(&mut ed, "x", t0 + Duration::from_millis(399));
    assert_eq!(ed.text(), "abc");
    assert_eq!(cursor(&ed), 3);
}

#[test]
fn test_count_applies_to_sequence() {
    let mut ed = editor_with(
        "a b c d e",
        &[(KeymapMode::Normal, "g w", "move_next_word_start")],
    );
    feed(&mut ed, "3 g w");
    assert_eq!(cursor(&ed), 6);
}

#[test]
fn test_unbound_continuation_keeps_count_for_retry() {
    let mut ed = Editor::new("abcdef");
    feed(&mut ed, "3 g x");
    assert_eq!(ed.text(), "def");
}

#[test]
fn test_unbound_key_discards_count() {
    let mut ed = Editor::new("abcdef");
    let now = Instant::now();
    assert!(ed.handle_key(key('3'), now));
    assert_eq!(ed.snapshot().pending_count, Some(3));
    assert!(!ed.handle_key(key('z'), now), "unbound keys go back to the host");
    assert!(ed.pending().is_idle());
    feed(&mut ed, "x");
    assert_eq!(ed.text(), "bcdef");
}

#[test]
fn test_tick_expires_pending_prefix() {
    let mut ed = Editor::new("abc");
    let t0 = Instant::now();
    feed_at(&mut ed, "g", t0);
    assert!(!ed.tick(t0 + Duration::from_millis(100)));
    assert!(!ed.pending().is_idle());
    assert!(ed.tick(t0 + Duration::from_millis(400)));
    assert!(ed.pending().is_idle());
    assert_eq!(ed.text(), "abc");
}

#[test]
fn test_timeout_runs_lone_key_that_is_also_a_prefix() {
    let mut ed = editor_with("abc", &[(KeymapMode::Normal, "l l", "goto_line_end")]);
    let t0 = Instant::now();
    feed_at(&mut ed, "l", t0);
    assert_eq!(cursor(&ed), 0, "l waits for a possible second l");
    assert!(ed.tick(t0 + Duration::from_secs(1)));
    assert_eq!(cursor(&ed), 1);

    feed_at(&mut ed, "l l", t0 + Duration::from_secs(2));
    assert_eq!(cursor(&ed), 3);
}

#[test]
fn test_diverging_key_after_command_prefix_is_replayed() {
    let mut ed = editor_with("abcdef", &[(KeymapMode::Normal, "l l", "goto_line_end")]);
    feed(&mut ed, "l x");
    assert_eq!(ed.text(), "acdef");
}

#[test]
fn test_insert_escape_sequence() {
    let bindings = [(KeymapMode::Insert, "j k", "normal_mode")];

    let mut ed = editor_with("", &bindings);
    feed(&mut ed, "i j k");
    assert_eq!(ed.mode(), Mode::Normal);
    assert_eq!(ed.text(), "");

    let mut ed = editor_with("", &bindings);
    feed(&mut ed, "i j x");
    assert_eq!(ed.mode(), Mode::Insert);
    assert_eq!(ed.text(), "jx");

    let mut ed = editor_with("", &bindings);
    let t0 = Instant::now();
    feed_at(&mut ed, "i j", t0);
    assert_eq!(ed.text(), "");
    assert!(ed.tick(t0 + Duration::from_millis(450)));
    assert_eq!(ed.text(), "j");
    assert_eq!(ed.mode(), Mode::Insert);
}

#[test]
fn test_digits_are_text_in_insert_mode() {
    let mut ed = Editor::new("");
    feed(&mut ed, "i 3 0 x esc");
    assert_eq!(ed.text(), "30x");
}

#[test]
fn test_find_waits_for_argument_without_deadline() {
    let mut ed = Editor::new("abcx");
    let t0 = Instant::now();
    feed_at(&mut ed, "f", t0);
    assert!(!ed.tick(t0 + Duration::from_secs(10)));
    feed_at(&mut ed, "x", t0 + Duration::from_secs(10));
    assert_eq!(cursor(&ed), 3);
}

#[test]
fn test_custom_timeout() {
    let config = EngineConfig {
        sequence_timeout_ms: 50,
        ..Default::default()
    };
    let keymaps = Arc::new(config.build_keymaps().unwrap());
    let mut ed = Editor::with_config("abc", keymaps, &config, Registers::default());
    let t0 = Instant::now();
    feed_at(&mut ed, "g", t0);
    assert!(ed.tick(t0 + Duration::from_millis(60)));
}
