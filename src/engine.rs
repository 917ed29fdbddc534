//! The per-document state machine and the multi-document engine.
//!
//! An [`Editor`] owns everything one document needs: buffer, selections,
//! mode, pending input, history and local registers. A [`Document`] binds an
//! editor to its host, and the [`Engine`] routes host events to documents.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, trace, warn};
use ropey::Rope;

use crate::buffer::Buffer;
use crate::commands::{self, Command, Invocation, OperatorSpan};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::history::History;
use crate::key::{KeyInput, RawKeyEvent};
use crate::keymap::Keymaps;
use crate::matcher::{Matcher, PendingState, Resolution};
use crate::movement;
use crate::register::{DEFAULT_MACRO, GlobalRegisters, Registers, UNNAMED};
use crate::selection::{Range, Selection};
use crate::traits::{Clipboard, DocumentHost};
use crate::transaction::{ChangeSet, Transaction};
use crate::types::{DocumentId, FocusContext, Mode, Operator};

#[derive(Debug, Clone, Copy)]
struct PendingOperator {
    count: Option<usize>,
    register: Option<char>,
}

/// The selection a change started from, so `.` can rebuild one of the same
/// size at each caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionExtent {
    len: usize,
    select: bool,
}

#[derive(Debug, Clone)]
struct Recording {
    register: char,
    keys: Vec<KeyInput>,
}

/// A point-in-time view of an editor, for hosts that render status lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub mode: Mode,
    pub selection: Selection,
    pub pending_keys: Vec<KeyInput>,
    pub pending_count: Option<usize>,
    pub recording: Option<char>,
    pub version: u64,
}

/// The editing state machine of one document.
#[derive(Debug, Clone)]
pub struct Editor {
    buffer: Buffer,
    selection: Selection,
    mode: Mode,
    matcher: Matcher,
    keymaps: Arc<Keymaps>,
    history: History,
    registers: Registers,
    indent: String,
    max_macro_depth: usize,

    selected_register: Option<char>,
    operator: Option<PendingOperator>,
    recording: Option<Recording>,
    replay_depth: usize,
    /// Macro registers currently being replayed, outermost first.
    replaying: Vec<char>,
    /// Keys of the sequence being resolved, counts included.
    sequence_len: usize,

    /// Keys since the last completed command, for `.`.
    change_keys: Vec<KeyInput>,
    capturing_insert: bool,
    capturing_extent: Option<SelectionExtent>,
    repeating: bool,
    last_change: Vec<KeyInput>,
    last_extent: Option<SelectionExtent>,
    /// Selection before the running command; insert sessions undo to it.
    command_start: Selection,

    /// Applied change sets the host has not seen yet.
    unsynced: Vec<ChangeSet>,
}

impl Editor {
    /// An editor over `text` with the default configuration.
    pub fn new(text: &str) -> Self {
        let config = EngineConfig::default();
        Self::with_config(
            text,
            Arc::new(Keymaps::default()),
            &config,
            Registers::new(GlobalRegisters::new(), config.global_register_names()),
        )
    }

    pub fn with_config(
        text: &str,
        keymaps: Arc<Keymaps>,
        config: &EngineConfig,
        registers: Registers,
    ) -> Self {
        Self {
            buffer: Buffer::new(text),
            selection: Selection::point(0),
            mode: Mode::Normal,
            matcher: Matcher::new(config.sequence_timeout()),
            keymaps,
            history: History::new(),
            registers,
            indent: config.indent_unit(),
            max_macro_depth: config.max_macro_depth,
            selected_register: None,
            operator: None,
            recording: None,
            replay_depth: 0,
            replaying: Vec::new(),
            sequence_len: 0,
            change_keys: Vec::new(),
            capturing_insert: false,
            capturing_extent: None,
            repeating: false,
            last_change: Vec::new(),
            last_extent: None,
            command_start: Selection::point(0),
            unsynced: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn text(&self) -> String {
        self.buffer.contents()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn pending(&self) -> &PendingState {
        self.matcher.state()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            mode: self.mode,
            selection: self.selection.clone(),
            pending_keys: self.matcher.state().keys().to_vec(),
            pending_count: self.matcher.state().count(),
            recording: self.recording.as_ref().map(|r| r.register),
            version: self.buffer.version(),
        }
    }

    /// Replace the selection, normalizing and clamping it to the buffer.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamp(self.buffer.len_chars());
    }

    /// Replace the text after an edit the engine did not make.
    ///
    /// History recorded against the old text no longer applies and is
    /// dropped.
    pub fn reload(&mut self, text: &str) {
        self.buffer.reload(text);
        self.history.clear();
        self.unsynced.clear();
        self.selection = self.selection.clamp(self.buffer.len_chars());
    }

    /// Change sets applied since the last call, oldest first.
    pub fn take_unsynced(&mut self) -> Vec<ChangeSet> {
        std::mem::take(&mut self.unsynced)
    }

    /// Run the deferred timeout check. Returns whether anything happened.
    pub fn tick(&mut self, now: Instant) -> bool {
        let keymaps = Arc::clone(&self.keymaps);
        match self
            .matcher
            .expire(now, keymaps.get(self.mode.keymap_mode()))
        {
            Some(resolution) => {
                self.dispatch(resolution, now);
                true
            }
            None => false,
        }
    }

    /// Process one normalized key. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: KeyInput, now: Instant) -> bool {
        trace!("key {key} in {:?}", self.mode);
        if self.replay_depth == 0
            && let Some(recording) = self.recording.as_mut()
        {
            recording.keys.push(key);
        }
        // An expired prefix never absorbs the new key.
        self.tick(now);
        if !self.repeating {
            self.change_keys.push(key);
        }
        if self.matcher.state().is_idle() {
            self.sequence_len = 0;
        }
        self.sequence_len += 1;
        self.feed(key, now)
    }

    fn feed(&mut self, key: KeyInput, now: Instant) -> bool {
        let keymaps = Arc::clone(&self.keymaps);
        let trie = keymaps.get(self.mode.keymap_mode());
        if self.mode == Mode::Insert && self.matcher.state().is_idle() && trie.get(&key).is_none()
        {
            return match key.printable() {
                Some(ch) => {
                    self.insert_text(&ch.to_string());
                    true
                }
                None => false,
            };
        }
        let collect_counts = self.mode != Mode::Insert;
        let resolution = self.matcher.resolve(key, trie, now, collect_counts);
        self.dispatch(resolution, now)
    }

    fn dispatch(&mut self, resolution: Resolution, now: Instant) -> bool {
        match resolution {
            Resolution::Pending => true,
            Resolution::Matched {
                invocation, replay, ..
            } => {
                let tail = if self.repeating {
                    Vec::new()
                } else {
                    let keep = self.change_keys.len().saturating_sub(replay.len());
                    self.change_keys.split_off(keep)
                };
                self.execute(invocation, now);
                self.change_keys.extend(tail);
                for key in replay {
                    self.feed(key, now);
                }
                true
            }
            Resolution::Miss { discarded, retry } => {
                let mut handled = false;
                match self.mode {
                    Mode::Insert => {
                        let typed: String = discarded.iter().filter_map(KeyInput::printable).collect();
                        if !typed.is_empty() {
                            self.insert_text(&typed);
                            handled = true;
                        }
                    }
                    Mode::PendingOperator(op) => {
                        debug!("{op:?} cancelled by unbound sequence");
                        self.cancel_operator();
                        self.matcher.reset();
                        return false;
                    }
                    Mode::Normal | Mode::Select => {
                        if !self.capturing_insert && !self.repeating {
                            self.change_keys.clear();
                            self.change_keys.extend(retry);
                        }
                    }
                }
                match retry {
                    Some(key) => self.feed(key, now),
                    None => handled,
                }
            }
        }
    }

    fn execute(&mut self, inv: Invocation, now: Instant) {
        let command = inv.command;
        trace!("execute {} in {:?}", command.name(), self.mode);
        let mode_before = self.mode;
        let extent = self.selection_extent(command);
        self.command_start = self.selection.clone();

        if let Mode::PendingOperator(op) = self.mode {
            if !command.is_motion() && !command.is_textobject() {
                debug!("{op:?} cancelled by {}", command.name());
                self.cancel_operator();
                return;
            }
            self.apply_operator(op, inv);
        } else {
            self.run(inv, now);
        }
        if command != Command::SelectRegister {
            self.selected_register = None;
        }

        self.track_change(command, mode_before, extent);
    }

    /// The extent of a repeatable change that acts on the selection itself.
    fn selection_extent(&self, command: Command) -> Option<SelectionExtent> {
        if !command.is_repeatable() {
            return None;
        }
        let len = self.selection.primary().len();
        match self.mode {
            Mode::Select => Some(SelectionExtent { len, select: true }),
            Mode::Normal
                if command.operator().is_some() && self.selection.iter().any(|r| !r.is_empty()) =>
            {
                Some(SelectionExtent { len, select: false })
            }
            _ => None,
        }
    }

    /// Bookkeeping for `.` after a command ran.
    fn track_change(&mut self, command: Command, mode_before: Mode, extent: Option<SelectionExtent>) {
        if self.repeating {
            return;
        }
        match (mode_before, self.mode) {
            // Prefixes of a longer change.
            (_, Mode::PendingOperator(_)) => {}
            _ if command == Command::SelectRegister => {}
            (Mode::Insert, Mode::Insert) => {}
            (Mode::Insert, _) => {
                if std::mem::take(&mut self.capturing_insert) {
                    self.last_change = std::mem::take(&mut self.change_keys);
                    self.last_extent = self.capturing_extent.take();
                }
                self.change_keys.clear();
            }
            (_, Mode::Insert) => {
                self.capturing_insert = command.is_repeatable()
                    || matches!(mode_before, Mode::PendingOperator(Operator::Change));
                self.capturing_extent = extent;
                if !self.capturing_insert {
                    self.change_keys.clear();
                }
            }
            (Mode::PendingOperator(op), _) => {
                if op != Operator::Yank {
                    self.last_change = std::mem::take(&mut self.change_keys);
                    self.last_extent = None;
                }
                self.change_keys.clear();
            }
            _ => {
                if command.is_repeatable() && command != Command::RepeatLastChange {
                    self.last_change = std::mem::take(&mut self.change_keys);
                    self.last_extent = extent;
                }
                self.change_keys.clear();
            }
        }
    }

    fn run(&mut self, inv: Invocation, now: Instant) {
        use Command::*;
        let count = inv.count();
        let rope = self.buffer.text().clone();
        let text = rope.slice(..);
        match inv.command {
            MoveCharLeft | MoveCharRight | MoveLineDown | MoveLineUp | MoveNextWordStart
            | MovePrevWordStart | MoveNextWordEnd | GotoLineStart | GotoLineEnd
            | GotoFirstNonwhitespace | GotoFileStart | GotoLastLine | FindNextChar
            | TillNextChar | FindPrevChar | TillPrevChar => {
                let extend = self.mode == Mode::Select;
                self.selection = commands::apply_motion(text, &self.selection, &inv, extend);
            }
            SelectInnerWord | SelectAroundWord | SelectLine => {
                debug!("{} only applies after an operator", inv.command.name());
            }

            CollapseSelection => self.selection = self.selection.transform(|r| Range::point(r.head)),
            FlipSelections => self.selection = self.selection.transform(Range::flip),
            KeepPrimarySelection => self.selection = self.selection.clone().into_primary(),
            CopySelectionOnNextLine => {
                for _ in 0..count {
                    self.selection = commands::copy_selection_on_next_line(text, &self.selection);
                }
            }
            RotateSelectionsForward => self.selection = self.selection.rotate(true),
            RotateSelectionsBackward => self.selection = self.selection.rotate(false),
            SelectAll => self.selection = commands::select_all(&rope),
            SplitSelectionOnNewline => {
                self.selection = commands::split_on_newline(text, &self.selection)
            }

            InsertMode => {
                self.selection = self.selection.transform(|r| Range::point(r.from()));
                self.enter_insert();
            }
            AppendMode => {
                let select = self.mode == Mode::Select;
                let len = rope.len_chars();
                self.selection = self.selection.transform(|r| {
                    if select {
                        Range::point(r.inclusive_span(len).1)
                    } else if !r.is_empty() {
                        Range::point(r.to())
                    } else {
                        let line_end = movement::line_end(text, movement::line_of(text, r.head));
                        Range::point(if r.head < line_end { r.head + 1 } else { r.head })
                    }
                });
                self.enter_insert();
            }
            InsertAtLineStart | InsertAtLineEnd => {
                let to_end = inv.command == InsertAtLineEnd;
                self.selection = self.selection.transform(|r| {
                    let line = movement::line_of(text, r.head);
                    Range::point(if to_end {
                        movement::line_end(text, line)
                    } else {
                        movement::first_nonwhitespace(text, line)
                    })
                });
                self.enter_insert();
            }
            OpenBelow | OpenAbove => {
                self.history.begin_group(&self.command_start, self.normal_or_select());
                let tx = commands::open_line(text, &self.selection, inv.command == OpenBelow);
                self.commit(&tx);
                self.mode = Mode::Insert;
            }
            SelectMode => {
                self.mode = match self.mode {
                    Mode::Select => Mode::Normal,
                    _ => Mode::Select,
                };
            }
            NormalMode => self.enter_normal(),

            Delete | Change | Yank => {
                let Some(op) = inv.command.operator() else {
                    return;
                };
                self.start_operator(op, inv.count);
            }
            DeleteToLineEnd => {
                let spans = self
                    .selection
                    .iter()
                    .map(|r| {
                        let head = r.from();
                        let end = movement::line_end(text, movement::line_of(text, head));
                        Some(OperatorSpan {
                            from: head,
                            to: end,
                            linewise: false,
                        })
                    })
                    .collect();
                self.finish_operator(Operator::Delete, &rope, spans, None);
            }
            DeleteCharForward | DeleteCharBackward if self.mode == Mode::Select => {
                self.act_on_selection(Operator::Delete, &rope);
            }
            DeleteCharForward => {
                let insert = self.mode == Mode::Insert;
                let spans = commands::spans_after_heads(text, &self.selection, count, insert);
                self.commit_removal(&spans, &rope, !insert);
            }
            DeleteCharBackward => {
                let insert = self.mode == Mode::Insert;
                let spans = commands::spans_before_heads(text, &self.selection, count, insert);
                self.commit_removal(&spans, &rope, !insert);
            }
            DeleteWordBackward => {
                let tx = commands::delete_word_before_heads(text, &self.selection);
                self.commit(&tx);
            }
            ReplaceChar => {
                let Some(ch) = inv.arg else {
                    return;
                };
                if self.mode == Mode::Select {
                    let len = rope.len_chars();
                    let spans: Vec<_> = self.selection.iter().map(|r| r.inclusive_span(len)).collect();
                    let tx = commands::replace_chars(text, &self.selection, ch, 1, Some(&spans));
                    self.commit(&tx);
                    self.mode = Mode::Normal;
                } else {
                    let tx = commands::replace_chars(text, &self.selection, ch, count, None);
                    self.commit(&tx);
                }
            }
            JoinLines => {
                let tx = commands::join_lines(text, &self.selection, count);
                self.commit(&tx);
            }
            PasteAfter | PasteBefore => {
                let register = self.selected_register.take().unwrap_or(UNNAMED);
                let Some(fragments) = self.registers.fragments(register) else {
                    debug!("register {register:?} holds no text");
                    return;
                };
                let inclusive = self.mode == Mode::Select;
                if let Some(tx) = commands::paste(
                    text,
                    &self.selection,
                    &fragments,
                    inv.command == PasteAfter,
                    inclusive,
                    count,
                ) {
                    self.commit(&tx);
                }
            }
            InsertNewline => self.insert_text("\n"),
            InsertTab => {
                let indent = self.indent.clone();
                self.insert_text(&indent);
            }

            Undo => {
                for _ in 0..count {
                    if !self.undo() {
                        break;
                    }
                }
            }
            Redo => {
                for _ in 0..count {
                    if !self.redo() {
                        break;
                    }
                }
            }
            RepeatLastChange => self.repeat_last_change(count, now),
            SelectRegister => self.selected_register = inv.arg,
            RecordMacro => self.toggle_recording(),
            ReplayMacro => self.replay_macro(count, now),
        }
    }

    fn normal_or_select(&self) -> Mode {
        match self.mode {
            Mode::Select => Mode::Select,
            _ => Mode::Normal,
        }
    }

    fn enter_insert(&mut self) {
        self.history.begin_group(&self.command_start, self.normal_or_select());
        self.mode = Mode::Insert;
    }

    fn enter_normal(&mut self) {
        match self.mode {
            Mode::Insert => {
                self.history.end_group();
            }
            Mode::Select => {
                self.selection = self.selection.transform(|r| Range::point(r.head));
            }
            Mode::Normal => {
                self.selected_register = None;
                self.selection = self.selection.transform(|r| Range::point(r.head));
            }
            Mode::PendingOperator(_) => self.operator = None,
        }
        self.mode = Mode::Normal;
    }

    fn insert_text(&mut self, text: &str) {
        let tx = commands::insert_at_heads(&self.selection, text);
        self.commit(&tx);
    }

    /// Apply and record a transaction. Failures keep the previous state.
    fn commit(&mut self, tx: &Transaction) -> bool {
        let before = self.selection.clone();
        match self
            .history
            .commit(&mut self.buffer, tx, &before, self.mode)
        {
            Ok(after) => {
                if !tx.is_empty() {
                    self.unsynced.push(tx.changes().clone());
                }
                self.selection = after;
                true
            }
            Err(err) => {
                error!("transaction rejected: {err}");
                false
            }
        }
    }

    /// Delete one span per range, writing the removed text to the selected
    /// register when `yank` is set. Each range contributes its own fragment
    /// even where spans overlap.
    fn commit_removal(&mut self, spans: &[Option<(usize, usize)>], original: &Rope, yank: bool) {
        let tx = commands::delete_spans(&self.selection, spans);
        if tx.is_empty() {
            self.selected_register = None;
            return;
        }
        let register = self.selected_register.take().unwrap_or(UNNAMED);
        let fragments: Vec<String> = spans
            .iter()
            .flatten()
            .map(|&(from, to)| original.slice(from..to).to_string())
            .collect();
        if self.commit(&tx) && yank {
            self.registers.yank(register, fragments);
        }
    }

    fn start_operator(&mut self, op: Operator, count: Option<usize>) {
        let rope = self.buffer.text().clone();
        if self.mode == Mode::Select || self.selection.iter().any(|r| !r.is_empty()) {
            self.act_on_selection(op, &rope);
            return;
        }
        self.operator = Some(PendingOperator {
            count,
            register: self.selected_register.take(),
        });
        self.mode = Mode::PendingOperator(op);
    }

    fn cancel_operator(&mut self) {
        self.operator = None;
        self.mode = Mode::Normal;
        if !self.repeating {
            self.change_keys.clear();
        }
    }

    /// `op` on the current selections: inclusive spans in Select mode,
    /// half-open ranges otherwise.
    fn act_on_selection(&mut self, op: Operator, rope: &Rope) {
        let len = rope.len_chars();
        let select = self.mode == Mode::Select;
        let spans = self
            .selection
            .iter()
            .map(|r| {
                let (from, to) = if select {
                    r.inclusive_span(len)
                } else {
                    (r.from(), r.to())
                };
                Some(OperatorSpan {
                    from,
                    to,
                    linewise: false,
                })
            })
            .collect();
        let register = self.selected_register.take();
        self.finish_operator(op, rope, spans, register);
    }

    fn apply_operator(&mut self, op: Operator, inv: Invocation) {
        let state = self.operator.take().unwrap_or(PendingOperator {
            count: None,
            register: None,
        });
        let count = match (state.count, inv.count) {
            (Some(a), Some(b)) => Some(a.saturating_mul(b).min(crate::matcher::MAX_COUNT)),
            (a, b) => a.or(b),
        };
        let inv = Invocation { count, ..inv };
        let rope = self.buffer.text().clone();
        let text = rope.slice(..);
        let spans: Vec<Option<OperatorSpan>> = self
            .selection
            .iter()
            .map(|r| {
                let mut span = commands::operator_span(text, r.head, op, &inv)?;
                if op == Operator::Change && span.linewise && inv.command != Command::SelectLine {
                    // Keep one line to type into.
                    if span.to > span.from && text.char(span.to - 1) == '\n' {
                        span.to -= 1;
                    } else if span.from < span.to && text.char(span.from) == '\n' {
                        span.from += 1;
                    }
                }
                Some(span)
            })
            .collect();
        self.mode = Mode::Normal;
        if spans.iter().all(Option::is_none) {
            debug!("{op:?} has no target");
            return;
        }
        self.finish_operator(op, &rope, spans, state.register);
    }

    /// Write the spans to a register, then delete them or enter Insert.
    fn finish_operator(
        &mut self,
        op: Operator,
        rope: &Rope,
        spans: Vec<Option<OperatorSpan>>,
        register: Option<char>,
    ) {
        let text = rope.slice(..);
        let register = register.or(self.selected_register.take()).unwrap_or(UNNAMED);
        let fragments: Vec<String> = spans
            .iter()
            .flatten()
            .map(|span| commands::span_text(text, span))
            .collect();
        self.registers.yank(register, fragments);

        let bounds: Vec<Option<(usize, usize)>> =
            spans.iter().map(|s| s.map(|s| (s.from, s.to))).collect();
        match op {
            Operator::Yank => {
                let carets = self
                    .selection
                    .iter()
                    .zip(&bounds)
                    .map(|(r, b)| b.map_or(*r, |(from, _)| Range::point(from)))
                    .collect();
                self.selection = Selection::new(carets, self.selection.primary_index());
                self.mode = Mode::Normal;
            }
            Operator::Delete => {
                let tx = commands::delete_spans(&self.selection, &bounds);
                self.commit(&tx);
                self.mode = Mode::Normal;
            }
            Operator::Change => {
                self.history.begin_group(&self.command_start, self.normal_or_select());
                let tx = commands::delete_spans(&self.selection, &bounds);
                self.commit(&tx);
                self.mode = Mode::Insert;
            }
        }
    }

    /// Revert one history entry. Returns whether anything was undone.
    pub fn undo(&mut self) -> bool {
        if self.mode == Mode::Insert {
            self.history.end_group();
        }
        match self.history.undo(&mut self.buffer) {
            Ok(Some(restored)) => {
                self.restore(restored);
                true
            }
            Ok(None) => false,
            Err(err) => {
                error!("undo failed: {err}");
                false
            }
        }
    }

    /// Re-apply one undone entry. Returns whether anything was redone.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(&mut self.buffer) {
            Ok(Some(restored)) => {
                self.restore(restored);
                true
            }
            Ok(None) => false,
            Err(err) => {
                error!("redo failed: {err}");
                false
            }
        }
    }

    fn restore(&mut self, restored: crate::history::Restored) {
        self.unsynced.extend(restored.applied);
        self.selection = restored.selection.clamp(self.buffer.len_chars());
        self.mode = match restored.mode {
            Mode::Select => Mode::Select,
            _ => Mode::Normal,
        };
    }

    fn repeat_last_change(&mut self, count: usize, now: Instant) {
        if self.last_change.is_empty() {
            debug!("nothing to repeat");
            return;
        }
        if self.repeating || self.replay_depth >= self.max_macro_depth {
            warn!("repeat nested too deeply");
            return;
        }
        let keys = self.last_change.clone();
        let extent = self.last_extent;
        self.repeating = true;
        for _ in 0..count {
            // One undo step per repetition, back to the selection before it.
            self.history.begin_group(&self.selection, self.normal_or_select());
            if let Some(extent) = extent {
                self.select_extent(extent);
            }
            self.replay(&keys, now);
            if let Mode::PendingOperator(op) = self.mode {
                debug!("{op:?} left pending by repeat");
                self.cancel_operator();
                self.matcher.reset();
            }
            if self.mode == Mode::Insert {
                self.enter_normal();
            } else {
                self.history.end_group();
            }
        }
        self.repeating = false;
    }

    /// Select `extent.len` chars from every head, in Select mode when the
    /// change was made there. A live Select-mode selection is kept as is.
    fn select_extent(&mut self, extent: SelectionExtent) {
        if self.mode != Mode::Normal {
            return;
        }
        let len = self.buffer.len_chars();
        self.selection = self
            .selection
            .transform(|r| Range::new(r.head, r.head.saturating_add(extent.len).min(len)));
        if extent.select {
            self.mode = Mode::Select;
        }
    }

    fn toggle_recording(&mut self) {
        match self.recording.take() {
            Some(mut recording) => {
                // The keys that stopped the recording are not part of it.
                let keep = recording.keys.len().saturating_sub(self.sequence_len);
                recording.keys.truncate(keep);
                debug!(
                    "recorded {} key(s) into {:?}",
                    recording.keys.len(),
                    recording.register
                );
                self.registers.set_macro(recording.register, recording.keys);
            }
            None => {
                let register = self.selected_register.take().unwrap_or(DEFAULT_MACRO);
                debug!("recording into {register:?}");
                self.recording = Some(Recording {
                    register,
                    keys: Vec::new(),
                });
            }
        }
    }

    fn replay_macro(&mut self, count: usize, now: Instant) {
        let register = self.selected_register.take().unwrap_or(DEFAULT_MACRO);
        let Some(keys) = self.registers.macro_keys(register) else {
            debug!("register {register:?} holds no macro");
            return;
        };
        if self.replaying.contains(&register) {
            warn!("macro {register:?} replays itself; ignored");
            return;
        }
        if self.replay_depth >= self.max_macro_depth {
            warn!("macro {register:?} nested deeper than {}", self.max_macro_depth);
            return;
        }
        self.replaying.push(register);
        for _ in 0..count {
            self.replay(&keys, now);
        }
        self.replaying.pop();
    }

    /// Feed recorded keys back through the matcher as if typed.
    fn replay(&mut self, keys: &[KeyInput], now: Instant) {
        self.replay_depth += 1;
        if !self.repeating {
            self.change_keys.clear();
        }
        let outer = std::mem::take(&mut self.sequence_len);
        for key in keys {
            self.handle_key(*key, now);
        }
        self.sequence_len = outer;
        self.replay_depth -= 1;
    }
}

/// An editor bound to the host document it mirrors.
pub struct Document {
    editor: Editor,
    host: Box<dyn DocumentHost>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("editor", &self.editor)
            .finish_non_exhaustive()
    }
}

impl Document {
    pub fn new(mut editor: Editor, host: Box<dyn DocumentHost>) -> Self {
        editor.reload(&host.get_text());
        let mut doc = Self { editor, host };
        doc.pull_selection();
        doc
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn host(&self) -> &dyn DocumentHost {
        self.host.as_ref()
    }

    /// Adopt changes the host made since the last event.
    fn pull(&mut self) {
        let text = self.host.get_text();
        if text != self.editor.text() {
            warn!("document changed outside the engine; history dropped");
            self.editor.reload(&text);
        }
        self.pull_selection();
    }

    fn pull_selection(&mut self) {
        let ranges = self.host.get_selections();
        if ranges.is_empty() || ranges == self.editor.selection().ranges() {
            return;
        }
        let primary = self.editor.selection().primary_index();
        self.editor.set_selection(Selection::new(ranges, primary));
    }

    /// Mirror engine edits and selections into the host.
    fn push(&mut self) {
        for changes in self.editor.take_unsynced() {
            for (from, to, text) in changes.shifted() {
                self.host.replace(from, to, text);
            }
        }
        let selection = self.editor.selection();
        self.host
            .set_selections(selection.ranges(), selection.primary_index());
    }

    pub fn handle_key(&mut self, key: KeyInput, now: Instant) -> bool {
        self.pull();
        let handled = self.editor.handle_key(key, now);
        self.push();
        handled
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.pull();
        let fired = self.editor.tick(now);
        if fired {
            self.push();
        }
        fired
    }
}

/// Routes host key events to per-document editors.
#[derive(Debug)]
pub struct Engine {
    documents: HashMap<DocumentId, Document>,
    keymaps: Arc<Keymaps>,
    config: EngineConfig,
    globals: GlobalRegisters,
}

pub struct EngineBuilder {
    config: EngineConfig,
    globals: GlobalRegisters,
    clipboard: Option<Box<dyn Clipboard + Send>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            globals: GlobalRegisters::new(),
            clipboard: None,
        }
    }
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share global registers with another engine.
    pub fn global_registers(mut self, globals: GlobalRegisters) -> Self {
        self.globals = globals;
        self
    }

    /// Back the `+` register with a clipboard.
    pub fn clipboard(mut self, clipboard: Box<dyn Clipboard + Send>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn build(self) -> Result<Engine, ConfigError> {
        self.config.validate()?;
        let keymaps = Arc::new(self.config.build_keymaps()?);
        let globals = match self.clipboard {
            Some(clipboard) => self.globals.with_clipboard(clipboard),
            None => self.globals,
        };
        Ok(Engine {
            documents: HashMap::new(),
            keymaps,
            config: self.config,
            globals,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            documents: HashMap::new(),
            keymaps: Arc::new(Keymaps::default()),
            config,
            globals: GlobalRegisters::new(),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn global_registers(&self) -> &GlobalRegisters {
        &self.globals
    }

    /// Start tracking a host document. An existing document with the same
    /// id is replaced.
    pub fn init_document(&mut self, id: DocumentId, host: Box<dyn DocumentHost>) {
        let registers = Registers::new(self.globals.clone(), self.config.global_register_names());
        let editor = Editor::with_config("", Arc::clone(&self.keymaps), &self.config, registers);
        debug!("init document {id:?}");
        if self.documents.insert(id, Document::new(editor, host)).is_some() {
            warn!("document {id:?} was already open; state reset");
        }
    }

    pub fn dispose_document(&mut self, id: DocumentId) -> bool {
        debug!("dispose document {id:?}");
        self.documents.remove(&id).is_some()
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn document_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.get_mut(&id)
    }

    pub fn push_event(&mut self, id: DocumentId, focus: FocusContext, event: &RawKeyEvent) -> bool {
        self.push_event_at(id, focus, event, Instant::now())
    }

    /// Feed one host event at time `now`. Returns whether the engine consumed
    /// it; unconsumed events belong to the host.
    pub fn push_event_at(
        &mut self,
        id: DocumentId,
        focus: FocusContext,
        event: &RawKeyEvent,
        now: Instant,
    ) -> bool {
        if !focus.is_editable() {
            return false;
        }
        let Some(document) = self.documents.get_mut(&id) else {
            debug!("event for unknown document {id:?}");
            return false;
        };
        let Some(key) = KeyInput::from_raw(event) else {
            return false;
        };
        document.handle_key(key, now)
    }

    /// Run the deferred timeout of a pending sequence.
    pub fn tick(&mut self, id: DocumentId, now: Instant) -> bool {
        self.documents
            .get_mut(&id)
            .is_some_and(|document| document.tick(now))
    }
}
