//! The command library.
//!
//! [`Command`] is a closed set. Keymaps refer to commands by name only while
//! loading; [`Command::from_name`] resolves them once into enum values so the
//! input path never dispatches on strings. The free functions below are the
//! pure transforms behind the commands: they read one snapshot of the text
//! and return new ranges or a [`Transaction`].

use ropey::{Rope, RopeSlice};

use crate::movement::{self, Direction};
use crate::selection::{Range, Selection};
use crate::transaction::{Assoc, Change, ChangeSet, Transaction};
use crate::types::Operator;

macro_rules! commands {
    ($($variant:ident => $name:literal, $doc:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Command {
            $(#[doc = $doc] $variant,)*
        }

        impl Command {
            pub const ALL: &'static [Command] = &[$(Command::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Command::$variant => $name,)*
                }
            }

            pub fn doc(self) -> &'static str {
                match self {
                    $(Command::$variant => $doc,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Command> {
                match name {
                    $($name => Some(Command::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

commands! {
    MoveCharLeft => "move_char_left", "Move left";
    MoveCharRight => "move_char_right", "Move right";
    MoveLineDown => "move_line_down", "Move down";
    MoveLineUp => "move_line_up", "Move up";
    MoveNextWordStart => "move_next_word_start", "Move to start of next word";
    MovePrevWordStart => "move_prev_word_start", "Move to start of previous word";
    MoveNextWordEnd => "move_next_word_end", "Move to end of next word";
    GotoLineStart => "goto_line_start", "Goto line start";
    GotoLineEnd => "goto_line_end", "Goto line end";
    GotoFirstNonwhitespace => "goto_first_nonwhitespace", "Goto first non-blank in line";
    GotoFileStart => "goto_file_start", "Goto first line, or line [count]";
    GotoLastLine => "goto_last_line", "Goto last line, or line [count]";
    FindNextChar => "find_next_char", "Move to next occurrence of char";
    TillNextChar => "till_next_char", "Move till next occurrence of char";
    FindPrevChar => "find_prev_char", "Move to previous occurrence of char";
    TillPrevChar => "till_prev_char", "Move till previous occurrence of char";
    SelectInnerWord => "select_inner_word", "Word under cursor";
    SelectAroundWord => "select_around_word", "Word under cursor with surrounding whitespace";
    SelectLine => "select_line", "Whole lines";
    CollapseSelection => "collapse_selection", "Collapse selections to cursors";
    FlipSelections => "flip_selections", "Flip selection cursor and anchor";
    KeepPrimarySelection => "keep_primary_selection", "Keep only the primary selection";
    CopySelectionOnNextLine => "copy_selection_on_next_line", "Copy selection on next line";
    RotateSelectionsForward => "rotate_selections_forward", "Make the next selection primary";
    RotateSelectionsBackward => "rotate_selections_backward", "Make the previous selection primary";
    SelectAll => "select_all", "Select whole document";
    SplitSelectionOnNewline => "split_selection_on_newline", "Split selections on line boundaries";
    InsertMode => "insert_mode", "Insert before selection";
    AppendMode => "append_mode", "Append after selection";
    InsertAtLineStart => "insert_at_line_start", "Insert at start of line";
    InsertAtLineEnd => "insert_at_line_end", "Insert at end of line";
    OpenBelow => "open_below", "Open new line below selection";
    OpenAbove => "open_above", "Open new line above selection";
    SelectMode => "select_mode", "Enter or leave select mode";
    NormalMode => "normal_mode", "Enter normal mode";
    Delete => "delete", "Delete (waits for a motion on cursors)";
    Change => "change", "Change (waits for a motion on cursors)";
    Yank => "yank", "Yank (waits for a motion on cursors)";
    DeleteToLineEnd => "delete_to_line_end", "Delete to end of line";
    DeleteCharForward => "delete_char_forward", "Delete char under cursor";
    DeleteCharBackward => "delete_char_backward", "Delete char before cursor";
    DeleteWordBackward => "delete_word_backward", "Delete previous word";
    ReplaceChar => "replace_char", "Replace with new char";
    JoinLines => "join_lines", "Join lines";
    PasteAfter => "paste_after", "Paste after selection";
    PasteBefore => "paste_before", "Paste before selection";
    InsertNewline => "insert_newline", "Insert newline";
    InsertTab => "insert_tab", "Insert tab";
    Undo => "undo", "Undo change";
    Redo => "redo", "Redo change";
    RepeatLastChange => "repeat_last_change", "Repeat last change";
    SelectRegister => "select_register", "Select register";
    RecordMacro => "record_macro", "Start or stop macro recording";
    ReplayMacro => "replay_macro", "Replay macro";
}

impl Command {
    /// Pure cursor motions: never recorded in history, never touch registers.
    pub fn is_motion(self) -> bool {
        use Command::*;
        matches!(
            self,
            MoveCharLeft
                | MoveCharRight
                | MoveLineDown
                | MoveLineUp
                | MoveNextWordStart
                | MovePrevWordStart
                | MoveNextWordEnd
                | GotoLineStart
                | GotoLineEnd
                | GotoFirstNonwhitespace
                | GotoFileStart
                | GotoLastLine
                | FindNextChar
                | TillNextChar
                | FindPrevChar
                | TillPrevChar
        )
    }

    /// Targets that only make sense after an operator.
    pub fn is_textobject(self) -> bool {
        matches!(
            self,
            Command::SelectInnerWord | Command::SelectAroundWord | Command::SelectLine
        )
    }

    /// Commands that read one more key as their argument.
    pub fn needs_char(self) -> bool {
        use Command::*;
        matches!(
            self,
            FindNextChar | TillNextChar | FindPrevChar | TillPrevChar | ReplaceChar | SelectRegister
        )
    }

    pub fn operator(self) -> Option<Operator> {
        match self {
            Command::Delete => Some(Operator::Delete),
            Command::Change => Some(Operator::Change),
            Command::Yank => Some(Operator::Yank),
            _ => None,
        }
    }

    /// Changes that `repeat_last_change` can replay.
    pub fn is_repeatable(self) -> bool {
        use Command::*;
        matches!(
            self,
            InsertMode
                | AppendMode
                | InsertAtLineStart
                | InsertAtLineEnd
                | OpenBelow
                | OpenAbove
                | Delete
                | Change
                | DeleteToLineEnd
                | DeleteCharForward
                | DeleteCharBackward
                | ReplaceChar
                | JoinLines
                | PasteAfter
                | PasteBefore
        )
    }

    /// Motions that cover whole lines when given to an operator.
    fn is_linewise(self) -> bool {
        use Command::*;
        matches!(
            self,
            MoveLineDown | MoveLineUp | GotoFileStart | GotoLastLine | SelectLine
        )
    }

    /// Motions whose target char is included when given to an operator.
    fn is_inclusive(self) -> bool {
        matches!(
            self,
            Command::MoveNextWordEnd | Command::FindNextChar | Command::TillNextChar
        )
    }
}

/// A resolved command with its count and optional character argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub count: Option<usize>,
    pub arg: Option<char>,
}

impl Invocation {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            count: None,
            arg: None,
        }
    }

    pub fn count(&self) -> usize {
        self.count.unwrap_or(1).max(1)
    }
}

/// New head position for a motion starting at `pos`, or `None` when the
/// motion has no target (a `f` with no match).
pub fn motion_target(text: RopeSlice, pos: usize, inv: &Invocation) -> Option<usize> {
    use Command::*;
    let count = inv.count();
    let line = movement::line_of(text, pos);
    let pos = pos.min(text.len_chars());
    let target = match inv.command {
        MoveCharLeft => movement::move_horizontally(text, pos, Direction::Backward, count),
        MoveCharRight => movement::move_horizontally(text, pos, Direction::Forward, count),
        MoveLineDown => movement::move_vertically(text, pos, Direction::Forward, count),
        MoveLineUp => movement::move_vertically(text, pos, Direction::Backward, count),
        MoveNextWordStart => movement::next_word_start(text, pos, count),
        MovePrevWordStart => movement::prev_word_start(text, pos, count),
        MoveNextWordEnd => movement::next_word_end(text, pos, count),
        GotoLineStart => movement::line_start(text, line),
        GotoLineEnd => movement::line_end(text, line),
        GotoFirstNonwhitespace => movement::first_nonwhitespace(text, line),
        GotoFileStart => {
            let target = inv.count.map_or(0, |n| n.saturating_sub(1));
            movement::line_start(text, target)
        }
        GotoLastLine => {
            let target = inv
                .count
                .map_or(movement::last_line(text), |n| n.saturating_sub(1));
            movement::line_start(text, target)
        }
        FindNextChar | TillNextChar | FindPrevChar | TillPrevChar => {
            let ch = inv.arg?;
            let dir = if matches!(inv.command, FindNextChar | TillNextChar) {
                Direction::Forward
            } else {
                Direction::Backward
            };
            let till = matches!(inv.command, TillNextChar | TillPrevChar);
            movement::find_char(text, pos, ch, dir, till, count)?
        }
        _ => return None,
    };
    Some(target)
}

/// Move (or with `extend`, stretch) every range by a motion.
pub fn apply_motion(text: RopeSlice, selection: &Selection, inv: &Invocation, extend: bool) -> Selection {
    selection.transform(|range| match motion_target(text, range.head, inv) {
        Some(head) => range.put_head(head, extend),
        None => range,
    })
}

/// The span an operator acts on for a caret at `pos`.
///
/// Returns `None` when the motion has no target. `linewise` spans include
/// their line ending.
pub fn operator_span(
    text: RopeSlice,
    pos: usize,
    op: Operator,
    inv: &Invocation,
) -> Option<OperatorSpan> {
    let len = text.len_chars();
    let command = inv.command;
    let count = inv.count();
    let (from, to) = match command {
        Command::SelectInnerWord => movement::word_object(text, pos, false),
        Command::SelectAroundWord => movement::word_object(text, pos, true),
        Command::SelectLine if op == Operator::Change => {
            let first = movement::line_of(text, pos);
            let last = (first + count - 1).min(movement::last_line(text));
            (
                movement::first_nonwhitespace(text, first),
                movement::line_end(text, last),
            )
        }
        Command::SelectLine => movement::line_span(text, pos, count),
        _ if command.is_linewise() => {
            let target = motion_target(text, pos, inv)?;
            let (a, b) = (pos.min(target), pos.max(target));
            let lines = movement::line_of(text, b) - movement::line_of(text, a) + 1;
            movement::line_span(text, movement::line_start(text, movement::line_of(text, a)), lines)
        }
        Command::MoveNextWordStart if op == Operator::Change && !is_blank_at(text, pos) => {
            // `cw` on a word changes to its end, like `ce`.
            let end = match (is_word_end(text, pos), count) {
                (true, 1) => pos,
                (true, n) => movement::next_word_end(text, pos, n - 1),
                (false, n) => movement::next_word_end(text, pos, n),
            };
            (pos, (end + 1).min(len))
        }
        Command::MoveNextWordStart => {
            let target = motion_target(text, pos, inv)?;
            // A word motion under an operator stops at the end of the line.
            let line_end = movement::line_end(text, movement::line_of(text, pos));
            let target = if movement::line_of(text, target) > movement::line_of(text, pos) {
                line_end.max(pos)
            } else {
                target
            };
            (pos, target)
        }
        _ => {
            let target = motion_target(text, pos, inv)?;
            let (a, b) = (pos.min(target), pos.max(target));
            if command.is_inclusive() && target >= pos {
                (a, (b + 1).min(len))
            } else {
                (a, b)
            }
        }
    };
    Some(OperatorSpan {
        from,
        to: to.max(from),
        linewise: command.is_linewise(),
    })
}

fn is_blank_at(text: RopeSlice, pos: usize) -> bool {
    pos >= text.len_chars() || text.char(pos).is_whitespace()
}

fn is_word_end(text: RopeSlice, pos: usize) -> bool {
    let (_, to) = movement::word_object(text, pos, false);
    to == pos + 1
}

/// A char span targeted by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSpan {
    pub from: usize,
    pub to: usize,
    pub linewise: bool,
}

/// Text covered by `span`, as stored in a register.
///
/// Linewise text always ends in exactly one line ending, even when the span
/// borrowed the line ending before the last line instead.
pub fn span_text(text: RopeSlice, span: &OperatorSpan) -> String {
    let mut s = text.slice(span.from..span.to).to_string();
    if span.linewise && !s.ends_with('\n') {
        if s.starts_with('\n') {
            s.remove(0);
        }
        s.push('\n');
    }
    s
}

/// Merge overlapping spans so they can form one change set.
fn merge_spans(mut spans: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (from, to) in spans {
        match merged.last_mut() {
            Some(last) if from < last.1 || (from == last.0 && from == to) => {
                last.1 = last.1.max(to);
            }
            _ => merged.push((from, to)),
        }
    }
    merged
}

/// Delete one span per range and leave a caret where each span started.
///
/// `spans[i]` belongs to `selection.ranges()[i]`; `None` leaves the range
/// alone.
pub fn delete_spans(selection: &Selection, spans: &[Option<(usize, usize)>]) -> Transaction {
    let changes = ChangeSet::from_changes(
        merge_spans(spans.iter().flatten().copied().collect())
            .into_iter()
            .map(|(from, to)| Change::delete(from, to))
            .collect(),
    );
    let ranges = selection
        .iter()
        .zip(spans)
        .map(|(range, span)| match span {
            Some((from, _)) => Range::point(changes.map_pos(*from, Assoc::Before)),
            None => range.map(&changes),
        })
        .collect();
    let selection = Selection::new(ranges, selection.primary_index());
    Transaction::new(changes).with_selection(selection)
}

/// Insert `text` at the head of every range.
pub fn insert_at_heads(selection: &Selection, text: &str) -> Transaction {
    let changes = selection
        .iter()
        .map(|range| Change::insert(range.head, text))
        .collect();
    Transaction::change(changes)
}

/// Spans of up to `count` chars before every head, one per range. Line
/// endings are only crossed when `cross_lines` is set.
pub fn spans_before_heads(
    text: RopeSlice,
    selection: &Selection,
    count: usize,
    cross_lines: bool,
) -> Vec<Option<(usize, usize)>> {
    selection
        .iter()
        .map(|range| {
            let head = range.head.min(text.len_chars());
            let bound = if cross_lines {
                0
            } else {
                movement::line_start(text, movement::line_of(text, head))
            };
            let from = head.saturating_sub(count).max(bound);
            (from < head).then_some((from, head))
        })
        .collect()
}

/// Spans of up to `count` chars from every head onward.
pub fn spans_after_heads(
    text: RopeSlice,
    selection: &Selection,
    count: usize,
    cross_lines: bool,
) -> Vec<Option<(usize, usize)>> {
    let len = text.len_chars();
    selection
        .iter()
        .map(|range| {
            let head = range.head.min(len);
            let bound = if cross_lines {
                len
            } else {
                movement::line_end(text, movement::line_of(text, head))
            };
            let to = head.saturating_add(count).min(bound);
            (head < to).then_some((head, to))
        })
        .collect()
}

/// Delete from every head back to the start of the previous word.
pub fn delete_word_before_heads(text: RopeSlice, selection: &Selection) -> Transaction {
    let spans: Vec<_> = selection
        .iter()
        .map(|range| {
            let head = range.head.min(text.len_chars());
            let from = movement::prev_word_start(text, head, 1);
            (from < head).then_some((from, head))
        })
        .collect();
    delete_spans(selection, &spans)
}

/// Replace chars with `ch`: `count` chars from each caret, or every char of
/// each span when `spans` is given. Line endings are never replaced.
pub fn replace_chars(
    text: RopeSlice,
    selection: &Selection,
    ch: char,
    count: usize,
    spans: Option<&[(usize, usize)]>,
) -> Transaction {
    let mut changes = Vec::new();
    let mut push_run = |from: usize, to: usize| {
        for i in from..to {
            let c = text.char(i);
            if c != '\n' && c != '\r' {
                changes.push(Change::replace(i, i + 1, ch.to_string()));
            }
        }
    };
    match spans {
        Some(spans) => {
            for (from, to) in merge_spans(spans.to_vec()) {
                push_run(from, to);
            }
        }
        None => {
            for range in selection.iter() {
                let head = range.head.min(text.len_chars());
                let line_end = movement::line_end(text, movement::line_of(text, head));
                // Vim refuses a replace that would run past the line end.
                if head + count <= line_end {
                    push_run(head, head + count);
                }
            }
        }
    }
    // One char for one char: positions do not move.
    let changes = ChangeSet::from_changes(dedup_changes(changes));
    Transaction::new(changes).with_selection(selection.clone())
}

fn dedup_changes(mut changes: Vec<Change>) -> Vec<Change> {
    changes.sort_by_key(|c| c.from);
    changes.dedup_by_key(|c| c.from);
    changes
}

/// Join the lines each range covers, or `count` lines (at least two) from
/// its first line. Each line break and the indentation after it become one
/// space.
pub fn join_lines(text: RopeSlice, selection: &Selection, count: usize) -> Transaction {
    let last = movement::last_line(text);
    let mut changes = Vec::new();
    let mut joined_lines = std::collections::BTreeSet::new();
    for range in selection.iter() {
        let first = movement::line_of(text, range.from());
        let joins = count.saturating_sub(1).max(1);
        let end_line = movement::line_of(text, range.to()).max(first + joins);
        for line in first..end_line.min(last) {
            if !joined_lines.insert(line) {
                continue;
            }
            let break_at = movement::line_end(text, line);
            let next_content = movement::first_nonwhitespace(text, line + 1);
            let next_is_blank = next_content == movement::line_end(text, line + 1);
            let separator = if next_is_blank || break_at == movement::line_start(text, line) {
                ""
            } else {
                " "
            };
            let to = if next_is_blank {
                movement::line_end(text, line + 1)
            } else {
                next_content
            };
            changes.push(Change::replace(break_at, to, separator));
        }
    }
    let changes = ChangeSet::from_changes(changes);
    let selection = selection.map(&changes);
    Transaction::new(changes).with_selection(selection)
}

/// Paste register fragments at every range.
///
/// Fragment `i` goes to range `i`, reusing the last fragment when there are
/// more ranges than fragments. Fragments ending in a line ending paste as
/// whole lines below (`after`) or above the range's line.
pub fn paste(
    text: RopeSlice,
    selection: &Selection,
    fragments: &[String],
    after: bool,
    inclusive: bool,
    count: usize,
) -> Option<Transaction> {
    let last = fragments.last()?;
    let len = text.len_chars();
    let mut changes = Vec::with_capacity(selection.len());
    let mut carets = Vec::with_capacity(selection.len());
    for (i, range) in selection.iter().enumerate() {
        let fragment = fragments.get(i).unwrap_or(last);
        let mut payload = fragment.repeat(count.max(1));
        let linewise = fragment.ends_with('\n');
        let head = range.head.min(len);
        let line = movement::line_of(text, head);
        let at = if linewise {
            if after {
                if line < movement::last_line(text) {
                    movement::line_start(text, line + 1)
                } else {
                    // Last line has no line ending to paste after.
                    payload.pop();
                    payload.insert(0, '\n');
                    len
                }
            } else {
                movement::line_start(text, movement::line_of(text, range.from()))
            }
        } else if after {
            if inclusive {
                range.inclusive_span(len).1
            } else if head < movement::line_end(text, line) {
                head + 1
            } else {
                head
            }
        } else {
            range.from()
        };
        let inserted = payload.chars().count();
        let caret_offset = if linewise {
            usize::from(payload.starts_with('\n'))
        } else {
            inserted.saturating_sub(1)
        };
        carets.push((at, caret_offset));
        changes.push(Change::insert(at, payload));
    }

    let set = ChangeSet::from_changes(changes);
    let ranges = carets
        .into_iter()
        .map(|(at, offset)| {
            Range::point(set.map_pos(at, Assoc::Before) + offset)
        })
        .collect();
    let selection = Selection::new(ranges, selection.primary_index());
    Some(Transaction::new(set).with_selection(selection))
}

/// Open an empty line below (or above) every range and put a caret on it.
pub fn open_line(text: RopeSlice, selection: &Selection, below: bool) -> Transaction {
    let mut changes = Vec::with_capacity(selection.len());
    for range in selection.iter() {
        let line = movement::line_of(text, range.head);
        let at = if below {
            movement::line_end(text, line)
        } else {
            movement::line_start(text, line)
        };
        changes.push(Change::insert(at, "\n"));
    }
    let set = ChangeSet::from_changes(dedup_changes(changes));
    let ranges = set
        .changes()
        .iter()
        .map(|change| {
            let start = set.map_pos(change.from, Assoc::Before);
            Range::point(if below { start + 1 } else { start })
        })
        .collect();
    Transaction::new(set).with_selection(Selection::new(ranges, selection.primary_index()))
}

/// Add a copy of every range one line further down.
pub fn copy_selection_on_next_line(text: RopeSlice, selection: &Selection) -> Selection {
    let last = movement::last_line(text);
    selection.split(|range| {
        let anchor_line = movement::line_of(text, range.anchor);
        let head_line = movement::line_of(text, range.head);
        let offset = anchor_line.max(head_line) - anchor_line.min(head_line) + 1;
        if anchor_line.max(head_line) + offset > last {
            return vec![range];
        }
        let shift = |pos: usize| {
            let line = movement::line_of(text, pos);
            movement::pos_at_column(text, line + offset, movement::column(text, pos))
        };
        vec![range, Range::new(shift(range.anchor), shift(range.head))]
    })
}

/// Split ranges into one range per line they touch.
pub fn split_on_newline(text: RopeSlice, selection: &Selection) -> Selection {
    selection.split(|range| {
        if range.is_empty() {
            return vec![range];
        }
        let first = movement::line_of(text, range.from());
        let last = movement::line_of(text, range.to());
        (first..=last)
            .filter_map(|line| {
                let from = movement::line_start(text, line).max(range.from());
                let to = movement::line_end(text, line).min(range.to());
                (from < to).then_some(Range::new(from, to))
            })
            .collect()
    })
}

/// Whole-document range.
pub fn select_all(text: &Rope) -> Selection {
    Selection::single(Range::new(0, text.len_chars()))
}
