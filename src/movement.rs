//! Pure text motions over a rope. All positions are char offsets.

use ropey::RopeSlice;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Eol,
    Whitespace,
    Word,
    Punctuation,
}

fn class(c: char) -> CharClass {
    if c == '\n' || c == '\r' {
        CharClass::Eol
    } else if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punctuation
    }
}

fn is_blank(c: CharClass) -> bool {
    matches!(c, CharClass::Eol | CharClass::Whitespace)
}

/// Line containing `pos`. A position past the end belongs to the last line.
pub fn line_of(text: RopeSlice, pos: usize) -> usize {
    text.char_to_line(pos.min(text.len_chars()))
}

pub fn line_start(text: RopeSlice, line: usize) -> usize {
    text.line_to_char(line.min(last_line(text)))
}

pub fn last_line(text: RopeSlice) -> usize {
    text.len_lines().saturating_sub(1)
}

/// Chars on `line`, not counting the line ending.
pub fn line_content_len(text: RopeSlice, line: usize) -> usize {
    let line = text.line(line.min(last_line(text)));
    let mut len = line.len_chars();
    if len > 0 && line.char(len - 1) == '\n' {
        len -= 1;
        if len > 0 && line.char(len - 1) == '\r' {
            len -= 1;
        }
    }
    len
}

/// Position just before the line ending of `line`.
pub fn line_end(text: RopeSlice, line: usize) -> usize {
    line_start(text, line) + line_content_len(text, line)
}

pub fn first_nonwhitespace(text: RopeSlice, line: usize) -> usize {
    let start = line_start(text, line);
    let end = line_end(text, line);
    (start..end)
        .find(|&i| !text.char(i).is_whitespace())
        .unwrap_or(start)
}

/// Char offsets of the grapheme boundaries on `line`, relative to its start.
fn grapheme_boundaries(text: RopeSlice, line: usize) -> Vec<usize> {
    let start = line_start(text, line);
    let content = text
        .slice(start..start + line_content_len(text, line))
        .to_string();
    let mut boundaries = vec![0];
    let mut offset = 0;
    for g in content.graphemes(true) {
        offset += g.chars().count();
        boundaries.push(offset);
    }
    boundaries
}

/// Column of `pos` on its line, in grapheme clusters.
pub fn column(text: RopeSlice, pos: usize) -> usize {
    let line = line_of(text, pos);
    let rel = pos.min(text.len_chars()) - line_start(text, line);
    let boundaries = grapheme_boundaries(text, line);
    boundaries.iter().take_while(|&&b| b <= rel).count().saturating_sub(1)
}

/// Position of grapheme column `col` on `line`, clamped to the line end.
pub fn pos_at_column(text: RopeSlice, line: usize, col: usize) -> usize {
    let boundaries = grapheme_boundaries(text, line);
    let rel = boundaries[col.min(boundaries.len() - 1)];
    line_start(text, line) + rel
}

/// Move `count` graphemes within the current line, stopping at its ends.
pub fn move_horizontally(text: RopeSlice, pos: usize, dir: Direction, count: usize) -> usize {
    let line = line_of(text, pos);
    let col = column(text, pos);
    let target = match dir {
        Direction::Forward => col.saturating_add(count),
        Direction::Backward => col.saturating_sub(count),
    };
    pos_at_column(text, line, target)
}

/// Move `count` lines, keeping the grapheme column where the line allows.
pub fn move_vertically(text: RopeSlice, pos: usize, dir: Direction, count: usize) -> usize {
    let line = line_of(text, pos);
    let col = column(text, pos);
    let target = match dir {
        Direction::Forward => line.saturating_add(count).min(last_line(text)),
        Direction::Backward => line.saturating_sub(count),
    };
    pos_at_column(text, target, col)
}

/// Start of the `count`-th next word (vim `w`).
pub fn next_word_start(text: RopeSlice, pos: usize, count: usize) -> usize {
    let len = text.len_chars();
    let mut pos = pos.min(len);
    for _ in 0..count {
        if pos >= len {
            break;
        }
        let start_class = class(text.char(pos));
        if !is_blank(start_class) {
            while pos < len && class(text.char(pos)) == start_class {
                pos += 1;
            }
        }
        while pos < len && is_blank(class(text.char(pos))) {
            pos += 1;
        }
    }
    pos
}

/// Start of the `count`-th previous word (vim `b`).
pub fn prev_word_start(text: RopeSlice, pos: usize, count: usize) -> usize {
    let mut pos = pos.min(text.len_chars());
    for _ in 0..count {
        while pos > 0 && is_blank(class(text.char(pos - 1))) {
            pos -= 1;
        }
        if pos == 0 {
            break;
        }
        let run = class(text.char(pos - 1));
        while pos > 0 && class(text.char(pos - 1)) == run {
            pos -= 1;
        }
    }
    pos
}

/// Last char of the `count`-th next word end (vim `e`).
pub fn next_word_end(text: RopeSlice, pos: usize, count: usize) -> usize {
    let len = text.len_chars();
    if len == 0 {
        return 0;
    }
    let mut pos = pos.min(len - 1);
    for _ in 0..count {
        if pos + 1 >= len {
            break;
        }
        pos += 1;
        while pos + 1 < len && is_blank(class(text.char(pos))) {
            pos += 1;
        }
        let run = class(text.char(pos));
        while pos + 1 < len && class(text.char(pos + 1)) == run {
            pos += 1;
        }
    }
    pos
}

/// Find the `count`-th `ch` on the current line.
///
/// With `till` the result stops one char short of the match. Returns `None`
/// when there are not enough matches.
pub fn find_char(
    text: RopeSlice,
    pos: usize,
    ch: char,
    dir: Direction,
    till: bool,
    count: usize,
) -> Option<usize> {
    let line = line_of(text, pos);
    let start = line_start(text, line);
    let end = line_end(text, line);
    let mut found = None;
    let mut remaining = count.max(1);
    match dir {
        Direction::Forward => {
            // `t` never targets the char right after the cursor; that motion would be empty.
            let skip = if till { 2 } else { 1 };
            for i in pos + skip..end {
                if text.char(i) == ch {
                    remaining -= 1;
                    if remaining == 0 {
                        found = Some(if till { i - 1 } else { i });
                        break;
                    }
                }
            }
        }
        Direction::Backward => {
            let skip = if till { 2 } else { 1 };
            if pos < start + skip {
                return None;
            }
            for i in (start..=pos - skip).rev() {
                if text.char(i) == ch {
                    remaining -= 1;
                    if remaining == 0 {
                        found = Some(if till { i + 1 } else { i });
                        break;
                    }
                }
            }
        }
    }
    found
}

/// The word (or whitespace run) under `pos`; with `around`, plus the
/// whitespace after it, or before it when there is none after.
pub fn word_object(text: RopeSlice, pos: usize, around: bool) -> (usize, usize) {
    let len = text.len_chars();
    if len == 0 {
        return (0, 0);
    }
    let pos = pos.min(len - 1);
    let run = class(text.char(pos));
    if run == CharClass::Eol {
        return (pos, pos);
    }
    let mut from = pos;
    while from > 0 && class(text.char(from - 1)) == run {
        from -= 1;
    }
    let mut to = pos + 1;
    while to < len && class(text.char(to)) == run {
        to += 1;
    }
    if around && run != CharClass::Whitespace {
        let trailing_end = {
            let mut end = to;
            while end < len && class(text.char(end)) == CharClass::Whitespace {
                end += 1;
            }
            end
        };
        if trailing_end > to {
            to = trailing_end;
        } else {
            while from > 0 && class(text.char(from - 1)) == CharClass::Whitespace {
                from -= 1;
            }
        }
    }
    (from, to)
}

/// Span of `count` whole lines starting at the line of `pos`, including the
/// final line ending. On the last line the preceding line ending is taken
/// instead so no empty line is left behind.
pub fn line_span(text: RopeSlice, pos: usize, count: usize) -> (usize, usize) {
    let first = line_of(text, pos);
    let last = first.saturating_add(count.max(1) - 1).min(last_line(text));
    let from = line_start(text, first);
    let to = if last < last_line(text) {
        line_start(text, last + 1)
    } else {
        text.len_chars()
    };
    let ends_with_newline = to > from && text.char(to - 1) == '\n';
    if !ends_with_newline && from > 0 {
        return (from - 1, to);
    }
    (from, to)
}
