//! Atomic batches of text edits.
//!
//! A [`ChangeSet`] is a list of replacements computed against a single
//! snapshot of the buffer. Changes are kept in ascending position order and
//! never overlap; applying them walks left to right and shifts each change by
//! the length delta of the ones before it.

use ropey::Rope;

use crate::error::{EditError, Result};
use crate::selection::Selection;

/// Replace the chars in `from..to` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub from: usize,
    pub to: usize,
    pub text: String,
}

impl Change {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            from: at,
            to: at,
            text: text.into(),
        }
    }

    pub fn delete(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            text: String::new(),
        }
    }

    pub fn replace(from: usize, to: usize, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
        }
    }

    fn inserted_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Which side of an insertion a mapped position sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// An ordered, non-overlapping set of changes against one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a change set from changes in any order.
    ///
    /// Changes are sorted by position; no-op changes are dropped. Overlaps
    /// are kept and reported by [`ChangeSet::validate`].
    pub fn from_changes(mut changes: Vec<Change>) -> Self {
        changes.retain(|c| c.from != c.to || !c.text.is_empty());
        changes.sort_by_key(|c| (c.from, c.to));
        Self { changes }
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Check the set against a document of `len` chars.
    pub fn validate(&self, len: usize) -> Result<()> {
        let mut last_end = 0;
        for (i, change) in self.changes.iter().enumerate() {
            if change.from > change.to || change.to > len {
                return Err(EditError::ChangeOutOfBounds {
                    from: change.from,
                    to: change.to,
                    len,
                });
            }
            if i > 0 && change.from < last_end {
                return Err(EditError::OverlappingChanges { at: change.from });
            }
            last_end = change.to;
        }
        Ok(())
    }

    /// Length of the document after applying to one of `len` chars.
    pub fn len_after(&self, len: usize) -> usize {
        self.changes
            .iter()
            .fold(len, |acc, c| acc - (c.to - c.from) + c.inserted_len())
    }

    /// Apply every change to `rope`, or none of them.
    pub fn apply(&self, rope: &mut Rope) -> Result<()> {
        self.validate(rope.len_chars())?;
        for (from, to, text) in self.shifted() {
            if from < to {
                rope.remove(from..to);
            }
            if !text.is_empty() {
                rope.insert(from, text);
            }
        }
        Ok(())
    }

    /// The changes with positions adjusted for the edits to their left, in
    /// the order a sequential editor must perform them.
    pub fn shifted(&self) -> impl Iterator<Item = (usize, usize, &str)> + '_ {
        let mut delta: isize = 0;
        self.changes.iter().map(move |c| {
            let from = (c.from as isize + delta) as usize;
            let to = (c.to as isize + delta) as usize;
            delta += c.inserted_len() as isize - (c.to - c.from) as isize;
            (from, to, c.text.as_str())
        })
    }

    /// The change set that undoes this one, given the pre-change document.
    pub fn invert(&self, original: &Rope) -> ChangeSet {
        let mut delta: isize = 0;
        let changes = self
            .changes
            .iter()
            .map(|c| {
                let from = (c.from as isize + delta) as usize;
                let inserted = c.inserted_len();
                delta += inserted as isize - (c.to - c.from) as isize;
                Change {
                    from,
                    to: from + inserted,
                    text: original.slice(c.from..c.to).to_string(),
                }
            })
            .collect();
        ChangeSet { changes }
    }

    /// Map a pre-change position through the set.
    pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
        let mut delta: isize = 0;
        for c in &self.changes {
            if pos < c.from || (pos == c.from && c.from == c.to && assoc == Assoc::Before) {
                break;
            }
            let inserted = c.inserted_len() as isize;
            if pos < c.to {
                // Inside a replaced span: snap to its start or end.
                let start = c.from as isize + delta;
                return match assoc {
                    Assoc::Before => start as usize,
                    Assoc::After => (start + inserted) as usize,
                };
            }
            delta += inserted - (c.to - c.from) as isize;
        }
        (pos as isize + delta) as usize
    }
}

/// A change set plus the selection the document ends up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    changes: ChangeSet,
    selection: Option<Selection>,
}

impl Transaction {
    pub fn new(changes: ChangeSet) -> Self {
        Self {
            changes,
            selection: None,
        }
    }

    pub fn change(changes: Vec<Change>) -> Self {
        Self::new(ChangeSet::from_changes(changes))
    }

    /// Set the resulting selection explicitly instead of mapping the old one.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The selection after applying: the explicit one, or `current` mapped
    /// through the changes.
    pub fn resulting_selection(&self, current: &Selection) -> Selection {
        match &self.selection {
            Some(sel) => sel.clone(),
            None => current.map(&self.changes),
        }
    }
}
