//! Linear undo/redo history.
//!
//! Each entry holds one or more revisions. Edits made during one Insert
//! session are grouped into a single entry so they undo as one step.

use log::debug;

use crate::buffer::Buffer;
use crate::error::Result;
use crate::selection::Selection;
use crate::transaction::{ChangeSet, Transaction};
use crate::types::Mode;

/// A change set together with the change set that undoes it.
#[derive(Debug, Clone)]
pub struct Revision {
    pub changes: ChangeSet,
    pub inverse: ChangeSet,
}

/// One undo step.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub revisions: Vec<Revision>,
    /// Selection active immediately before the first revision.
    pub selection_before: Selection,
    /// Mode active immediately before the first revision.
    pub mode_before: Mode,
    pub selection_after: Selection,
}

/// State to restore after an undo or redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub selection: Selection,
    pub mode: Mode,
    /// Change sets applied to the buffer, in order.
    pub applied: Vec<ChangeSet>,
}

#[derive(Debug, Clone, Default)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    group: Option<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty() || self.group.as_ref().is_some_and(|g| !g.revisions.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of sealed undo steps.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn is_grouping(&self) -> bool {
        self.group.is_some()
    }

    /// Start collecting commits into one entry until [`History::end_group`].
    pub fn begin_group(&mut self, selection: &Selection, mode: Mode) {
        if self.group.is_some() {
            return;
        }
        self.group = Some(HistoryEntry {
            revisions: Vec::new(),
            selection_before: selection.clone(),
            mode_before: mode,
            selection_after: selection.clone(),
        });
    }

    /// Seal the open group. Returns whether it produced an undo step.
    pub fn end_group(&mut self) -> bool {
        match self.group.take() {
            Some(entry) if !entry.revisions.is_empty() => {
                self.undo.push(entry);
                true
            }
            _ => false,
        }
    }

    /// Apply `tx` to `buffer` and record it.
    ///
    /// Nothing is applied when the change set or the resulting selection
    /// violates the buffer invariants. Returns the resulting selection.
    pub fn commit(
        &mut self,
        buffer: &mut Buffer,
        tx: &Transaction,
        before: &Selection,
        mode: Mode,
    ) -> Result<Selection> {
        let changes = tx.changes();
        changes.validate(buffer.len_chars())?;
        let after = tx.resulting_selection(before);
        after.validate(changes.len_after(buffer.len_chars()))?;
        if changes.is_empty() {
            return Ok(after);
        }

        let inverse = changes.invert(buffer.text());
        buffer.apply(changes)?;
        let revision = Revision {
            changes: changes.clone(),
            inverse,
        };

        self.redo.clear();
        match self.group.as_mut() {
            Some(group) => {
                group.revisions.push(revision);
                group.selection_after = after.clone();
            }
            None => self.undo.push(HistoryEntry {
                revisions: vec![revision],
                selection_before: before.clone(),
                mode_before: mode,
                selection_after: after.clone(),
            }),
        }
        Ok(after)
    }

    /// Revert the most recent entry. An empty stack is a no-op.
    pub fn undo(&mut self, buffer: &mut Buffer) -> Result<Option<Restored>> {
        self.end_group();
        let Some(entry) = self.undo.pop() else {
            debug!("undo requested with empty history");
            return Ok(None);
        };
        let mut applied = Vec::with_capacity(entry.revisions.len());
        for (i, revision) in entry.revisions.iter().enumerate().rev() {
            applied.push(revision.inverse.clone());
            if let Err(err) = buffer.apply(&revision.inverse) {
                // Re-apply what was already reverted so the entry stays valid.
                for redone in &entry.revisions[i + 1..] {
                    buffer.apply(&redone.changes)?;
                }
                self.undo.push(entry);
                return Err(err);
            }
        }
        let restored = Restored {
            selection: entry.selection_before.clone(),
            mode: entry.mode_before,
            applied,
        };
        self.redo.push(entry);
        Ok(Some(restored))
    }

    /// Re-apply the most recently undone entry. An empty stack is a no-op.
    pub fn redo(&mut self, buffer: &mut Buffer) -> Result<Option<Restored>> {
        self.end_group();
        let Some(entry) = self.redo.pop() else {
            debug!("redo requested with empty redo stack");
            return Ok(None);
        };
        let mut applied = Vec::with_capacity(entry.revisions.len());
        for (i, revision) in entry.revisions.iter().enumerate() {
            applied.push(revision.changes.clone());
            if let Err(err) = buffer.apply(&revision.changes) {
                for undone in entry.revisions[..i].iter().rev() {
                    buffer.apply(&undone.inverse)?;
                }
                self.redo.push(entry);
                return Err(err);
            }
        }
        let restored = Restored {
            selection: entry.selection_after.clone(),
            mode: Mode::Normal,
            applied,
        };
        self.undo.push(entry);
        Ok(Some(restored))
    }

    /// Drop everything, e.g. after the buffer was reloaded.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.group = None;
    }
}
