use ropey::{Rope, RopeSlice};

use crate::error::Result;
use crate::transaction::ChangeSet;

/// Document text plus a version counter.
///
/// The version increases on every applied change set (commits, undo and
/// redo alike), so positions taken at one version can be detected as stale.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    text: Rope,
    version: u64,
}

impl Buffer {
    pub fn new(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
            version: 0,
        }
    }

    pub fn text(&self) -> &Rope {
        &self.text
    }

    pub fn slice(&self) -> RopeSlice<'_> {
        self.text.slice(..)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub fn contents(&self) -> String {
        self.text.to_string()
    }

    /// Apply a change set atomically and bump the version.
    pub fn apply(&mut self, changes: &ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        changes.apply(&mut self.text)?;
        self.version += 1;
        Ok(())
    }

    /// Replace the whole content, e.g. after the host edited it behind our back.
    pub fn reload(&mut self, text: &str) {
        self.text = Rope::from_str(text);
        self.version += 1;
    }
}
