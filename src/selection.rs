//! Selection model: ordered, non-overlapping ranges with a primary.

use crate::error::{EditError, Result};
use crate::transaction::{Assoc, ChangeSet};

/// A selection range defined by an anchor and a head.
///
/// Positions are char offsets into the buffer. `anchor == head` is a caret.
/// The range covers the half-open interval `[from, to)`; the head is where
/// motions start from and where the cursor is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub anchor: usize,
    pub head: usize,
}

impl Range {
    pub const fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// A caret at `pos`.
    pub const fn point(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn len(&self) -> usize {
        self.to() - self.from()
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Whether the head sits before the anchor.
    pub fn is_backward(&self) -> bool {
        self.head < self.anchor
    }

    pub fn flip(self) -> Self {
        Self::new(self.head, self.anchor)
    }

    /// Move the head to `pos`, keeping the anchor when extending.
    pub fn put_head(self, pos: usize, extend: bool) -> Self {
        if extend {
            Self::new(self.anchor, pos)
        } else {
            Self::point(pos)
        }
    }

    /// Whether `other` (which starts at or after `self`) overlaps it.
    fn overlaps_next(&self, next: &Range) -> bool {
        next.from() < self.to() || next.from() == self.from()
    }

    /// Union of two ranges, keeping the direction of `self`.
    pub fn merge(self, other: Range) -> Self {
        let from = self.from().min(other.from());
        let to = self.to().max(other.to());
        if self.is_backward() {
            Self::new(to, from)
        } else {
            Self::new(from, to)
        }
    }

    pub fn clamp(self, len: usize) -> Self {
        Self::new(self.anchor.min(len), self.head.min(len))
    }

    /// The span an action covers when the char under the head is included,
    /// as in Select mode. Clamped to a buffer of `len` chars.
    pub fn inclusive_span(&self, len: usize) -> (usize, usize) {
        let from = self.from().min(len);
        let to = (self.to() + 1).min(len);
        (from, to.max(from))
    }

    pub fn map(self, changes: &ChangeSet) -> Self {
        if self.is_empty() {
            let pos = changes.map_pos(self.head, Assoc::After);
            return Self::point(pos);
        }
        // Text inserted exactly at either edge stays outside the range.
        let from = changes.map_pos(self.from(), Assoc::After);
        let to = changes.map_pos(self.to(), Assoc::Before).max(from);
        if self.is_backward() {
            Self::new(to, from)
        } else {
            Self::new(from, to)
        }
    }
}

/// A non-empty set of ranges over one buffer with exactly one primary.
///
/// Ranges are kept sorted by position and never overlap; constructors merge
/// overlapping ranges, and the primary wins a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<Range>,
    primary_index: usize,
}

impl Selection {
    /// Build a normalized selection. An empty list yields a caret at 0.
    pub fn new(ranges: Vec<Range>, primary_index: usize) -> Self {
        if ranges.is_empty() {
            return Self::point(0);
        }
        let primary_index = primary_index.min(ranges.len() - 1);
        Self::normalize(ranges, primary_index)
    }

    pub fn point(pos: usize) -> Self {
        Self::single(Range::point(pos))
    }

    pub fn single(range: Range) -> Self {
        Self {
            ranges: vec![range],
            primary_index: 0,
        }
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Always false; a selection holds at least one range.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn primary(&self) -> Range {
        self.ranges[self.primary_index]
    }

    pub fn primary_index(&self) -> usize {
        self.primary_index
    }

    /// Apply `f` to every range, then normalize.
    pub fn transform(&self, f: impl FnMut(Range) -> Range) -> Self {
        let ranges = self.ranges.iter().copied().map(f).collect();
        Self::normalize(ranges, self.primary_index)
    }

    /// Replace every range with zero or more ranges. The first range produced
    /// by the primary becomes the new primary.
    pub fn split(&self, mut f: impl FnMut(Range) -> Vec<Range>) -> Self {
        let mut ranges = Vec::with_capacity(self.ranges.len());
        let mut primary_index = 0;
        for (i, range) in self.ranges.iter().enumerate() {
            if i == self.primary_index {
                primary_index = ranges.len();
            }
            let produced = f(*range);
            if produced.is_empty() && i == self.primary_index {
                ranges.push(*range);
            } else {
                ranges.extend(produced);
            }
        }
        Self::new(ranges, primary_index)
    }

    /// Add a range and make it the primary.
    pub fn push(&self, range: Range) -> Self {
        let mut ranges = self.ranges.clone();
        ranges.push(range);
        let index = ranges.len() - 1;
        Self::normalize(ranges, index)
    }

    /// Collapse to the primary range.
    pub fn into_primary(self) -> Self {
        Self::single(self.primary())
    }

    /// Move the primary forward or backward, wrapping around.
    pub fn rotate(&self, forward: bool) -> Self {
        let len = self.ranges.len();
        let primary_index = if forward {
            (self.primary_index + 1) % len
        } else {
            (self.primary_index + len - 1) % len
        };
        Self {
            ranges: self.ranges.clone(),
            primary_index,
        }
    }

    pub fn map(&self, changes: &ChangeSet) -> Self {
        self.transform(|r| r.map(changes))
    }

    pub fn clamp(&self, len: usize) -> Self {
        self.transform(|r| r.clamp(len))
    }

    /// Check the invariants without repairing anything.
    pub fn validate(&self, len: usize) -> Result<()> {
        let fail = |reason: String| Err(EditError::InconsistentSelection { reason });
        if self.ranges.is_empty() {
            return fail("selection has no ranges".into());
        }
        if self.primary_index >= self.ranges.len() {
            return fail(format!(
                "primary index {} out of {} ranges",
                self.primary_index,
                self.ranges.len()
            ));
        }
        for range in &self.ranges {
            if range.to() > len {
                return fail(format!(
                    "range {}..{} exceeds buffer of {len} chars",
                    range.anchor, range.head
                ));
            }
        }
        for pair in self.ranges.windows(2) {
            if pair[1].from() < pair[0].from() || pair[0].overlaps_next(&pair[1]) {
                return fail(format!(
                    "ranges {}..{} and {}..{} are unsorted or overlap",
                    pair[0].from(),
                    pair[0].to(),
                    pair[1].from(),
                    pair[1].to()
                ));
            }
        }
        Ok(())
    }

    fn normalize(ranges: Vec<Range>, primary_index: usize) -> Self {
        let mut indexed: Vec<(usize, Range)> = ranges.into_iter().enumerate().collect();
        indexed.sort_by_key(|(_, r)| (r.from(), r.to()));

        let mut merged: Vec<Range> = Vec::with_capacity(indexed.len());
        let mut new_primary = 0;
        let mut last_is_primary = false;
        for (i, range) in indexed {
            let is_primary = i == primary_index;
            match merged.last_mut() {
                Some(last) if last.overlaps_next(&range) => {
                    // Keep the primary's direction when it absorbs a neighbour.
                    *last = if is_primary {
                        range.merge(*last)
                    } else {
                        last.merge(range)
                    };
                    if is_primary {
                        last_is_primary = true;
                    }
                }
                _ => {
                    merged.push(range);
                    last_is_primary = is_primary;
                }
            }
            if last_is_primary {
                new_primary = merged.len() - 1;
            }
        }
        Self {
            ranges: merged,
            primary_index: new_primary,
        }
    }
}
