//! Append-only step history.
//!
//! Entries are stored contiguously and addressed by step index; the index of
//! an entry always equals its position. Grids are shared behind `Arc`, so a
//! snapshot handed to a caller stays valid and immutable regardless of what
//! the session does next.

use std::sync::Arc;

use crate::compute::{Field, Grid};

/// One recorded step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Step index, starting at 0 for the initial condition.
    pub step: u64,
    /// Activator grid, present when the store retains it.
    pub activator: Option<Arc<Grid>>,
    /// Inhibitor grid.
    pub inhibitor: Arc<Grid>,
}

impl HistoryEntry {
    /// Snapshot `field` as entry `step`.
    pub fn from_field(step: u64, field: &Field, retain_activator: bool) -> Self {
        Self {
            step,
            activator: retain_activator.then(|| Arc::new(field.activator.clone())),
            inhibitor: Arc::new(field.inhibitor.clone()),
        }
    }
}

/// Rejected append.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("history entry for step {got} cannot follow length {expected}")]
pub struct OutOfOrderAppend {
    pub expected: u64,
    pub got: u64,
}

/// Index-addressed log of recorded steps.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Store whose single entry is `field` at step 0.
    pub fn with_initial(field: &Field, retain_activator: bool) -> Self {
        Self {
            entries: vec![HistoryEntry::from_field(0, field, retain_activator)],
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the most recent entry, or `None` when empty.
    #[inline]
    pub fn max_step(&self) -> Option<u64> {
        self.entries.last().map(|e| e.step)
    }

    /// Append an entry. Its step must equal the current length.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<u64, OutOfOrderAppend> {
        let expected = self.entries.len() as u64;
        if entry.step != expected {
            return Err(OutOfOrderAppend {
                expected,
                got: entry.step,
            });
        }
        self.entries.push(entry);
        Ok(expected)
    }

    /// Snapshot `field` as the next entry and return its step.
    pub fn push_field(&mut self, field: &Field, retain_activator: bool) -> u64 {
        let step = self.entries.len() as u64;
        self.entries
            .push(HistoryEntry::from_field(step, field, retain_activator));
        step
    }

    /// Entry at `step`, or the latest entry when `step` is `None`.
    pub fn get(&self, step: Option<u64>) -> Option<&HistoryEntry> {
        match step {
            Some(step) => usize::try_from(step).ok().and_then(|i| self.entries.get(i)),
            None => self.entries.last(),
        }
    }

    /// Entries `start, start + stride, ...` below `end`.
    ///
    /// `end` is clamped to the current length; `start >= end` or a zero stride
    /// yields an empty range.
    pub fn range(&self, start: usize, end: Option<usize>, stride: usize) -> HistoryRange<'_> {
        let len = self.entries.len();
        let end = end.map_or(len, |e| e.min(len));
        HistoryRange {
            entries: &self.entries,
            next: start,
            end: if stride == 0 { start } else { end.max(start) },
            stride: stride.max(1),
        }
    }

    /// All entries in step order.
    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }
}

/// Lazy strided walk over a [`HistoryStore`].
///
/// Cloning yields an independent iterator from the same position, so a range
/// can be replayed.
#[derive(Debug, Clone)]
pub struct HistoryRange<'a> {
    entries: &'a [HistoryEntry],
    next: usize,
    end: usize,
    stride: usize,
}

impl<'a> Iterator for HistoryRange<'a> {
    type Item = &'a HistoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let entry = &self.entries[self.next];
        self.next = self.next.saturating_add(self.stride);
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next >= self.end {
            0
        } else {
            (self.end - self.next).div_ceil(self.stride)
        };
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for HistoryRange<'a> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(len: usize) -> HistoryStore {
        let mut field = Field::uniform(2, 2, 1.0, 0.0);
        let mut store = HistoryStore::with_initial(&field, true);
        for i in 1..len {
            field.inhibitor.set(0, 0, i as f32 / len as f32);
            store.push_field(&field, true);
        }
        store
    }

    fn steps(range: HistoryRange<'_>) -> Vec<u64> {
        range.map(|e| e.step).collect()
    }

    #[test]
    fn test_get_latest_and_out_of_range() {
        let store = store_with(10);
        assert_eq!(store.len(), 10);
        assert_eq!(store.max_step(), Some(9));
        assert_eq!(store.get(None).unwrap().step, 9);
        assert_eq!(store.get(Some(3)).unwrap().step, 3);
        assert!(store.get(Some(10)).is_none());
        assert!(store.get(Some(u64::MAX)).is_none());
    }

    #[test]
    fn test_append_requires_dense_steps() {
        let mut store = store_with(3);
        let field = Field::uniform(2, 2, 0.5, 0.5);

        let gap = HistoryEntry::from_field(5, &field, false);
        assert_eq!(
            store.append(gap),
            Err(OutOfOrderAppend {
                expected: 3,
                got: 5
            })
        );

        let overwrite = HistoryEntry::from_field(1, &field, false);
        assert!(store.append(overwrite).is_err());

        let next = HistoryEntry::from_field(3, &field, false);
        assert_eq!(store.append(next), Ok(3));
        assert_eq!(store.len(), 4);
        assert!(store.get(Some(3)).unwrap().activator.is_none());
    }

    #[test]
    fn test_range_with_stride() {
        let store = store_with(10);
        assert_eq!(steps(store.range(2, Some(5), 2)), vec![2, 4]);
        assert_eq!(steps(store.range(0, None, 3)), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_range_clamps_end() {
        let store = store_with(5);
        assert_eq!(steps(store.range(3, Some(100), 1)), vec![3, 4]);
        assert_eq!(steps(store.range(3, None, 1)), vec![3, 4]);
    }

    #[test]
    fn test_range_degenerate_cases_are_empty() {
        let store = store_with(5);
        assert!(steps(store.range(4, Some(2), 1)).is_empty());
        assert!(steps(store.range(0, Some(5), 0)).is_empty());
        assert!(steps(store.range(7, None, 1)).is_empty());
        assert_eq!(store.range(4, Some(2), 1).len(), 0);
    }

    #[test]
    fn test_range_is_restartable() {
        let store = store_with(8);
        let range = store.range(1, Some(8), 3);
        assert_eq!(range.len(), 3);

        let first: Vec<u64> = steps(range.clone());
        let second: Vec<u64> = steps(range);
        assert_eq!(first, vec![1, 4, 7]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshots_survive_later_appends() {
        let mut store = store_with(2);
        let held = Arc::clone(&store.get(Some(1)).unwrap().inhibitor);
        let before = (*held).clone();

        store.push_field(&Field::uniform(2, 2, 0.0, 1.0), true);
        assert_eq!(*held, before);
        assert_eq!(store.get(Some(1)).unwrap().inhibitor.as_ref(), &before);
    }
}
