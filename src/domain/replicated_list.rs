// Ordered, index-addressed transform store with per-index change notification.

use crate::domain::{SyncError, TransformRecord};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of mutation an index went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListOp {
    Append,
    Overwrite,
}

/// Notification that one index of the list changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListChange {
    pub index: usize,
    pub op: ListOp,
}

/// One changed index together with its new value, as shipped to mirrors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaEntry {
    pub index: usize,
    pub op: ListOp,
    pub record: TransformRecord,
}

/// The indices touched by one committed mutation batch, in ascending order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListDelta {
    pub entries: Vec<DeltaEntry>,
}

impl ListDelta {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

type Observer = Box<dyn FnMut(&ListChange) + Send>;

/// Grow-only list of transforms.
///
/// Mutations are staged: `push` and `set` record which indices changed, and `commit`
/// notifies every registered observer once per distinct index before handing the changes
/// back to the caller. An index appended and then overwritten within the same batch is
/// reported once, as an append.
#[derive(Default)]
pub struct ReplicatedList {
    records: Vec<TransformRecord>,
    pending: BTreeMap<usize, ListOp>,
    observers: Vec<Observer>,
}

impl fmt::Debug for ReplicatedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedList")
            .field("records", &self.records)
            .field("pending", &self.pending)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ReplicatedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TransformRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[TransformRecord] {
        &self.records
    }

    /// Registers a callback invoked synchronously for every committed change.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ListChange) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Appends a record and returns its index.
    pub fn push(&mut self, record: TransformRecord) -> usize {
        let index = self.records.len();
        self.records.push(record);
        self.pending.insert(index, ListOp::Append);
        index
    }

    /// Overwrites an existing index. Writing an identical value still marks it dirty.
    pub fn set(&mut self, index: usize, record: TransformRecord) -> Result<(), SyncError> {
        let len = self.records.len();
        let slot = self
            .records
            .get_mut(index)
            .ok_or(SyncError::MirrorGap { index, len })?;
        *slot = record;
        self.pending.entry(index).or_insert(ListOp::Overwrite);
        Ok(())
    }

    /// Returns true if there are staged changes not yet committed.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Publishes staged changes to observers and returns them in index order.
    pub fn commit(&mut self) -> Vec<ListChange> {
        let changes: Vec<ListChange> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(index, op)| ListChange { index, op })
            .collect();

        for change in &changes {
            for observer in &mut self.observers {
                observer(change);
            }
        }
        changes
    }

    /// Pairs committed changes with the values they produced.
    pub fn delta_for(&self, changes: &[ListChange]) -> ListDelta {
        let entries = changes
            .iter()
            .filter_map(|change| {
                self.records.get(change.index).map(|record| DeltaEntry {
                    index: change.index,
                    op: change.op,
                    record: *record,
                })
            })
            .collect();
        ListDelta { entries }
    }

    /// Full contents expressed as appends, for late joiners and lag recovery.
    pub fn snapshot(&self) -> ListDelta {
        let entries = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| DeltaEntry {
                index,
                op: ListOp::Append,
                record: *record,
            })
            .collect();
        ListDelta { entries }
    }

    /// Applies a delta produced by another list and commits it.
    ///
    /// Entries for indices the mirror already holds are written in place whatever their op
    /// says, so replayed snapshots and duplicate deltas are harmless. An entry more than one
    /// past the end means an earlier delta was lost; nothing is applied in that case.
    pub fn apply_delta(&mut self, delta: &ListDelta) -> Result<Vec<ListChange>, SyncError> {
        let mut len = self.records.len();
        for entry in &delta.entries {
            if entry.index > len {
                return Err(SyncError::MirrorGap {
                    index: entry.index,
                    len,
                });
            }
            if entry.index == len {
                len += 1;
            }
        }

        for entry in &delta.entries {
            if entry.index < self.records.len() {
                self.set(entry.index, entry.record)?;
            } else {
                self.push(entry.record);
            }
        }
        Ok(self.commit())
    }
}
