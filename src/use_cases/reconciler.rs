// Merges sampled batches into the authoritative replicated list.

use crate::domain::{BatchMessage, ListChange, ReplicatedList, SyncError, TransformRecord};
use tracing::{debug, warn};

/// Longest list a reconciler grows to unless configured otherwise.
pub const DEFAULT_MAX_LIST_LEN: usize = 65_536;

/// Sole writer of one object's replicated list.
#[derive(Debug)]
pub struct Reconciler {
    list: ReplicatedList,
    expected_width: Option<usize>,
    // Hard cap on list length; bounds padding when no width is configured.
    max_len: usize,
    // Last record built by a merge; reused as the fill value when the list has to be padded.
    scratch: TransformRecord,
}

impl Reconciler {
    /// `expected_width` is the proxy count batches must fit into, when known.
    pub fn new(expected_width: Option<usize>) -> Self {
        Self {
            list: ReplicatedList::new(),
            expected_width,
            max_len: DEFAULT_MAX_LIST_LEN,
            scratch: TransformRecord::default(),
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn list(&self) -> &ReplicatedList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ReplicatedList {
        &mut self.list
    }

    /// Merges a batch index by index and returns one change per distinct index touched.
    ///
    /// Indices already present are overwritten, the next free index is appended, and an
    /// index past the end pads the gap with copies of the last record this reconciler
    /// built. That fill value is whatever came before (the default record on the very
    /// first merge), so padded slots must not be trusted until overwritten.
    pub fn merge(&mut self, batch: &BatchMessage) -> Result<Vec<ListChange>, SyncError> {
        batch.validate()?;
        let end = batch.end().ok_or(SyncError::OffsetOverflow {
            offset: batch.offset,
            width: batch.width(),
        })?;
        if let Some(expected) = self.expected_width.filter(|expected| end > *expected) {
            return Err(SyncError::WidthMismatch {
                offset: batch.offset,
                end,
                expected,
            });
        }
        if end > self.max_len {
            return Err(SyncError::ListTooLong {
                end,
                max: self.max_len,
            });
        }

        for (k, index) in batch.indices().enumerate() {
            let Some(record) = batch.record(k) else {
                break;
            };
            let len = self.list.len();

            if index < len {
                self.list.set(index, record)?;
            } else if index == len {
                self.list.push(record);
            } else {
                let missing = index - len;
                warn!(
                    index,
                    len,
                    missing,
                    fill = ?self.scratch,
                    "replicated list behind batch; padding with last built record"
                );
                for _ in 0..missing {
                    self.list.push(self.scratch);
                }
                self.list.push(record);
            }
            self.scratch = record;
        }

        let changes = self.list.commit();
        debug!(
            offset = batch.offset,
            width = batch.width(),
            dirty = changes.len(),
            len = self.list.len(),
            "merged batch"
        );
        Ok(changes)
    }
}
