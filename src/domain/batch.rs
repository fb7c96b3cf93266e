// Per-axis batch of sampled transforms, shaped the way it travels on the wire.

use crate::domain::{SyncError, TransformRecord};
use glam::Vec3;
use std::ops::Range;

/// One periodic snapshot of consecutive proxies, stored as six parallel arrays.
///
/// Entry `k` of every array describes proxy `offset + k`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchMessage {
    pub offset: usize,
    pub px: Vec<f32>,
    pub py: Vec<f32>,
    pub pz: Vec<f32>,
    pub ex: Vec<f32>,
    pub ey: Vec<f32>,
    pub ez: Vec<f32>,
}

impl BatchMessage {
    pub fn with_capacity(offset: usize, width: usize) -> Self {
        Self {
            offset,
            px: Vec::with_capacity(width),
            py: Vec::with_capacity(width),
            pz: Vec::with_capacity(width),
            ex: Vec::with_capacity(width),
            ey: Vec::with_capacity(width),
            ez: Vec::with_capacity(width),
        }
    }

    pub fn from_records(offset: usize, records: &[TransformRecord]) -> Self {
        let mut batch = Self::with_capacity(offset, records.len());
        for record in records {
            batch.push(*record);
        }
        batch
    }

    pub fn push(&mut self, record: TransformRecord) {
        self.px.push(record.position.x);
        self.py.push(record.position.y);
        self.pz.push(record.position.z);
        self.ex.push(record.euler.x);
        self.ey.push(record.euler.y);
        self.ez.push(record.euler.z);
    }

    /// Number of proxies described, taken from the `px` axis.
    pub fn width(&self) -> usize {
        self.px.len()
    }

    pub fn is_empty(&self) -> bool {
        self.px.is_empty()
    }

    /// One past the last absolute index, or `None` if it does not fit in `usize`.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.width())
    }

    /// Absolute list indices covered by this batch.
    pub fn indices(&self) -> Range<usize> {
        self.offset..self.offset.saturating_add(self.width())
    }

    /// Checks that all six axes carry the same number of entries and that the covered
    /// range is addressable.
    pub fn validate(&self) -> Result<(), SyncError> {
        let expected = self.width();
        if self.end().is_none() {
            return Err(SyncError::OffsetOverflow {
                offset: self.offset,
                width: expected,
            });
        }
        let axes: [(&'static str, usize); 5] = [
            ("py", self.py.len()),
            ("pz", self.pz.len()),
            ("ex", self.ex.len()),
            ("ey", self.ey.len()),
            ("ez", self.ez.len()),
        ];
        for (axis, actual) in axes {
            if actual != expected {
                return Err(SyncError::RaggedBatch {
                    axis,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Record at position `k` within the batch (not the absolute list index).
    ///
    /// Callers validate the batch first; out-of-range positions return `None`.
    pub fn record(&self, k: usize) -> Option<TransformRecord> {
        Some(TransformRecord::new(
            Vec3::new(*self.px.get(k)?, *self.py.get(k)?, *self.pz.get(k)?),
            Vec3::new(*self.ex.get(k)?, *self.ey.get(k)?, *self.ez.get(k)?),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_records_are_packed_then_axes_hold_each_component() {
        let records = [
            TransformRecord::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)),
            TransformRecord::new(Vec3::new(7.0, 8.0, 9.0), Vec3::new(10.0, 11.0, 12.0)),
        ];

        let batch = BatchMessage::from_records(3, &records);

        assert_eq!(batch.px, vec![1.0, 7.0]);
        assert_eq!(batch.ez, vec![6.0, 12.0]);
        assert_eq!(batch.indices(), 3..5);
        assert_eq!(batch.record(1), Some(records[1]));
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn when_one_axis_is_short_then_validation_names_it() {
        let mut batch = BatchMessage::from_records(0, &[TransformRecord::default(); 3]);
        batch.ey.pop();

        let err = batch.validate().expect_err("ragged batch must be rejected");

        assert_eq!(
            err,
            SyncError::RaggedBatch {
                axis: "ey",
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn when_offset_plus_width_overflows_then_validation_fails_without_panicking() {
        let batch = BatchMessage::from_records(usize::MAX, &[TransformRecord::default()]);

        assert_eq!(batch.end(), None);
        assert_eq!(
            batch.validate(),
            Err(SyncError::OffsetOverflow {
                offset: usize::MAX,
                width: 1,
            })
        );
    }
}
