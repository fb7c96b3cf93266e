use crate::domain::TransformRecord;

// Port for the engine-side object whose transform is replicated.
pub trait Proxy {
    fn transform(&self) -> TransformRecord;
    fn set_transform(&mut self, record: TransformRecord);
}

/// Plain in-memory proxy, used by headless nodes and tests.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalProxy {
    pub record: TransformRecord,
    /// Number of times the transform was written through the port.
    pub writes: u64,
}

impl LocalProxy {
    pub fn at(record: TransformRecord) -> Self {
        Self { record, writes: 0 }
    }
}

impl Proxy for LocalProxy {
    fn transform(&self) -> TransformRecord {
        self.record
    }

    fn set_transform(&mut self, record: TransformRecord) {
        self.record = record;
        self.writes += 1;
    }
}
