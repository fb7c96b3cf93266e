// Domain layer: replicated transform state and the rules that mutate it.

pub mod batch;
pub mod errors;
pub mod ports;
pub mod replicated_list;
pub mod transform;
pub mod tuning;

pub use batch::BatchMessage;
pub use errors::SyncError;
pub use ports::{LocalProxy, Proxy};
pub use replicated_list::{DeltaEntry, ListChange, ListDelta, ListOp, ReplicatedList};
pub use transform::TransformRecord;
pub use tuning::SyncTuning;
