// Use cases layer: sampling, reconciliation, interpolation and the object tasks that run them.

pub mod authority;
pub mod hub;
pub mod interpolator;
pub mod node;
pub mod reconciler;
pub mod registry;
pub mod sampler;
pub mod types;

pub use authority::AuthorityLedger;
pub use hub::{HubChannels, Rejection, ReplicationHub, object_task};
pub use interpolator::{InterpolationState, Interpolator, Phase};
pub use node::SyncNode;
pub use reconciler::Reconciler;
pub use registry::{NodeSlots, ObjectError, ObjectHandle, ObjectRegistry, ObjectSettings};
pub use sampler::Sampler;
pub use types::{HubEvent, HubOutput, NodeId, TickContext};
