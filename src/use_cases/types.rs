// Use-case level inputs/outputs for the replication loop.

use crate::domain::{BatchMessage, ListDelta};

pub type NodeId = u64;

/// Per-tick flags owned by the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    pub has_authority: bool,
    pub sync: bool,
}

impl TickContext {
    /// True when observer-side work (resets and blending) may run.
    pub fn observes(&self) -> bool {
        self.sync && !self.has_authority
    }
}

/// Events flowing from connections into an object task.
#[derive(Debug, Clone)]
pub enum HubEvent {
    Leave { node_id: NodeId },
    RequestAuthority { node_id: NodeId },
    ReleaseAuthority { node_id: NodeId },
    Batch { node_id: NodeId, batch: BatchMessage },
}

/// Outputs an object task publishes after handling an event.
#[derive(Debug, Clone, PartialEq)]
pub enum HubOutput {
    Delta(ListDelta),
    Authority(Option<NodeId>),
    Rejected { node_id: NodeId, reason: String },
}
