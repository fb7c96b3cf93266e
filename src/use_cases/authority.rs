// Explicit authority hand-off for one replicated object.

use crate::domain::SyncError;
use crate::use_cases::NodeId;

/// Tracks which node may sample and submit batches.
///
/// There is no takeover: a new holder is only granted once the previous one released
/// authority or left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityLedger {
    holder: Option<NodeId>,
}

impl AuthorityLedger {
    pub fn holder(&self) -> Option<NodeId> {
        self.holder
    }

    pub fn is_holder(&self, node_id: NodeId) -> bool {
        self.holder == Some(node_id)
    }

    /// Grants authority to `node_id`. Returns true if the holder changed.
    pub fn request(&mut self, node_id: NodeId) -> Result<bool, SyncError> {
        match self.holder {
            Some(holder) if holder == node_id => Ok(false),
            Some(holder) => Err(SyncError::AuthorityHeld { holder }),
            None => {
                self.holder = Some(node_id);
                Ok(true)
            }
        }
    }

    /// Releases authority if `node_id` holds it. Returns true if the holder changed.
    pub fn release(&mut self, node_id: NodeId) -> bool {
        if self.is_holder(node_id) {
            self.holder = None;
            true
        } else {
            false
        }
    }

    /// Fails unless `node_id` is the current holder.
    pub fn check_writer(&self, node_id: NodeId) -> Result<(), SyncError> {
        if self.is_holder(node_id) {
            Ok(())
        } else {
            Err(SyncError::NotAuthority { node_id })
        }
    }
}
