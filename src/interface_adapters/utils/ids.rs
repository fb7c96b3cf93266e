use crate::use_cases::NodeId;
use std::sync::atomic::{AtomicU64, Ordering};

// Ids handed out by this process start high so they never collide with small
// client-chosen ids passed on the query string.
const FIRST_ASSIGNED_ID: NodeId = 1 << 32;

static NEXT_ID: AtomicU64 = AtomicU64::new(FIRST_ASSIGNED_ID);

/// True for ids only this process may hand out.
pub fn is_reserved(id: NodeId) -> bool {
    id >= FIRST_ASSIGNED_ID
}

/// Returns a process-unique id for a connection or node.
pub fn next_id() -> NodeId {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_ids_are_drawn_then_they_are_unique_and_above_client_range() {
        let a = next_id();
        let b = next_id();

        assert_ne!(a, b);
        assert!(is_reserved(a) && is_reserved(b));
        assert!(!is_reserved(42));
    }
}
