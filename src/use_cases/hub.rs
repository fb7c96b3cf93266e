// Single-writer task owning one replicated object's reconciler and authority ledger.

use super::types::{HubEvent, HubOutput, NodeId};
use crate::domain::ListDelta;
use crate::use_cases::{AuthorityLedger, Reconciler};
use std::sync::Arc;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// Batch rejected by the object task, addressed to the node that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub node_id: NodeId,
    pub reason: String,
}

/// Synchronous core of an object task: applies one event at a time.
#[derive(Debug)]
pub struct ReplicationHub {
    reconciler: Reconciler,
    authority: AuthorityLedger,
}

impl ReplicationHub {
    pub fn new(expected_width: Option<usize>) -> Self {
        Self {
            reconciler: Reconciler::new(expected_width),
            authority: AuthorityLedger::default(),
        }
    }

    /// Caps how far batches may grow the list.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.reconciler = self.reconciler.with_max_len(max_len);
        self
    }

    pub fn authority(&self) -> Option<NodeId> {
        self.authority.holder()
    }

    pub fn snapshot(&self) -> ListDelta {
        self.reconciler.list().snapshot()
    }

    pub fn handle(&mut self, event: HubEvent) -> Vec<HubOutput> {
        match event {
            HubEvent::Leave { node_id } => {
                if self.authority.release(node_id) {
                    info!(node_id, "authority holder left; authority released");
                    vec![HubOutput::Authority(None)]
                } else {
                    Vec::new()
                }
            }
            HubEvent::RequestAuthority { node_id } => match self.authority.request(node_id) {
                Ok(true) => {
                    info!(node_id, "authority granted");
                    vec![HubOutput::Authority(Some(node_id))]
                }
                Ok(false) => Vec::new(),
                Err(e) => {
                    debug!(node_id, error = %e, "authority request refused");
                    vec![HubOutput::Rejected {
                        node_id,
                        reason: e.to_string(),
                    }]
                }
            },
            HubEvent::ReleaseAuthority { node_id } => {
                if self.authority.release(node_id) {
                    info!(node_id, "authority released");
                    vec![HubOutput::Authority(None)]
                } else {
                    Vec::new()
                }
            }
            HubEvent::Batch { node_id, batch } => {
                let merged = self
                    .authority
                    .check_writer(node_id)
                    .and_then(|()| self.reconciler.merge(&batch));
                match merged {
                    Ok(changes) if changes.is_empty() => Vec::new(),
                    Ok(changes) => {
                        vec![HubOutput::Delta(self.reconciler.list().delta_for(&changes))]
                    }
                    Err(e) => {
                        warn!(node_id, error = %e, "batch rejected");
                        vec![HubOutput::Rejected {
                            node_id,
                            reason: e.to_string(),
                        }]
                    }
                }
            }
        }
    }
}

/// Channels an object task publishes on.
#[derive(Debug, Clone)]
pub struct HubChannels {
    pub delta_tx: broadcast::Sender<ListDelta>,
    pub snapshot_tx: watch::Sender<ListDelta>,
    pub authority_tx: watch::Sender<Option<NodeId>>,
    pub rejected_tx: broadcast::Sender<Rejection>,
}

pub async fn object_task(
    mut input_rx: mpsc::Receiver<HubEvent>,
    mut hub: ReplicationHub,
    channels: HubChannels,
    shutdown: Arc<Notify>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.notified() => {
                // Exit cleanly when the object is removed.
                break;
            }
            event = input_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        for output in hub.handle(event) {
            match output {
                HubOutput::Delta(delta) => {
                    let _ = channels.snapshot_tx.send(hub.snapshot());
                    // No subscribers is fine; late joiners start from the snapshot.
                    let _ = channels.delta_tx.send(delta);
                }
                HubOutput::Authority(holder) => {
                    let _ = channels.authority_tx.send(holder);
                }
                HubOutput::Rejected { node_id, reason } => {
                    let _ = channels.rejected_tx.send(Rejection { node_id, reason });
                }
            }
        }
    }
    debug!("object task exiting");
}
