use crate::domain::{BatchMessage, ListDelta, SyncTuning};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::{
    ClientMessage, ListDeltaDto, ServerMessage, SyncTuningDto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::{is_reserved, next_id};
use crate::use_cases::{HubEvent, NodeId, ObjectHandle, Rejection};

use axum::{
    Error, Json,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    DeltasClosed,
    AuthorityClosed,
    RejectionsClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ObjectQuery {
    // The object the node wants to replicate.
    #[serde(default)]
    object_id: Option<String>,
    // Optional node id when the client has a preassigned identity.
    #[serde(default)]
    node_id: Option<NodeId>,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;

fn encode(msg: &ServerMessage) -> Result<Utf8Bytes, serde_json::Error> {
    serde_json::to_string(msg).map(Utf8Bytes::from)
}

fn encode_delta(delta: &ListDelta) -> Option<Utf8Bytes> {
    match encode(&ServerMessage::Delta(ListDeltaDto::from(delta))) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!(error = ?e, "failed to serialize delta");
            None
        }
    }
}

pub async fn delta_serializer(
    mut delta_rx: broadcast::Receiver<ListDelta>,
    snapshot_rx: watch::Receiver<ListDelta>,
    delta_bytes_tx: broadcast::Sender<Utf8Bytes>,
) {
    // Serialize each delta once and broadcast the shared bytes.
    loop {
        match delta_rx.recv().await {
            Ok(delta) => {
                if let Some(bytes) = encode_delta(&delta) {
                    let _ = delta_bytes_tx.send(bytes);
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Skipped deltas may hold appends; the full list stands in for them.
                warn!(missed = n, "delta serializer lagged; broadcasting snapshot");
                let snapshot = snapshot_rx.borrow().clone();
                if let Some(bytes) = encode_delta(&snapshot) {
                    let _ = delta_bytes_tx.send(bytes);
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("delta channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_object_serializer(object: &ObjectHandle) {
    // Spawn a task that serializes deltas for this object.
    tokio::spawn(delta_serializer(
        object.delta_tx.subscribe(),
        object.snapshot_tx.subscribe(),
        object.delta_bytes_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ObjectQuery>,
) -> impl IntoResponse {
    let object_id = query
        .object_id
        .unwrap_or_else(|| state.default_object_id.to_string());

    let Some(object) = state.object_registry.get_object(&object_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "object not found".to_string(),
            }),
        )
            .into_response();
    };

    // Ids above the client range are handed out here and cannot be requested.
    if query.node_id.is_some_and(is_reserved) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "node_id is reserved".to_string(),
            }),
        )
            .into_response();
    }

    let node_id = query.node_id.unwrap_or_else(next_id);
    let tuning = state.tuning;
    ws.on_upgrade(move |socket| handle_socket(socket, object, node_id, tuning))
}

async fn handle_socket(
    socket: WebSocket,
    object: ObjectHandle,
    node_id: NodeId,
    tuning: SyncTuning,
) {
    let span = info_span!("conn", node_id, object_id = %object.object_id);
    serve_node(socket, object, node_id, tuning)
        .instrument(span)
        .await;
}

async fn serve_node(
    mut socket: WebSocket,
    object: ObjectHandle,
    node_id: NodeId,
    tuning: SyncTuning,
) {
    let node_slots = object.node_slots.clone();
    let conn_token = next_id();
    if !node_slots.claim(node_id, conn_token).await {
        warn!("node id already connected; refusing");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "node_id already connected".into(),
            })))
            .await;
        let _ = socket.close().await;
        return;
    }

    let mut ctx = match bootstrap_connection(&mut socket, &object, node_id, tuning).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "bootstrap failed".into(),
                })))
                .await;
            let _ = socket.close().await;
            node_slots.release_if_owner(node_id, conn_token).await;
            return;
        }
    };
    // Only the per-connection channel ends stay alive, so removing the object closes them.
    drop(object);
    info!("node connected");

    // Main Node Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "node loop exited with error");
    }
    // `Leave` is already queued, so a reconnect under the same id starts clean.
    node_slots.release_if_owner(node_id, conn_token).await;
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let bytes = encode(msg).map_err(NetError::Serialization)?;
    let len = bytes.len();
    socket.send(Message::Text(bytes)).await?;
    Ok(len)
}

struct ConnCtx {
    pub node_id: NodeId,
    pub input_tx: mpsc::Sender<HubEvent>,
    pub delta_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub snapshot_rx: watch::Receiver<ListDelta>,
    pub authority_rx: watch::Receiver<Option<NodeId>>,
    pub rejected_rx: broadcast::Receiver<Rejection>,
    // Count snapshot resyncs sent to this node.
    pub resync_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_delta_lag_log: Instant,
    pub last_invalid_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    object: &ObjectHandle,
    node_id: NodeId,
    tuning: SyncTuning,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates *before* sending anything (awaits) to not miss deltas.
    let delta_bytes_rx = object.delta_bytes_tx.subscribe();
    let snapshot_rx = object.snapshot_tx.subscribe();
    let mut authority_rx = object.authority_tx.subscribe();
    let rejected_rx = object.rejected_tx.subscribe();

    let mut msgs_out = 0;
    let mut bytes_out = 0;

    // Tell the node "This is who you are" and how often to sample.
    let identity = ServerMessage::Identity {
        node_id,
        tuning: SyncTuningDto::from(tuning),
    };
    bytes_out += send_message(socket, &identity).await? as u64;
    msgs_out += 1;

    // Initial list state. Deltas merged after this snapshot are still queued on
    // `delta_bytes_rx`; replaying them on the mirror overwrites in place.
    // Clone as soon as we borrow to avoid holding the lock across an await.
    let snapshot = ListDeltaDto::from(&*snapshot_rx.borrow());
    bytes_out += send_message(socket, &ServerMessage::Delta(snapshot)).await? as u64;
    msgs_out += 1;

    let holder = *authority_rx.borrow_and_update();
    bytes_out += send_message(socket, &ServerMessage::Authority { holder }).await? as u64;
    msgs_out += 1;

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        node_id,
        input_tx: object.input_tx.clone(),
        delta_bytes_rx,
        snapshot_rx,
        authority_rx,
        rejected_rx,
        resync_count: 0,

        msgs_in: 0,
        msgs_out,
        bytes_in: 0,
        bytes_out,

        invalid_json: 0,

        last_delta_lag_log: now,
        last_invalid_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    // Answer the sender directly without involving the object task.
    Reply(ServerMessage),
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let node_id = ctx.node_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        delta_bytes_rx,
        snapshot_rx,
        authority_rx,
        rejected_rx,
        resync_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        last_delta_lag_log,
        last_invalid_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming message from the node
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    node_id,
                    input_tx,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    last_invalid_log,
                    close_frame,
                ).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Reply(msg)) => matches!(
                        forward_message(&msg, socket, msgs_out, bytes_out).await,
                        LoopControl::Disconnect
                    ),
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing delta
            delta_msg = delta_bytes_rx.recv() => {
                match delta_msg {
                    Ok(bytes) => matches!(
                        forward_bytes(bytes, socket, msgs_out, bytes_out).await,
                        LoopControl::Disconnect
                    ),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_delta_lag_log) {
                            warn!(missed = n, "deltas lagged; sending snapshot");
                        }

                        // Resync strategy: send the full list; the mirror overwrites in place.
                        let snapshot = ListDeltaDto::from(&*snapshot_rx.borrow());
                        *resync_count += 1;
                        match send_message(socket, &ServerMessage::Delta(snapshot)).await {
                            Ok(len) => {
                                *msgs_out += 1;
                                *bytes_out += len as u64;
                                false
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send resync snapshot");
                                true
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::DeltasClosed);
                        true
                    }
                }
            }

            // Authority hand-off
            changed = authority_rx.changed() => {
                match changed {
                    Ok(()) => {
                        let holder = *authority_rx.borrow_and_update();
                        matches!(
                            forward_message(&ServerMessage::Authority { holder }, socket, msgs_out, bytes_out).await,
                            LoopControl::Disconnect
                        )
                    }
                    Err(_) => {
                        warn!(node_id, "authority channel closed; disconnecting");
                        fatal = Some(NetError::AuthorityClosed);
                        true
                    }
                }
            }

            // Refusals addressed to this node
            rejected = rejected_rx.recv() => {
                match rejected {
                    Ok(rejection) if rejection.node_id == node_id => {
                        let msg = ServerMessage::Rejected { reason: rejection.reason };
                        matches!(
                            forward_message(&msg, socket, msgs_out, bytes_out).await,
                            LoopControl::Disconnect
                        )
                    }
                    Ok(_) => false,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(missed = n, "rejections lagged");
                        false
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::RejectionsClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    // Release authority if this node held it.
    let cleanup = input_tx
        .send(HubEvent::Leave { node_id })
        .await
        .map_err(|_| NetError::InputClosed);

    debug!(
        node_id,
        msgs_in = *msgs_in,
        msgs_out = *msgs_out,
        bytes_in = *bytes_in,
        bytes_out = *bytes_out,
        invalid_json = *invalid_json,
        resync_count = *resync_count,
        "connection stats"
    );
    info!(node_id, "node disconnected");

    match (fatal, cleanup) {
        (Some(err), _) => Err(err),
        (None, Err(err)) => Err(err),
        (None, Ok(())) => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    node_id: NodeId,
    input_tx: &mpsc::Sender<HubEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    last_invalid_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                let event = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Batch(dto)) => match BatchMessage::try_from(dto) {
                        Ok(batch) => HubEvent::Batch { node_id, batch },
                        Err(e) => {
                            if should_log(last_invalid_log) {
                                warn!(node_id, error = %e, "malformed batch dropped");
                            }
                            return Ok(LoopControl::Reply(ServerMessage::Rejected {
                                reason: e.to_string(),
                            }));
                        }
                    },
                    Ok(ClientMessage::RequestAuthority) => HubEvent::RequestAuthority { node_id },
                    Ok(ClientMessage::ReleaseAuthority) => HubEvent::ReleaseAuthority { node_id },
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_log) {
                            warn!(
                                node_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse node message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }
                        return Ok(LoopControl::Continue);
                    }
                };

                // Batches are reliable and ordered: wait for room rather than drop.
                input_tx
                    .send(event)
                    .await
                    .map_err(|_| NetError::InputClosed)?;
                Ok(LoopControl::Continue)
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(node_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(node_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_bytes(
    bytes: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let len = bytes.len();
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send delta");
            LoopControl::Disconnect
        }
    }
}

async fn forward_message(
    msg: &ServerMessage,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    match send_message(socket, msg).await {
        Ok(len) => {
            *msgs_out += 1;
            *bytes_out += len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send message");
            LoopControl::Disconnect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeltaEntry, ListOp, TransformRecord};
    use glam::Vec3;

    fn append(index: usize) -> DeltaEntry {
        DeltaEntry {
            index,
            op: ListOp::Append,
            record: TransformRecord::new(Vec3::new(index as f32, 0.0, 0.0), Vec3::ZERO),
        }
    }

    fn decode(bytes: &Utf8Bytes) -> ListDeltaDto {
        match serde_json::from_str(bytes.as_str()).expect("server message parses") {
            ServerMessage::Delta(delta) => delta,
            other => panic!("expected a delta, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn when_serializer_lags_then_snapshot_replaces_skipped_deltas() {
        let (delta_tx, delta_rx) = broadcast::channel(1);
        let full = ListDelta {
            entries: (0..3).map(append).collect(),
        };
        let (_snapshot_tx, snapshot_rx) = watch::channel(full);
        let (bytes_tx, mut bytes_rx) = broadcast::channel(8);

        // Overrun the one-slot channel before the serializer reads anything.
        for index in 0..3 {
            delta_tx
                .send(ListDelta {
                    entries: vec![append(index)],
                })
                .expect("serializer receiver is alive");
        }
        let task = tokio::spawn(delta_serializer(delta_rx, snapshot_rx, bytes_tx));

        let resync = decode(&bytes_rx.recv().await.expect("snapshot bytes"));
        assert_eq!(resync.entries.len(), 3);

        let latest = decode(&bytes_rx.recv().await.expect("latest delta bytes"));
        assert_eq!(latest.entries.len(), 1);
        assert_eq!(latest.entries[0].index, 2);

        drop(delta_tx);
        task.await.expect("serializer exits when deltas close");
    }
}
