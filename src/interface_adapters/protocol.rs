// Wire protocol DTOs and conversions for relay messages.
// HTTP request/response bodies for object management live in `net::internal`.

use crate::domain::{
    BatchMessage, DeltaEntry, ListDelta, ListOp, SyncError, SyncTuning, TransformRecord,
};
use crate::use_cases::NodeId;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Messages the relay sends to connected nodes over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity for the connection and the tuning every node must share.
    Identity {
        node_id: NodeId,
        tuning: SyncTuningDto,
    },
    // Changed list entries; also carries the full snapshot on connect and lag recovery.
    Delta(ListDeltaDto),
    // Current authority holder (None when unclaimed).
    Authority { holder: Option<NodeId> },
    // A request from this node was refused.
    Rejected { reason: String },
}

/// Messages a node sends to the relay over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Sampled transforms; only accepted from the authority holder.
    Batch(BatchMessageDto),
    RequestAuthority,
    ReleaseAuthority,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncTuningDto {
    pub sync_period: u32,
    pub lerp_step: f32,
    #[serde(default)]
    pub max_batch_width: Option<usize>,
}

impl From<SyncTuning> for SyncTuningDto {
    fn from(tuning: SyncTuning) -> Self {
        Self {
            sync_period: tuning.sync_period,
            lerp_step: tuning.lerp_step,
            max_batch_width: tuning.max_batch_width,
        }
    }
}

impl TryFrom<SyncTuningDto> for SyncTuning {
    type Error = SyncError;

    fn try_from(dto: SyncTuningDto) -> Result<Self, Self::Error> {
        SyncTuning {
            sync_period: dto.sync_period,
            lerp_step: dto.lerp_step,
            max_batch_width: dto.max_batch_width,
        }
        .validate()
    }
}

/// Per-axis arrays exactly as the sampler produced them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMessageDto {
    #[serde(default)]
    pub offset: usize,
    pub px: Vec<f32>,
    pub py: Vec<f32>,
    pub pz: Vec<f32>,
    pub ex: Vec<f32>,
    pub ey: Vec<f32>,
    pub ez: Vec<f32>,
}

impl From<BatchMessage> for BatchMessageDto {
    fn from(batch: BatchMessage) -> Self {
        Self {
            offset: batch.offset,
            px: batch.px,
            py: batch.py,
            pz: batch.pz,
            ex: batch.ex,
            ey: batch.ey,
            ez: batch.ez,
        }
    }
}

impl TryFrom<BatchMessageDto> for BatchMessage {
    type Error = SyncError;

    fn try_from(dto: BatchMessageDto) -> Result<Self, Self::Error> {
        let batch = BatchMessage {
            offset: dto.offset,
            px: dto.px,
            py: dto.py,
            pz: dto.pz,
            ex: dto.ex,
            ey: dto.ey,
            ez: dto.ez,
        };
        batch.validate()?;
        Ok(batch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOpDto {
    Append,
    Overwrite,
}

impl From<ListOp> for ListOpDto {
    fn from(op: ListOp) -> Self {
        match op {
            ListOp::Append => ListOpDto::Append,
            ListOp::Overwrite => ListOpDto::Overwrite,
        }
    }
}

impl From<ListOpDto> for ListOp {
    fn from(op: ListOpDto) -> Self {
        match op {
            ListOpDto::Append => ListOp::Append,
            ListOpDto::Overwrite => ListOp::Overwrite,
        }
    }
}

/// Flattened list entry for wire transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaEntryDto {
    pub index: usize,
    pub op: ListOpDto,
    pub position: [f32; 3],
    pub euler: [f32; 3],
}

impl From<&DeltaEntry> for DeltaEntryDto {
    fn from(entry: &DeltaEntry) -> Self {
        Self {
            index: entry.index,
            op: entry.op.into(),
            position: entry.record.position.to_array(),
            euler: entry.record.euler.to_array(),
        }
    }
}

impl From<&DeltaEntryDto> for DeltaEntry {
    fn from(entry: &DeltaEntryDto) -> Self {
        Self {
            index: entry.index,
            op: entry.op.into(),
            record: TransformRecord::new(
                Vec3::from_array(entry.position),
                Vec3::from_array(entry.euler),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListDeltaDto {
    pub entries: Vec<DeltaEntryDto>,
}

impl From<&ListDelta> for ListDeltaDto {
    fn from(delta: &ListDelta) -> Self {
        Self {
            entries: delta.entries.iter().map(DeltaEntryDto::from).collect(),
        }
    }
}

impl From<&ListDeltaDto> for ListDelta {
    fn from(delta: &ListDeltaDto) -> Self {
        Self {
            entries: delta.entries.iter().map(DeltaEntry::from).collect(),
        }
    }
}
