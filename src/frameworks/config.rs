use crate::domain::SyncTuning;
use crate::use_cases::reconciler::DEFAULT_MAX_LIST_LEN;
use std::env;

// Runtime/server constants and the replication tuning read from the environment.

pub fn http_port() -> u16 {
    env::var("MOVE_SYNC_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3101)
}

pub fn sync_tuning() -> SyncTuning {
    let defaults = SyncTuning::default();
    SyncTuning {
        sync_period: env::var("SYNC_PERIOD_TICKS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(defaults.sync_period),
        lerp_step: env::var("LERP_STEP")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(defaults.lerp_step),
        max_batch_width: env::var("MAX_BATCH_WIDTH")
            .ok()
            .and_then(|value| value.parse().ok()),
    }
}

// Unset means batches of any width are accepted.
pub fn default_object_width() -> Option<usize> {
    env::var("DEFAULT_OBJECT_WIDTH")
        .ok()
        .and_then(|value| value.parse().ok())
}

// Bounds list growth (and padding) for every object.
pub fn max_list_len() -> usize {
    env::var("MAX_LIST_LEN")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_MAX_LIST_LEN)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const DELTA_BROADCAST_CAPACITY: usize = 128;

pub const DEFAULT_OBJECT_ID: &str = "default";
