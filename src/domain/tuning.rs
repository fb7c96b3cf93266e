use crate::domain::SyncError;

/// Replication tuning for one synchronized object.
///
/// Keep this separate from runtime/server configuration (ports, channel sizes, etc.).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncTuning {
    /// Ticks between two samples on the authority; also the interpolation budget.
    pub sync_period: u32,

    /// Amount the interpolation countdown drops per tick.
    pub lerp_step: f32,

    /// Largest number of proxies per batch message (`None` sends one batch).
    pub max_batch_width: Option<usize>,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            sync_period: 10,
            lerp_step: 1.6,
            max_batch_width: None,
        }
    }
}

impl SyncTuning {
    pub fn validate(self) -> Result<Self, SyncError> {
        if self.sync_period == 0 {
            return Err(SyncError::invalid_tuning("sync_period must be at least 1"));
        }
        if !self.lerp_step.is_finite() || self.lerp_step <= 0.0 {
            return Err(SyncError::invalid_tuning(format!(
                "lerp_step must be positive, got {}",
                self.lerp_step
            )));
        }
        if self.max_batch_width == Some(0) {
            return Err(SyncError::invalid_tuning("max_batch_width must be at least 1"));
        }
        Ok(self)
    }

    /// Countdown value an index is reset to on every change notification.
    pub fn period_f32(&self) -> f32 {
        self.sync_period as f32
    }
}
