// Observer-side smoothing between replicated updates.

use crate::domain::{ListChange, Proxy, ReplicatedList, SyncTuning, TransformRecord};
use crate::use_cases::TickContext;
use tracing::debug;

/// Whether an index still has blending work left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Interpolating,
}

/// Blend progress for one proxy index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationState {
    /// Pose the proxy showed when the latest change arrived.
    pub old: TransformRecord,
    /// Remaining tick budget; counts down by `lerp_step`.
    pub countdown: f32,
}

impl InterpolationState {
    pub fn phase(&self) -> Phase {
        if self.countdown > 0.0 {
            Phase::Interpolating
        } else {
            Phase::Idle
        }
    }

    /// Blend factor `t`: 0 at reset, below 1 while interpolating.
    pub fn progress(&self, sync_period: f32) -> f32 {
        (sync_period - self.countdown) / sync_period
    }
}

/// Per-index countdown state machine driving non-authoritative proxies.
#[derive(Debug, Clone)]
pub struct Interpolator {
    tuning: SyncTuning,
    states: Vec<Option<InterpolationState>>,
}

impl Interpolator {
    pub fn new(tuning: SyncTuning, width: usize) -> Self {
        Self {
            tuning,
            states: vec![None; width],
        }
    }

    pub fn state(&self, index: usize) -> Option<&InterpolationState> {
        self.states.get(index).and_then(Option::as_ref)
    }

    /// Restarts blending for the changed index from the proxy's current pose.
    ///
    /// Ignored on authoritative nodes, while sync is off, and for indices outside the
    /// proxy set. Returns true when the state was reset.
    pub fn on_change<P: Proxy>(
        &mut self,
        change: ListChange,
        proxies: &[P],
        ctx: TickContext,
    ) -> bool {
        if !ctx.observes() {
            return false;
        }
        let (Some(proxy), Some(slot)) = (
            proxies.get(change.index),
            self.states.get_mut(change.index),
        ) else {
            return false;
        };

        *slot = Some(InterpolationState {
            old: proxy.transform(),
            countdown: self.tuning.period_f32(),
        });
        true
    }

    /// Advances every interpolating index by one tick and writes blended poses.
    ///
    /// Returns the number of proxies written.
    pub fn tick<P: Proxy>(
        &mut self,
        proxies: &mut [P],
        list: &ReplicatedList,
        ctx: TickContext,
    ) -> usize {
        if !ctx.observes() {
            return 0;
        }

        let period = self.tuning.period_f32();
        let mut written = 0;
        for (index, (slot, proxy)) in self.states.iter_mut().zip(proxies.iter_mut()).enumerate() {
            let Some(state) = slot.as_mut() else {
                continue;
            };
            if state.phase() == Phase::Idle {
                continue;
            }

            state.countdown -= self.tuning.lerp_step;
            if state.phase() == Phase::Idle {
                // Hold the last blended pose; no snap to the target.
                debug!(index, countdown = state.countdown, "interpolation exhausted");
                continue;
            }

            let Some(target) = list.get(index) else {
                continue;
            };
            let t = state.progress(period);
            proxy.set_transform(state.old.blend(target, t));
            written += 1;
        }
        written
    }
}
