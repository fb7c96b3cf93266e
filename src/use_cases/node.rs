// Per-object replication behaviour embedded by every participating node.

use crate::domain::{BatchMessage, ListChange, ListDelta, Proxy, ReplicatedList, SyncError, SyncTuning};
use crate::use_cases::{Interpolator, Sampler, TickContext};
use tracing::debug;

/// Ties one proxy set to its sampler, interpolator and local mirror of the replicated list.
///
/// The same node type runs on the authority and on observers; which half does work is
/// decided per tick by the `has_authority` flag the caller passes in.
#[derive(Debug)]
pub struct SyncNode<P> {
    proxies: Vec<P>,
    mirror: ReplicatedList,
    sampler: Sampler,
    interpolator: Interpolator,
    sync: bool,
    had_authority: bool,
}

impl<P: Proxy> SyncNode<P> {
    pub fn new(proxies: Vec<P>, tuning: SyncTuning) -> Result<Self, SyncError> {
        let tuning = tuning.validate()?;
        let width = proxies.len();
        Ok(Self {
            proxies,
            mirror: ReplicatedList::new(),
            sampler: Sampler::new(tuning, width),
            interpolator: Interpolator::new(tuning, width),
            sync: true,
            had_authority: false,
        })
    }

    pub fn proxies(&self) -> &[P] {
        &self.proxies
    }

    /// Direct access for the authority's own simulation; observers should not write here.
    pub fn proxies_mut(&mut self) -> &mut [P] {
        &mut self.proxies
    }

    pub fn mirror(&self) -> &ReplicatedList {
        &self.mirror
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    pub fn sync(&self) -> bool {
        self.sync
    }

    pub fn set_sync(&mut self, sync: bool) {
        if self.sync != sync {
            debug!(sync, "sync toggled");
        }
        self.sync = sync;
    }

    /// Runs one fixed simulation step.
    ///
    /// With authority, returns the batches due this tick for the caller to send; otherwise
    /// advances interpolation and returns nothing.
    pub fn tick(&mut self, has_authority: bool) -> Result<Vec<BatchMessage>, SyncError> {
        if has_authority != self.had_authority {
            // A fresh holder waits a full period before its first sample.
            self.sampler.reset();
            self.had_authority = has_authority;
        }

        let ctx = self.context(has_authority);
        if has_authority {
            return self.sampler.tick(&self.proxies, ctx.sync);
        }
        self.interpolator.tick(&mut self.proxies, &self.mirror, ctx);
        Ok(Vec::new())
    }

    /// Applies a delta from the reconciler to the mirror and resets interpolation for
    /// every index it touched.
    pub fn apply_delta(
        &mut self,
        delta: &ListDelta,
        has_authority: bool,
    ) -> Result<Vec<ListChange>, SyncError> {
        let changes = self.mirror.apply_delta(delta)?;
        let ctx = self.context(has_authority);
        for change in &changes {
            self.interpolator.on_change(*change, &self.proxies, ctx);
        }
        Ok(changes)
    }

    fn context(&self, has_authority: bool) -> TickContext {
        TickContext {
            has_authority,
            sync: self.sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocalProxy, TransformRecord};
    use crate::use_cases::Reconciler;
    use glam::Vec3;

    fn at(x: f32) -> TransformRecord {
        TransformRecord::new(Vec3::new(x, 0.0, 0.0), Vec3::ZERO)
    }

    fn pair(tuning: SyncTuning) -> (SyncNode<LocalProxy>, SyncNode<LocalProxy>) {
        let authority = SyncNode::new(vec![LocalProxy::at(at(0.0))], tuning).expect("valid");
        let observer = SyncNode::new(vec![LocalProxy::at(at(0.0))], tuning).expect("valid");
        (authority, observer)
    }

    // Sends authority batches through a reconciler and feeds the delta to both nodes.
    fn relay(
        batches: Vec<BatchMessage>,
        reconciler: &mut Reconciler,
        authority: &mut SyncNode<LocalProxy>,
        observer: &mut SyncNode<LocalProxy>,
    ) {
        for batch in batches {
            let changes = reconciler.merge(&batch).expect("merge succeeds");
            let delta = reconciler.list().delta_for(&changes);
            authority.apply_delta(&delta, true).expect("authority mirror applies");
            observer.apply_delta(&delta, false).expect("observer mirror applies");
        }
    }

    #[test]
    fn when_authority_moves_then_observer_converges_towards_it() {
        let (mut authority, mut observer) = pair(SyncTuning::default());
        let mut reconciler = Reconciler::new(Some(1));
        authority.proxies_mut()[0].record = at(10.0);

        for _ in 0..10 {
            let batches = authority.tick(true).expect("authority tick");
            relay(batches, &mut reconciler, &mut authority, &mut observer);
            observer.tick(false).expect("observer tick");
        }
        for _ in 0..6 {
            observer.tick(false).expect("observer tick");
        }

        let x = observer.proxies()[0].record.position.x;
        assert!((x - 9.6).abs() < 1e-3, "observer at {x}");
        assert_eq!(observer.mirror().records(), reconciler.list().records());
        assert_eq!(authority.proxies()[0].writes, 0);
    }

    #[test]
    fn when_sync_is_disabled_mid_interpolation_then_observer_proxy_is_frozen() {
        let (mut authority, mut observer) = pair(SyncTuning::default());
        let mut reconciler = Reconciler::new(Some(1));
        authority.proxies_mut()[0].record = at(10.0);
        let batches = authority.sampler.sample(authority.proxies()).expect("sample");
        relay(batches, &mut reconciler, &mut authority, &mut observer);
        observer.tick(false).expect("observer tick");
        observer.tick(false).expect("observer tick");
        let frozen = observer.proxies()[0];

        observer.set_sync(false);
        authority.proxies_mut()[0].record = at(40.0);
        let batches = authority.sampler.sample(authority.proxies()).expect("sample");
        relay(batches, &mut reconciler, &mut authority, &mut observer);
        for _ in 0..10 {
            observer.tick(false).expect("observer tick");
        }

        assert_eq!(observer.proxies()[0], frozen);
        // The mirror still tracks the list; only the proxy is frozen.
        assert_eq!(observer.mirror().get(0), Some(&at(40.0)));

        observer.set_sync(true);
        observer.tick(false).expect("observer tick");
        assert!(observer.proxies()[0].writes > frozen.writes);
    }

    #[test]
    fn when_authority_is_acquired_then_first_sample_waits_a_full_period() {
        let tuning = SyncTuning {
            sync_period: 3,
            ..SyncTuning::default()
        };
        let mut node = SyncNode::new(vec![LocalProxy::default()], tuning).expect("valid");

        node.tick(true).expect("tick");
        node.tick(true).expect("tick");
        node.tick(false).expect("tick");
        assert!(node.tick(true).expect("tick").is_empty());
        assert!(node.tick(true).expect("tick").is_empty());

        assert_eq!(node.tick(true).expect("tick").len(), 1);
    }

    #[test]
    fn when_tuning_is_invalid_then_node_is_not_built() {
        let tuning = SyncTuning {
            lerp_step: 0.0,
            ..SyncTuning::default()
        };

        let result = SyncNode::new(vec![LocalProxy::default()], tuning);

        assert!(matches!(result, Err(SyncError::InvalidTuning(_))));
    }
}
