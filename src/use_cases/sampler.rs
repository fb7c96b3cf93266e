// Authority-side sampling of proxy transforms into batch messages.

use crate::domain::{BatchMessage, Proxy, SyncError, SyncTuning};
use tracing::trace;

/// Counts authoritative ticks and samples the proxy set every `sync_period` of them.
#[derive(Debug, Clone)]
pub struct Sampler {
    tuning: SyncTuning,
    width: usize,
    ticks_since_sample: u32,
}

impl Sampler {
    /// `width` is the proxy count fixed at initialization.
    pub fn new(tuning: SyncTuning, width: usize) -> Self {
        Self {
            tuning,
            width,
            ticks_since_sample: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Advances the tick counter and samples when the period is reached.
    ///
    /// Returns no batches on ticks that do not sample, when `sync` is off, or when the
    /// proxy set is empty.
    pub fn tick<P: Proxy>(
        &mut self,
        proxies: &[P],
        sync: bool,
    ) -> Result<Vec<BatchMessage>, SyncError> {
        if !sync {
            return Ok(Vec::new());
        }

        self.ticks_since_sample += 1;
        if self.ticks_since_sample < self.tuning.sync_period {
            return Ok(Vec::new());
        }
        self.ticks_since_sample = 0;

        if proxies.is_empty() && self.width == 0 {
            return Ok(Vec::new());
        }
        self.sample(proxies)
    }

    /// Reads every proxy into per-axis arrays, split by `max_batch_width` when set.
    pub fn sample<P: Proxy>(&self, proxies: &[P]) -> Result<Vec<BatchMessage>, SyncError> {
        if proxies.len() != self.width {
            return Err(SyncError::ProxyCountMismatch {
                expected: self.width,
                actual: proxies.len(),
            });
        }

        let chunk = self.tuning.max_batch_width.unwrap_or(self.width).max(1);
        let batches: Vec<BatchMessage> = proxies
            .chunks(chunk)
            .enumerate()
            .map(|(n, group)| {
                let mut batch = BatchMessage::with_capacity(n * chunk, group.len());
                for proxy in group {
                    batch.push(proxy.transform());
                }
                batch
            })
            .collect();

        trace!(proxies = proxies.len(), batches = batches.len(), "sampled proxies");
        Ok(batches)
    }

    /// Restarts the period, used when authority is (re)acquired.
    pub fn reset(&mut self) {
        self.ticks_since_sample = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocalProxy, TransformRecord};
    use glam::Vec3;

    fn proxies(n: usize) -> Vec<LocalProxy> {
        (0..n)
            .map(|i| {
                LocalProxy::at(TransformRecord::new(
                    Vec3::new(i as f32, 0.0, 0.0),
                    Vec3::new(0.0, 10.0 * i as f32, 0.0),
                ))
            })
            .collect()
    }

    #[test]
    fn when_period_elapses_then_one_batch_with_every_proxy_is_sampled() {
        let set = proxies(3);
        let mut sampler = Sampler::new(SyncTuning::default(), 3);

        for _ in 0..9 {
            assert!(sampler.tick(&set, true).expect("tick succeeds").is_empty());
        }
        let batches = sampler.tick(&set, true).expect("tick succeeds");

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].px, vec![0.0, 1.0, 2.0]);
        assert_eq!(batches[0].ey, vec![0.0, 10.0, 20.0]);
        assert_eq!(batches[0].offset, 0);
    }

    #[test]
    fn when_sync_is_disabled_then_counter_does_not_advance() {
        let set = proxies(1);
        let mut sampler = Sampler::new(SyncTuning::default(), 1);

        for _ in 0..9 {
            sampler.tick(&set, true).expect("tick succeeds");
        }
        for _ in 0..50 {
            assert!(sampler.tick(&set, false).expect("tick succeeds").is_empty());
        }

        assert_eq!(sampler.tick(&set, true).expect("tick succeeds").len(), 1);
    }

    #[test]
    fn when_proxy_set_shrinks_then_sampling_is_rejected() {
        let set = proxies(2);
        let sampler = Sampler::new(SyncTuning::default(), 3);

        let err = sampler.sample(&set).expect_err("short proxy set");

        assert_eq!(
            err,
            SyncError::ProxyCountMismatch {
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn when_max_batch_width_is_set_then_batches_are_split_with_offsets() {
        let set = proxies(5);
        let tuning = SyncTuning {
            max_batch_width: Some(2),
            ..SyncTuning::default()
        };
        let sampler = Sampler::new(tuning, 5);

        let batches = sampler.sample(&set).expect("sample succeeds");

        let ranges: Vec<_> = batches.iter().map(BatchMessage::indices).collect();
        assert_eq!(ranges, vec![0..2, 2..4, 4..5]);
        assert_eq!(batches[2].px, vec![4.0]);
    }

    #[test]
    fn when_proxy_set_is_empty_then_no_batch_is_sent() {
        let set: Vec<LocalProxy> = Vec::new();
        let tuning = SyncTuning {
            sync_period: 1,
            ..SyncTuning::default()
        };
        let mut sampler = Sampler::new(tuning, 0);

        assert!(sampler.tick(&set, true).expect("tick succeeds").is_empty());
    }
}
