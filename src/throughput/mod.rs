//! Rolling per-category throughput estimation from chunk arrivals.
//!
//! This module provides the [`ThroughputSampler`] which keeps a bounded,
//! ordered history of [`ThroughputSample`]s for each [`MediaCategory`] and
//! exposes the rolling delivery rate to an external adaptive controller.
//!
//! # Overview
//!
//! Every completed chunk becomes one sample: its size in bits and the
//! wall-clock time since the previous sample boundary of the same attempt
//! (see [`SampleBoundary`]). The estimate is the ratio of the summed bits to
//! the summed milliseconds over the retained samples.
//!
//! # Example
//!
//! ```
//! use segment_loader::request::MediaCategory;
//! use segment_loader::throughput::{ThroughputSample, ThroughputSampler};
//!
//! let sampler = ThroughputSampler::new(1);
//! sampler.record(MediaCategory::Video, ThroughputSample::new(1_000_000, 1000));
//! assert_eq!(sampler.estimate(MediaCategory::Video), Some(1000.0));
//! ```

mod boundary;

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{instrument, trace};

use crate::config::ThroughputSettings;
use crate::request::MediaCategory;

pub use boundary::SampleBoundary;

/// One delivery observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSample {
    /// Bits transferred.
    pub bits: u64,
    /// Milliseconds elapsed, never zero.
    pub millis: u64,
}

impl ThroughputSample {
    /// Creates a sample, flooring the elapsed time to 1 ms.
    #[must_use]
    pub fn new(bits: u64, millis: u64) -> Self {
        Self {
            bits,
            millis: millis.max(1),
        }
    }

    /// Creates a sample for `bytes` delivered over `elapsed`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_chunk(bytes: usize, elapsed: Duration) -> Self {
        Self::new((bytes as u64).saturating_mul(8), elapsed.as_millis() as u64)
    }
}

/// Bounded history for one category with running sums.
#[derive(Debug, Default)]
struct SampleHistory {
    samples: VecDeque<ThroughputSample>,
    bits: u64,
    millis: u64,
}

impl SampleHistory {
    fn push(&mut self, sample: ThroughputSample, capacity: usize) {
        self.samples.push_back(sample);
        self.bits = self.bits.saturating_add(sample.bits);
        self.millis = self.millis.saturating_add(sample.millis);
        while self.samples.len() > capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.bits -= evicted.bits;
                self.millis -= evicted.millis;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn estimate(&self) -> Option<f64> {
        (self.millis > 0).then(|| self.bits as f64 / self.millis as f64)
    }
}

/// Per-category rolling throughput estimator.
///
/// Each category's history lives in its own `DashMap` entry, so concurrent
/// audio and video pipelines only contend on their own shard.
#[derive(Debug)]
pub struct ThroughputSampler {
    capacity: usize,
    histories: DashMap<MediaCategory, SampleHistory>,
}

impl Default for ThroughputSampler {
    fn default() -> Self {
        Self::from_settings(&ThroughputSettings::default())
    }
}

impl ThroughputSampler {
    /// Creates a sampler keeping at most `capacity` samples per category.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            histories: DashMap::new(),
        }
    }

    /// Creates a sampler from configuration.
    #[must_use]
    pub fn from_settings(settings: &ThroughputSettings) -> Self {
        Self::new(settings.history_capacity)
    }

    /// Returns the per-category history capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes a sample, evicting the oldest when over capacity.
    #[instrument(level = "trace", skip(self))]
    pub fn record(&self, category: MediaCategory, sample: ThroughputSample) {
        let mut history = self.histories.entry(category).or_default();
        history.push(sample, self.capacity);
        trace!(
            samples = history.samples.len(),
            estimate = history.estimate(),
            "throughput sample recorded"
        );
    }

    /// Pushes the sample for a chunk of `bytes` delivered over `elapsed`.
    pub fn record_chunk(&self, category: MediaCategory, bytes: usize, elapsed: Duration) {
        self.record(category, ThroughputSample::from_chunk(bytes, elapsed));
    }

    /// Rolling estimate in bits per millisecond, or `None` without samples.
    #[must_use]
    pub fn estimate(&self, category: MediaCategory) -> Option<f64> {
        self.histories.get(&category).and_then(|history| history.estimate())
    }

    /// Rolling estimate in bits per second.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn estimate_bps(&self, category: MediaCategory) -> Option<u64> {
        self.estimate(category).map(|bits_per_ms| (bits_per_ms * 1000.0).round() as u64)
    }

    /// Returns the retained samples, oldest first.
    #[must_use]
    pub fn samples(&self, category: MediaCategory) -> Vec<ThroughputSample> {
        self.histories
            .get(&category)
            .map(|history| history.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns how many samples are retained for a category.
    #[must_use]
    pub fn sample_count(&self, category: MediaCategory) -> usize {
        self.histories
            .get(&category)
            .map_or(0, |history| history.samples.len())
    }

    /// Drops the history of one category.
    pub fn reset(&self, category: MediaCategory) {
        self.histories.remove(&category);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sample_estimate() {
        let sampler = ThroughputSampler::new(1);
        sampler.record(MediaCategory::Video, ThroughputSample::new(1_000_000, 1000));
        assert_eq!(sampler.estimate(MediaCategory::Video), Some(1000.0));
        assert_eq!(sampler.estimate_bps(MediaCategory::Video), Some(1_000_000));
    }

    #[test]
    fn test_second_sample_evicts_first_at_capacity_one() {
        let sampler = ThroughputSampler::new(1);
        sampler.record(MediaCategory::Video, ThroughputSample::new(1_000_000, 1000));
        sampler.record(MediaCategory::Video, ThroughputSample::new(400_000, 100));

        assert_eq!(sampler.sample_count(MediaCategory::Video), 1);
        assert_eq!(sampler.estimate(MediaCategory::Video), Some(4000.0));
    }

    #[test]
    fn test_estimate_is_ratio_of_sums() {
        let sampler = ThroughputSampler::new(3);
        sampler.record(MediaCategory::Audio, ThroughputSample::new(1000, 10));
        sampler.record(MediaCategory::Audio, ThroughputSample::new(3000, 10));
        // (1000 + 3000) / (10 + 10)
        assert_eq!(sampler.estimate(MediaCategory::Audio), Some(200.0));

        sampler.record(MediaCategory::Audio, ThroughputSample::new(0, 20));
        sampler.record(MediaCategory::Audio, ThroughputSample::new(6000, 20));
        assert_eq!(
            sampler.samples(MediaCategory::Audio),
            vec![
                ThroughputSample::new(3000, 10),
                ThroughputSample::new(0, 20),
                ThroughputSample::new(6000, 20),
            ]
        );
        assert_eq!(sampler.estimate(MediaCategory::Audio), Some(180.0));
    }

    #[test]
    fn test_zero_elapsed_is_floored_to_one_ms() {
        let sample = ThroughputSample::from_chunk(100, Duration::ZERO);
        assert_eq!(sample, ThroughputSample { bits: 800, millis: 1 });
    }

    #[test]
    fn test_categories_are_independent() {
        let sampler = ThroughputSampler::new(4);
        sampler.record_chunk(MediaCategory::Video, 125_000, Duration::from_millis(100));
        assert_eq!(sampler.estimate(MediaCategory::Video), Some(10_000.0));
        assert_eq!(sampler.estimate(MediaCategory::Audio), None);

        sampler.reset(MediaCategory::Video);
        assert_eq!(sampler.estimate(MediaCategory::Video), None);
    }

    #[test]
    fn test_capacity_minimum_is_one() {
        assert_eq!(ThroughputSampler::new(0).capacity(), 1);
    }
}
