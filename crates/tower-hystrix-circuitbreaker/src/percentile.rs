//! Rolling latency percentiles.

use crate::window::{BucketClock, BucketRing};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Default)]
struct Samples {
    values: Vec<u64>,
    written: usize,
}

impl Samples {
    /// Keeps at most `capacity` samples, overwriting the oldest once full.
    fn push(&mut self, value: u64, capacity: usize) {
        if self.values.len() < capacity {
            self.values.push(value);
        } else {
            let slot = self.written % capacity;
            self.values[slot] = value;
        }
        self.written += 1;
    }
}

/// Execution latencies over the rolling window.
#[derive(Debug)]
pub(crate) struct RollingPercentile {
    clock: BucketClock,
    bucket_size: usize,
    ring: Mutex<BucketRing<Samples>>,
}

impl RollingPercentile {
    pub(crate) fn new(window: Duration, buckets: usize, bucket_size: usize) -> Self {
        Self {
            clock: BucketClock::new(window, buckets),
            bucket_size: bucket_size.max(1),
            ring: Mutex::new(BucketRing::new(buckets)),
        }
    }

    pub(crate) fn add(&self, latency: Duration) {
        let index = self.clock.current();
        let millis = latency.as_millis() as u64;
        self.ring.lock().current(index).push(millis, self.bucket_size);
    }

    pub(crate) fn snapshot(&self) -> PercentileSnapshot {
        let index = self.clock.current();
        let mut values: Vec<u64> = {
            let mut ring = self.ring.lock();
            ring.visible(index)
                .flat_map(|bucket| bucket.values.iter().copied())
                .collect()
        };
        values.sort_unstable();
        PercentileSnapshot::from_sorted(values)
    }

    pub(crate) fn reset(&self) {
        self.ring.lock().clear();
    }
}

/// Sorted latency samples, in milliseconds, taken from the visible window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PercentileSnapshot {
    sorted: Vec<u64>,
    mean: u64,
}

impl PercentileSnapshot {
    pub(crate) fn from_sorted(sorted: Vec<u64>) -> Self {
        let mean = if sorted.is_empty() {
            0
        } else {
            sorted.iter().sum::<u64>() / sorted.len() as u64
        };
        Self { sorted, mean }
    }

    /// Value at percentile `p` (0 to 100), interpolated between the two
    /// nearest ranks. Returns 0 for an empty window.
    pub fn percentile(&self, p: f64) -> u64 {
        let data = &self.sorted;
        let Some(&last) = data.last() else {
            return 0;
        };
        if p <= 0.0 {
            return data[0];
        }
        if p >= 100.0 {
            return last;
        }

        let rank = (p / 100.0) * data.len() as f64;
        let low = rank.floor() as usize;
        let high = rank.ceil() as usize;
        if high >= data.len() {
            return last;
        }
        if low == high {
            return data[low];
        }
        let (lo, hi) = (data[low] as f64, data[high] as f64);
        (lo + (rank - low as f64) * (hi - lo)) as u64
    }

    /// Arithmetic mean, truncated to whole milliseconds.
    pub fn mean(&self) -> u64 {
        self.mean
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// Returns true if no latency was recorded in the window.
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// The standard dashboard percentiles.
    pub fn latencies(&self) -> LatencyPercentiles {
        LatencyPercentiles {
            p0: self.percentile(0.0),
            p25: self.percentile(25.0),
            p50: self.percentile(50.0),
            p75: self.percentile(75.0),
            p90: self.percentile(90.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
            p99_5: self.percentile(99.5),
            p100: self.percentile(100.0),
        }
    }
}

/// Latency distribution as published on the metrics stream.
///
/// Serializes with the percentile as the key, e.g. `{"50": 12, "99.5": 40}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyPercentiles {
    #[serde(rename = "0")]
    pub p0: u64,
    #[serde(rename = "25")]
    pub p25: u64,
    #[serde(rename = "50")]
    pub p50: u64,
    #[serde(rename = "75")]
    pub p75: u64,
    #[serde(rename = "90")]
    pub p90: u64,
    #[serde(rename = "95")]
    pub p95: u64,
    #[serde(rename = "99")]
    pub p99: u64,
    #[serde(rename = "99.5")]
    pub p99_5: u64,
    #[serde(rename = "100")]
    pub p100: u64,
}
