//! Rolling health metrics for a single command.

use crate::config::CircuitBreakerConfig;
use crate::percentile::{LatencyPercentiles, PercentileSnapshot, RollingPercentile};
use crate::window::{BucketClock, BucketRing};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tower_hystrix_core::{CommandKey, GroupKey};

/// Outcome of one request, as counted by the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed.
    Failure,
    /// The operation did not complete before the timeout.
    Timeout,
    /// The breaker denied the request.
    Rejected,
    /// The command was already running its maximum number of executions.
    SemaphoreRejected,
    /// A fallback produced a value.
    FallbackSuccess,
    /// A fallback failed.
    FallbackFailure,
}

impl Outcome {
    const COUNT: usize = 7;

    /// Every outcome, in a stable order.
    pub const ALL: [Outcome; Outcome::COUNT] = [
        Outcome::Success,
        Outcome::Failure,
        Outcome::Timeout,
        Outcome::Rejected,
        Outcome::SemaphoreRejected,
        Outcome::FallbackSuccess,
        Outcome::FallbackFailure,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    /// Label used for logs and Prometheus metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::Rejected => "short_circuited",
            Outcome::SemaphoreRejected => "semaphore_rejected",
            Outcome::FallbackSuccess => "fallback_success",
            Outcome::FallbackFailure => "fallback_failure",
        }
    }
}

/// Per-outcome sums over the visible window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingCounts {
    counts: [u64; Outcome::COUNT],
}

impl RollingCounts {
    /// Sum for one outcome.
    pub fn get(&self, outcome: Outcome) -> u64 {
        self.counts[outcome.slot()]
    }

    /// Health derived from these counts.
    pub fn health(&self) -> HealthCounts {
        let errors = self.get(Outcome::Failure) + self.get(Outcome::Timeout);
        let total = self.get(Outcome::Success) + errors;
        let error_percentage = if total == 0 {
            0
        } else {
            (errors * 100 / total) as u32
        };
        HealthCounts {
            total,
            errors,
            error_percentage,
        }
    }
}

/// Inputs to the open/closed decision.
///
/// Failures and timeouts are errors; rejected requests never ran and are
/// not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCounts {
    /// Completed requests (successes plus errors).
    pub total: u64,
    /// Failed or timed-out requests.
    pub errors: u64,
    /// `errors / total` as a whole percentage; 0 when `total` is 0.
    pub error_percentage: u32,
}

#[derive(Debug)]
struct RollingNumber {
    clock: BucketClock,
    ring: Mutex<BucketRing<RollingCounts>>,
}

impl RollingNumber {
    fn new(window: Duration, buckets: usize) -> Self {
        Self {
            clock: BucketClock::new(window, buckets),
            ring: Mutex::new(BucketRing::new(buckets)),
        }
    }

    fn increment(&self, outcome: Outcome) {
        let index = self.clock.current();
        self.ring.lock().current(index).counts[outcome.slot()] += 1;
    }

    fn sums(&self) -> RollingCounts {
        let index = self.clock.current();
        let mut ring = self.ring.lock();
        ring.visible(index)
            .fold(RollingCounts::default(), |mut acc, bucket| {
                for (sum, count) in acc.counts.iter_mut().zip(bucket.counts.iter()) {
                    *sum += count;
                }
                acc
            })
    }

    fn reset(&self) {
        self.ring.lock().clear();
    }
}

/// Rolling counters and latency distribution for one command key.
///
/// Each key has its own locks, so requests for different commands never
/// contend and the critical sections are a handful of integer operations.
#[derive(Debug)]
pub struct CommandMetrics {
    command: CommandKey,
    group: GroupKey,
    counter: RollingNumber,
    latency: RollingPercentile,
    concurrent: AtomicU64,
}

impl CommandMetrics {
    /// Creates an empty window shaped by `config`.
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            command: config.command.clone(),
            group: config.group.clone(),
            counter: RollingNumber::new(
                config.statistical_window,
                config.statistical_window_buckets,
            ),
            latency: RollingPercentile::new(
                config.statistical_window,
                config.statistical_window_buckets,
                config.percentile_bucket_size,
            ),
            concurrent: AtomicU64::new(0),
        }
    }

    /// The command these metrics belong to.
    pub fn command(&self) -> &CommandKey {
        &self.command
    }

    /// The command's group.
    pub fn group(&self) -> &GroupKey {
        &self.group
    }

    /// Counts `outcome` in the current bucket.
    ///
    /// `latency` is added to the percentile window for executed requests.
    pub fn record(&self, outcome: Outcome, latency: Option<Duration>) {
        self.counter.increment(outcome);
        if let Some(latency) = latency {
            self.latency.add(latency);
        }
    }

    /// Sums over the visible window.
    pub fn counts(&self) -> RollingCounts {
        self.counter.sums()
    }

    /// Sum for a single outcome over the visible window.
    pub fn rolling_count(&self, outcome: Outcome) -> u64 {
        self.counts().get(outcome)
    }

    /// Health over the visible window.
    pub fn health_counts(&self) -> HealthCounts {
        self.counts().health()
    }

    /// Latency samples over the visible window.
    pub fn latency(&self) -> PercentileSnapshot {
        self.latency.snapshot()
    }

    /// Number of executions currently running.
    pub fn concurrent_executions(&self) -> u64 {
        self.concurrent.load(Ordering::Acquire)
    }

    /// Marks an execution as running until the guard is dropped.
    pub fn begin_execution(&self) -> ExecutionGuard<'_> {
        self.concurrent.fetch_add(1, Ordering::AcqRel);
        ExecutionGuard { metrics: self }
    }

    /// Discards every bucket.
    pub fn reset(&self) {
        self.counter.reset();
        self.latency.reset();
    }
}

/// Decrements the running-execution count on drop.
#[derive(Debug)]
pub struct ExecutionGuard<'a> {
    metrics: &'a CommandMetrics,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.metrics.concurrent.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Point-in-time view of a command's health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Command key.
    pub command: CommandKey,
    /// Command group.
    pub group: GroupKey,
    /// Successes plus errors in the window.
    pub request_count: u64,
    /// Failures plus timeouts in the window.
    pub error_count: u64,
    /// Whole-percent error rate.
    pub error_percentage: u32,
    /// Per-outcome sums.
    pub counts: RollingCounts,
    /// Whether the breaker currently denies requests.
    pub is_circuit_breaker_open: bool,
    /// Executions in flight when the snapshot was taken.
    pub concurrent_executions: u64,
    /// Execution latency distribution.
    pub latency: PercentileSnapshot,
}

impl MetricsSnapshot {
    pub(crate) fn capture(metrics: &CommandMetrics, is_circuit_breaker_open: bool) -> Self {
        let counts = metrics.counts();
        let health = counts.health();
        Self {
            command: metrics.command.clone(),
            group: metrics.group.clone(),
            request_count: health.total,
            error_count: health.errors,
            error_percentage: health.error_percentage,
            counts,
            is_circuit_breaker_open,
            concurrent_executions: metrics.concurrent_executions(),
            latency: metrics.latency(),
        }
    }

    /// Successes in the window.
    pub fn rolling_count_success(&self) -> u64 {
        self.counts.get(Outcome::Success)
    }

    /// Failures in the window.
    pub fn rolling_count_failure(&self) -> u64 {
        self.counts.get(Outcome::Failure)
    }

    /// Dashboard percentiles of execution latency.
    pub fn latency_percentiles(&self) -> LatencyPercentiles {
        self.latency.latencies()
    }
}
