//! Periodic publication of command health in the Hystrix dashboard format.
//!
//! A [`MetricsPublisher`] walks a [`CircuitRegistry`] on a fixed interval
//! and broadcasts one JSON record per command on a
//! [`tokio::sync::broadcast`] channel. Whatever serves the dashboard
//! stream subscribes to that channel; [`sse_frame`] wraps a record for a
//! `text/event-stream` response.

use crate::circuit::CircuitBreaker;
use crate::health::Outcome;
use crate::percentile::LatencyPercentiles;
use crate::registry::CircuitRegistry;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_hystrix_core::ConfigurationError;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Default time between two publications.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// One command's health, shaped like a Hystrix `HystrixCommand` stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub group: String,
    pub current_time: u64,
    pub is_circuit_breaker_open: bool,
    pub error_percentage: u32,
    pub error_count: u64,
    pub request_count: u64,
    pub rolling_count_success: u64,
    pub rolling_count_failure: u64,
    pub rolling_count_timeout: u64,
    pub rolling_count_short_circuited: u64,
    pub rolling_count_semaphore_rejected: u64,
    pub rolling_count_fallback_success: u64,
    pub rolling_count_fallback_failure: u64,
    pub current_concurrent_execution_count: u64,
    #[serde(rename = "latencyExecute_mean")]
    pub latency_execute_mean: u64,
    pub latency_execute: LatencyPercentiles,
    #[serde(rename = "propertyValue_circuitBreakerRequestVolumeThreshold")]
    pub property_request_volume_threshold: u64,
    #[serde(rename = "propertyValue_circuitBreakerSleepWindowInMilliseconds")]
    pub property_sleep_window_ms: u64,
    #[serde(rename = "propertyValue_circuitBreakerErrorThresholdPercentage")]
    pub property_error_threshold_percentage: u32,
    #[serde(rename = "propertyValue_circuitBreakerForceOpen")]
    pub property_force_open: bool,
    #[serde(rename = "propertyValue_circuitBreakerForceClosed")]
    pub property_force_closed: bool,
    #[serde(rename = "propertyValue_metricsRollingStatisticalWindowInMilliseconds")]
    pub property_statistical_window_ms: u64,
    pub reporting_hosts: u32,
}

impl CommandRecord {
    /// Captures the current state of `breaker`.
    pub fn capture(breaker: &CircuitBreaker) -> Self {
        let snapshot = breaker.snapshot();
        let config = breaker.config();
        let current_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            kind: "HystrixCommand",
            name: snapshot.command.to_string(),
            group: snapshot.group.to_string(),
            current_time,
            is_circuit_breaker_open: snapshot.is_circuit_breaker_open,
            error_percentage: snapshot.error_percentage,
            error_count: snapshot.error_count,
            request_count: snapshot.request_count,
            rolling_count_success: snapshot.counts.get(Outcome::Success),
            rolling_count_failure: snapshot.counts.get(Outcome::Failure),
            rolling_count_timeout: snapshot.counts.get(Outcome::Timeout),
            rolling_count_short_circuited: snapshot.counts.get(Outcome::Rejected),
            rolling_count_semaphore_rejected: snapshot.counts.get(Outcome::SemaphoreRejected),
            rolling_count_fallback_success: snapshot.counts.get(Outcome::FallbackSuccess),
            rolling_count_fallback_failure: snapshot.counts.get(Outcome::FallbackFailure),
            current_concurrent_execution_count: snapshot.concurrent_executions,
            latency_execute_mean: snapshot.latency.mean(),
            latency_execute: snapshot.latency_percentiles(),
            property_request_volume_threshold: config.request_volume_threshold(),
            property_sleep_window_ms: config.sleep_window().as_millis() as u64,
            property_error_threshold_percentage: config.error_threshold_percentage(),
            property_force_open: breaker.is_forced_open(),
            property_force_closed: breaker.is_forced_closed(),
            property_statistical_window_ms: config.statistical_window().as_millis() as u64,
            reporting_hosts: 1,
        }
    }

    /// Serializes the record as a JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Wraps a serialized record in a server-sent-events frame.
pub fn sse_frame(record: &str) -> String {
    format!("data: {record}\n\n")
}

/// Broadcasts [`CommandRecord`]s for every registered command.
///
/// Publishing runs on a spawned tokio task started by
/// [`start`](Self::start); it stops on [`stop`](Self::stop) or when the
/// publisher is dropped.
#[derive(Debug)]
pub struct MetricsPublisher {
    registry: Arc<CircuitRegistry>,
    interval: Duration,
    sender: broadcast::Sender<Arc<str>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsPublisher {
    /// Creates a builder for a publisher over `registry`.
    pub fn builder(registry: Arc<CircuitRegistry>) -> MetricsPublisherBuilder {
        MetricsPublisherBuilder {
            registry,
            interval: DEFAULT_PUBLISH_INTERVAL,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Creates a publisher with the default interval.
    pub fn new(registry: Arc<CircuitRegistry>) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            registry,
            interval: DEFAULT_PUBLISH_INTERVAL,
            sender,
            task: Mutex::new(None),
        }
    }

    /// Subscribes to serialized records.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.sender.subscribe()
    }

    /// Time between publications.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Publishes one record per registered command right now and returns
    /// how many were sent.
    pub fn publish(&self) -> usize {
        publish_once(&self.registry, &self.sender)
    }

    /// Starts periodic publication. Does nothing if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let sender = self.sender.clone();
        let period = self.interval;

        #[cfg(feature = "tracing")]
        debug!(interval_ms = period.as_millis() as u64, "starting metrics publisher");

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; publish a full period later.
            interval.tick().await;
            loop {
                interval.tick().await;
                publish_once(&registry, &sender);
            }
        }));
    }

    /// Stops periodic publication.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    /// Whether the periodic task is running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for MetricsPublisher {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Builder for [`MetricsPublisher`].
#[derive(Debug)]
pub struct MetricsPublisherBuilder {
    registry: Arc<CircuitRegistry>,
    interval: Duration,
    capacity: usize,
}

impl MetricsPublisherBuilder {
    /// Sets the time between publications.
    ///
    /// Default: 1 second
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how many records a slow subscriber may lag behind before it
    /// starts missing them.
    ///
    /// Default: 1024
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builds the publisher. Nothing is published until it is started.
    pub fn build(self) -> Result<MetricsPublisher, ConfigurationError> {
        if self.interval.is_zero() {
            return Err(ConfigurationError::invalid(
                "interval",
                "publish interval must be non-zero",
            ));
        }
        if self.capacity == 0 {
            return Err(ConfigurationError::invalid(
                "capacity",
                "channel capacity must be non-zero",
            ));
        }
        let (sender, _) = broadcast::channel(self.capacity);
        Ok(MetricsPublisher {
            registry: self.registry,
            interval: self.interval,
            sender,
            task: Mutex::new(None),
        })
    }
}

fn publish_once(registry: &CircuitRegistry, sender: &broadcast::Sender<Arc<str>>) -> usize {
    let mut published = 0;
    for breaker in registry.breakers() {
        match CommandRecord::capture(&breaker).to_json() {
            Ok(json) => {
                // No subscribers is not an error; the record is simply dropped.
                let _ = sender.send(Arc::from(json));
                published += 1;
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                warn!(command = %breaker.command(), error = %_err, "failed to serialize command metrics");
            }
        }
    }
    published
}
