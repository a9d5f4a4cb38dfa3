//! Per-command circuit breaker with rolling health metrics.
//!
//! Each command key owns a [`CircuitBreaker`] and a [`CommandMetrics`]
//! window. The window counts outcomes (success, failure, timeout,
//! rejection, fallback) in time buckets and keeps execution latencies for
//! percentile reporting; the breaker reads its health to decide between
//! three states:
//!
//! - **Closed**: requests flow. Once the window holds at least
//!   `request_volume_threshold` requests and the error percentage reaches
//!   `error_threshold_percentage`, the circuit opens.
//! - **Open**: requests are rejected without running until `sleep_window`
//!   has elapsed.
//! - **Half-open**: exactly one trial request is let through. Success
//!   closes the circuit and clears the window; failure or timeout reopens
//!   it and restarts the sleep window.
//!
//! Two operator flags override the computed state: forced open rejects
//! everything, forced closed lets everything run and suspends opening.
//! Forced open wins when both are set.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower_hystrix_circuitbreaker::{CircuitBreakerConfig, CircuitRegistry};
//!
//! # fn main() -> Result<(), tower_hystrix_core::ConfigurationError> {
//! let registry = Arc::new(CircuitRegistry::new());
//! let config = CircuitBreakerConfig::builder()
//!     .command("inventory.lookup")
//!     .error_threshold_percentage(50)
//!     .request_volume_threshold(20)
//!     .sleep_window(Duration::from_secs(5))
//!     .build()?;
//!
//! let breaker = registry.get_or_create(&config);
//! if let Some(permit) = breaker.try_acquire() {
//!     // run the operation, then report how it went
//!     permit.success(Duration::from_millis(12));
//! } else {
//!     breaker.on_rejection();
//! }
//!
//! let snapshot = registry.snapshot("inventory.lookup").unwrap();
//! assert_eq!(snapshot.rolling_count_success(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Metrics stream
//!
//! [`MetricsPublisher`] periodically broadcasts a `HystrixCommand` JSON
//! record per command, suitable for a Hystrix dashboard.
//!
//! # Feature flags
//!
//! - `metrics`: Prometheus metrics for state transitions and the current state
//! - `tracing`: logs state transitions, rejections and publisher activity

mod circuit;
mod config;
mod events;
mod health;
mod percentile;
mod registry;
mod stream;
mod window;

pub use circuit::{CircuitBreaker, CircuitState, Permit};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
pub use health::{
    CommandMetrics, ExecutionGuard, HealthCounts, MetricsSnapshot, Outcome, RollingCounts,
};
pub use percentile::{LatencyPercentiles, PercentileSnapshot};
pub use registry::CircuitRegistry;
pub use stream::{
    sse_frame, CommandRecord, MetricsPublisher, MetricsPublisherBuilder,
    DEFAULT_PUBLISH_INTERVAL,
};

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "hystrix_circuit_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "hystrix_circuit_state",
            "Current circuit state (0 = closed, 1 = open, 2 = half-open)"
        );
    });
}
