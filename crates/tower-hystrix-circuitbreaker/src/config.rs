use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use std::time::Duration;
use tower_hystrix_core::{CommandKey, ConfigurationError, EventListeners, FnListener, GroupKey};

/// Configuration for one command's circuit breaker and its rolling metrics.
///
/// Built once per command key and never mutated afterwards; the forced
/// flags here are only the initial values, the live flags are on the
/// [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) command: CommandKey,
    pub(crate) group: GroupKey,
    pub(crate) error_threshold_percentage: u32,
    pub(crate) request_volume_threshold: u64,
    pub(crate) sleep_window: Duration,
    pub(crate) force_open: bool,
    pub(crate) force_closed: bool,
    pub(crate) statistical_window: Duration,
    pub(crate) statistical_window_buckets: usize,
    pub(crate) percentile_bucket_size: usize,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        crate::describe_metrics();
        CircuitBreakerConfigBuilder::new()
    }

    /// The command this breaker guards.
    pub fn command(&self) -> &CommandKey {
        &self.command
    }

    /// The command's group.
    pub fn group(&self) -> &GroupKey {
        &self.group
    }

    /// Error percentage at or above which the circuit opens.
    pub fn error_threshold_percentage(&self) -> u32 {
        self.error_threshold_percentage
    }

    /// Minimum requests in the window before the error percentage is considered.
    pub fn request_volume_threshold(&self) -> u64 {
        self.request_volume_threshold
    }

    /// How long the circuit stays open before a trial request is allowed.
    pub fn sleep_window(&self) -> Duration {
        self.sleep_window
    }

    /// Length of the rolling statistical window.
    pub fn statistical_window(&self) -> Duration {
        self.statistical_window
    }

    /// Number of buckets the statistical window is split into.
    pub fn statistical_window_buckets(&self) -> usize {
        self.statistical_window_buckets
    }

    /// Returns a copy bound to a different command.
    ///
    /// Listeners and thresholds are shared with `self`.
    pub fn with_command(&self, command: CommandKey, group: Option<GroupKey>) -> Self {
        let mut config = self.clone();
        config.command = command;
        if let Some(group) = group {
            config.group = group;
        }
        config
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    command: Option<CommandKey>,
    group: Option<GroupKey>,
    error_threshold_percentage: u32,
    request_volume_threshold: u64,
    sleep_window: Duration,
    force_open: bool,
    force_closed: bool,
    statistical_window: Duration,
    statistical_window_buckets: usize,
    percentile_bucket_size: usize,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            command: None,
            group: None,
            error_threshold_percentage: 50,
            request_volume_threshold: 10,
            sleep_window: Duration::from_millis(3000),
            force_open: false,
            force_closed: false,
            statistical_window: Duration::from_millis(10_000),
            statistical_window_buckets: 10,
            percentile_bucket_size: 100,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the command key. Required.
    pub fn command<K: Into<CommandKey>>(mut self, command: K) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Sets the group used to organize the command on dashboards.
    ///
    /// Default: `"hystrix"`
    pub fn group<G: Into<GroupKey>>(mut self, group: G) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the error percentage at which the circuit opens.
    ///
    /// Must be between 0 and 100.
    ///
    /// Default: 50
    pub fn error_threshold_percentage(mut self, percentage: u32) -> Self {
        self.error_threshold_percentage = percentage;
        self
    }

    /// Sets the minimum number of requests in the rolling window before
    /// the error percentage can open the circuit.
    ///
    /// Default: 10
    pub fn request_volume_threshold(mut self, volume: u64) -> Self {
        self.request_volume_threshold = volume;
        self
    }

    /// Sets how long the circuit stays open before allowing one trial request.
    ///
    /// Default: 3 seconds
    pub fn sleep_window(mut self, window: Duration) -> Self {
        self.sleep_window = window;
        self
    }

    /// Starts the breaker forced open.
    ///
    /// Default: false
    pub fn force_open(mut self, forced: bool) -> Self {
        self.force_open = forced;
        self
    }

    /// Starts the breaker forced closed.
    ///
    /// Default: false
    pub fn force_closed(mut self, forced: bool) -> Self {
        self.force_closed = forced;
        self
    }

    /// Sets the rolling statistical window and its bucket count.
    ///
    /// The window length in milliseconds must divide evenly by `buckets`.
    ///
    /// Default: 10 seconds in 10 buckets
    pub fn statistical_window(mut self, window: Duration, buckets: usize) -> Self {
        self.statistical_window = window;
        self.statistical_window_buckets = buckets;
        self
    }

    /// Sets how many latency samples each bucket keeps.
    ///
    /// Default: 100
    pub fn percentile_bucket_size(mut self, size: usize) -> Self {
        self.percentile_bucket_size = size;
        self
    }

    /// Registers a callback invoked on every state transition with
    /// `(from, to)`.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback invoked when a request is rejected because the
    /// circuit is open or forced open.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a listener for every breaker event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigurationError> {
        let command = self.command.ok_or(ConfigurationError::MissingCommand)?;
        if command.as_str().is_empty() {
            return Err(ConfigurationError::MissingCommand);
        }

        if self.error_threshold_percentage > 100 {
            return Err(ConfigurationError::invalid(
                "error_threshold_percentage",
                format!("{} is above 100", self.error_threshold_percentage),
            ));
        }
        if self.statistical_window_buckets == 0 {
            return Err(ConfigurationError::invalid(
                "statistical_window_buckets",
                "at least one bucket is required",
            ));
        }
        let window_ms = self.statistical_window.as_millis();
        if window_ms == 0 {
            return Err(ConfigurationError::invalid(
                "statistical_window",
                "window must be at least one millisecond",
            ));
        }
        if window_ms % self.statistical_window_buckets as u128 != 0 {
            return Err(ConfigurationError::invalid(
                "statistical_window",
                format!(
                    "{window_ms}ms does not divide evenly into {} buckets",
                    self.statistical_window_buckets
                ),
            ));
        }
        if self.percentile_bucket_size == 0 {
            return Err(ConfigurationError::invalid(
                "percentile_bucket_size",
                "buckets must hold at least one sample",
            ));
        }

        Ok(CircuitBreakerConfig {
            command,
            group: self.group.unwrap_or_default(),
            error_threshold_percentage: self.error_threshold_percentage,
            request_volume_threshold: self.request_volume_threshold,
            sleep_window: self.sleep_window,
            force_open: self.force_open,
            force_closed: self.force_closed,
            statistical_window: self.statistical_window,
            statistical_window_buckets: self.statistical_window_buckets,
            percentile_bucket_size: self.percentile_bucket_size,
            event_listeners: self.event_listeners,
        })
    }
}
