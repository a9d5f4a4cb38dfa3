use crate::error::CommandError;
use crate::events::CommandEvent;
use crate::fallback::Fallback;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_hystrix_circuitbreaker::{
    CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerEvent, CircuitState,
};
use tower_hystrix_core::{CommandKey, ConfigurationError, EventListeners, FnListener, GroupKey};

pub(crate) type ErrorClassifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Configuration for one guarded command.
///
/// Captured once when the command is registered. A
/// [`CommandRegistry`](crate::CommandRegistry) ignores every later
/// configuration supplied for the same key.
pub struct CommandConfig<Req, Res, E> {
    pub(crate) circuit: CircuitBreakerConfig,
    pub(crate) timeout: Duration,
    pub(crate) fallback: Option<Fallback<Req, Res, E>>,
    pub(crate) error_classifier: Option<ErrorClassifier<E>>,
    pub(crate) max_concurrent: Option<usize>,
    pub(crate) event_listeners: EventListeners<CommandEvent>,
}

impl<Req, Res, E> CommandConfig<Req, Res, E> {
    /// Creates a new configuration builder.
    pub fn builder() -> CommandConfigBuilder<Req, Res, E> {
        crate::describe_metrics();
        CommandConfigBuilder::new()
    }

    /// The command key.
    pub fn command(&self) -> &CommandKey {
        self.circuit.command()
    }

    /// The command's group.
    pub fn group(&self) -> &GroupKey {
        self.circuit.group()
    }

    /// Breaker and rolling window settings.
    pub fn circuit(&self) -> &CircuitBreakerConfig {
        &self.circuit
    }

    /// How long an execution may run before it is abandoned.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The fallback, if one was configured.
    pub fn fallback(&self) -> Option<&Fallback<Req, Res, E>> {
        self.fallback.as_ref()
    }

    /// Maximum concurrent executions, if capped.
    pub fn max_concurrent(&self) -> Option<usize> {
        self.max_concurrent
    }

    /// Returns a copy bound to a different command key.
    ///
    /// Used when a request names its own command: the new key gets the same
    /// settings, and `group` replaces the group when given.
    pub fn with_command(&self, command: CommandKey, group: Option<GroupKey>) -> Self {
        let mut config = self.clone();
        config.circuit = self.circuit.with_command(command, group);
        config
    }

    pub(crate) fn counts_as_failure(&self, error: &E) -> bool {
        self.error_classifier
            .as_ref()
            .map_or(true, |classify| classify(error))
    }
}

impl<Req, Res, E> Clone for CommandConfig<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            circuit: self.circuit.clone(),
            timeout: self.timeout,
            fallback: self.fallback.clone(),
            error_classifier: self.error_classifier.clone(),
            max_concurrent: self.max_concurrent,
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl<Req, Res, E> fmt::Debug for CommandConfig<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandConfig")
            .field("circuit", &self.circuit)
            .field("timeout", &self.timeout)
            .field("fallback", &self.fallback.is_some())
            .field("max_concurrent", &self.max_concurrent)
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for [`CommandConfig`].
pub struct CommandConfigBuilder<Req, Res, E> {
    circuit: CircuitBreakerConfigBuilder,
    timeout: Duration,
    fallback: Option<Fallback<Req, Res, E>>,
    error_classifier: Option<ErrorClassifier<E>>,
    max_concurrent: Option<usize>,
    event_listeners: EventListeners<CommandEvent>,
}

impl<Req, Res, E> Default for CommandConfigBuilder<Req, Res, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res, E> CommandConfigBuilder<Req, Res, E> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            circuit: CircuitBreakerConfigBuilder::new(),
            timeout: Duration::from_secs(30),
            fallback: None,
            error_classifier: None,
            max_concurrent: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the command key. Required.
    pub fn command<K: Into<CommandKey>>(mut self, command: K) -> Self {
        self.circuit = self.circuit.command(command);
        self
    }

    /// Sets the group used to organize the command on dashboards.
    ///
    /// Default: `"hystrix"`
    pub fn group<G: Into<GroupKey>>(mut self, group: G) -> Self {
        self.circuit = self.circuit.group(group);
        self
    }

    /// Sets how long an execution may run before it counts as a timeout.
    ///
    /// Default: 30 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the error percentage at which the circuit opens.
    ///
    /// Default: 50
    pub fn error_threshold_percentage(mut self, percentage: u32) -> Self {
        self.circuit = self.circuit.error_threshold_percentage(percentage);
        self
    }

    /// Sets the minimum number of requests in the rolling window before
    /// the circuit may open.
    ///
    /// Default: 10
    pub fn request_volume_threshold(mut self, volume: u64) -> Self {
        self.circuit = self.circuit.request_volume_threshold(volume);
        self
    }

    /// Sets how long the circuit stays open before a trial request.
    ///
    /// Default: 3 seconds
    pub fn sleep_window(mut self, window: Duration) -> Self {
        self.circuit = self.circuit.sleep_window(window);
        self
    }

    /// Starts the circuit forced open.
    ///
    /// Default: false
    pub fn force_open(mut self, forced: bool) -> Self {
        self.circuit = self.circuit.force_open(forced);
        self
    }

    /// Starts the circuit forced closed.
    ///
    /// Default: false
    pub fn force_closed(mut self, forced: bool) -> Self {
        self.circuit = self.circuit.force_closed(forced);
        self
    }

    /// Sets the rolling statistical window and its bucket count.
    ///
    /// Default: 10 seconds in 10 buckets
    pub fn statistical_window(mut self, window: Duration, buckets: usize) -> Self {
        self.circuit = self.circuit.statistical_window(window, buckets);
        self
    }

    /// Sets how many latency samples each bucket keeps.
    ///
    /// Default: 100
    pub fn percentile_bucket_size(mut self, size: usize) -> Self {
        self.circuit = self.circuit.percentile_bucket_size(size);
        self
    }

    /// Caps the number of executions running at once. Requests over the cap
    /// fail with [`CommandError::Rejected`] and go through fallback
    /// resolution.
    ///
    /// Default: unlimited
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }

    /// Sets the fallback used when the command is denied, times out or fails.
    ///
    /// Default: none
    pub fn fallback(mut self, fallback: Fallback<Req, Res, E>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Sets an async fallback function.
    pub fn fallback_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(CommandError<E>, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
        Req: Send + 'static,
        Res: Send + 'static,
        E: Send + 'static,
    {
        self.fallback(Fallback::new(f))
    }

    /// Decides which downstream errors count against the circuit.
    ///
    /// Errors for which the classifier returns false are recorded as
    /// successes and returned as-is, without a fallback.
    ///
    /// Default: every error counts
    pub fn error_classifier<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.error_classifier = Some(Arc::new(f));
        self
    }

    /// Registers a callback invoked on every circuit state transition.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.circuit = self.circuit.on_state_transition(f);
        self
    }

    /// Registers a listener for every circuit breaker event.
    pub fn on_circuit_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.circuit = self.circuit.on_event(f);
        self
    }

    /// Registers a callback invoked with the duration of each successful
    /// execution.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CommandEvent| {
                if let CommandEvent::Success { duration, .. } = event {
                    f(*duration);
                }
            }));
        self
    }

    /// Registers a callback invoked with the duration of each failed
    /// execution.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CommandEvent| {
                if let CommandEvent::Failure { duration, .. } = event {
                    f(*duration);
                }
            }));
        self
    }

    /// Registers a callback invoked when an execution times out.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CommandEvent| {
                if matches!(event, CommandEvent::Timeout { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback invoked when the circuit or the concurrency cap
    /// denies a request.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CommandEvent| {
                if matches!(
                    event,
                    CommandEvent::ShortCircuited { .. } | CommandEvent::SemaphoreRejected { .. }
                ) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback invoked after each fallback with whether it
    /// produced a value.
    pub fn on_fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CommandEvent| match event {
                CommandEvent::FallbackSuccess { .. } => f(true),
                CommandEvent::FallbackFailure { .. } => f(false),
                _ => {}
            }));
        self
    }

    /// Registers a listener for every command event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Validates the settings and builds the configuration.
    ///
    /// Fails with [`ConfigurationError::MissingCommand`] when no command key
    /// was given.
    pub fn build(self) -> Result<CommandConfig<Req, Res, E>, ConfigurationError> {
        let circuit = self.circuit.build()?;

        if self.timeout.is_zero() {
            return Err(ConfigurationError::invalid(
                "timeout",
                "timeout must be greater than zero",
            ));
        }
        if self.max_concurrent == Some(0) {
            return Err(ConfigurationError::invalid(
                "max_concurrent",
                "at least one concurrent execution is required",
            ));
        }

        Ok(CommandConfig {
            circuit,
            timeout: self.timeout,
            fallback: self.fallback,
            error_classifier: self.error_classifier,
            max_concurrent: self.max_concurrent,
            event_listeners: self.event_listeners,
        })
    }
}
