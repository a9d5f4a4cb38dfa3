use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use crate::health::{CommandMetrics, MetricsSnapshot, Outcome};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower_hystrix_core::{CommandKey, GroupKey};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

#[cfg(feature = "tracing")]
use tracing::{debug, info, trace};

/// `opened_at` value while the circuit is closed.
const NOT_OPENED: u64 = u64::MAX;

/// Computed state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed = 0,
    /// Requests are rejected until the sleep window elapses.
    Open = 1,
    /// A single trial request is in flight; everything else is rejected.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Lowercase label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Fault detector for one command key.
///
/// All state lives in atomics so the hot path never takes a lock; the
/// rolling metrics behind it use a per-key mutex. Share it behind an
/// [`Arc`], normally through a [`CircuitRegistry`](crate::CircuitRegistry).
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    metrics: Arc<CommandMetrics>,
    state: AtomicU8,
    origin: Instant,
    /// Milliseconds after `origin` at which the circuit last opened, or
    /// `NOT_OPENED` while closed.
    opened_at: AtomicU64,
    trial_in_flight: AtomicBool,
    forced_open: AtomicBool,
    forced_closed: AtomicBool,
}

impl CircuitBreaker {
    /// Creates a closed breaker with an empty metrics window.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let metrics = Arc::new(CommandMetrics::new(&config));
        let forced_open = AtomicBool::new(config.force_open);
        let forced_closed = AtomicBool::new(config.force_closed);
        Self {
            config,
            metrics,
            state: AtomicU8::new(CircuitState::Closed as u8),
            origin: Instant::now(),
            opened_at: AtomicU64::new(NOT_OPENED),
            trial_in_flight: AtomicBool::new(false),
            forced_open,
            forced_closed,
        }
    }

    /// The command this breaker guards.
    pub fn command(&self) -> &CommandKey {
        &self.config.command
    }

    /// The command's group.
    pub fn group(&self) -> &GroupKey {
        &self.config.group
    }

    /// The configuration the breaker was created with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// The rolling metrics feeding this breaker.
    pub fn metrics(&self) -> &Arc<CommandMetrics> {
        &self.metrics
    }

    /// The computed state, ignoring forced flags.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether requests are currently being denied.
    ///
    /// This is the value reported as `isCircuitBreakerOpen`: true while
    /// forced open, false while forced closed, otherwise true whenever the
    /// computed state is not closed.
    pub fn is_open(&self) -> bool {
        if self.forced_open.load(Ordering::Acquire) {
            return true;
        }
        if self.forced_closed.load(Ordering::Acquire) {
            return false;
        }
        self.state() != CircuitState::Closed
    }

    /// Decides whether a request may run.
    ///
    /// Returns false while open (or forced open) and during a half-open
    /// trial. A `true` while open means the caller is the trial request and
    /// must report its outcome through [`on_success`](Self::on_success),
    /// [`on_failure`](Self::on_failure) or [`on_timeout`](Self::on_timeout).
    /// Callers pair a `false` with [`on_rejection`](Self::on_rejection).
    pub fn allow_request(&self) -> bool {
        self.try_acquire().map(Permit::detach).is_some()
    }

    /// Like [`allow_request`](Self::allow_request), but returns a permit
    /// that settles the outcome and releases an unfinished trial on drop.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        if self.forced_open.load(Ordering::Acquire) {
            return None;
        }
        if self.forced_closed.load(Ordering::Acquire) {
            return Some(self.permit(false));
        }
        match self.state() {
            CircuitState::Closed => Some(self.permit(false)),
            CircuitState::Open => self.try_begin_trial(),
            CircuitState::HalfOpen => None,
        }
    }

    /// Records a successful execution.
    pub fn on_success(&self, latency: Duration) {
        let trial = self.state() == CircuitState::HalfOpen;
        self.settle_success(latency, trial);
    }

    /// Records a failed execution.
    pub fn on_failure(&self, latency: Duration) {
        let trial = self.state() == CircuitState::HalfOpen;
        self.settle_error(Outcome::Failure, latency, trial);
    }

    /// Records an execution that exceeded its timeout.
    pub fn on_timeout(&self, latency: Duration) {
        let trial = self.state() == CircuitState::HalfOpen;
        self.settle_error(Outcome::Timeout, latency, trial);
    }

    /// Records a request denied by [`allow_request`](Self::allow_request).
    pub fn on_rejection(&self) {
        self.metrics.record(Outcome::Rejected, None);
        let forced = self.forced_open.load(Ordering::Acquire);

        #[cfg(feature = "tracing")]
        debug!(
            command = %self.config.command,
            state = self.state().as_str(),
            forced,
            "request rejected by open circuit"
        );

        self.emit(CircuitBreakerEvent::CallRejected {
            command: self.config.command.clone(),
            timestamp: std::time::Instant::now(),
            forced,
        });
    }

    /// Forces every request to be rejected while set.
    ///
    /// Takes precedence over [`force_closed`](Self::force_closed).
    pub fn force_open(&self, forced: bool) {
        self.forced_open.store(forced, Ordering::Release);
        self.announce_forced();
    }

    /// Forces every request to run while set, and suspends failure-driven
    /// opening. Clearing the flag re-evaluates the current window.
    pub fn force_closed(&self, forced: bool) {
        let was = self.forced_closed.swap(forced, Ordering::AcqRel);
        self.announce_forced();
        if was && !forced {
            self.evaluate();
        }
    }

    /// Whether the breaker is forced open.
    pub fn is_forced_open(&self) -> bool {
        self.forced_open.load(Ordering::Acquire)
    }

    /// Whether the breaker is forced closed.
    pub fn is_forced_closed(&self) -> bool {
        self.forced_closed.load(Ordering::Acquire)
    }

    /// Closes the circuit, clears the metrics window and restores the
    /// configured forced flags.
    pub fn reset(&self) {
        self.opened_at.store(NOT_OPENED, Ordering::Release);
        let previous = CircuitState::from_u8(
            self.state
                .swap(CircuitState::Closed as u8, Ordering::AcqRel),
        );
        self.trial_in_flight.store(false, Ordering::Release);
        self.forced_open
            .store(self.config.force_open, Ordering::Release);
        self.forced_closed
            .store(self.config.force_closed, Ordering::Release);
        self.metrics.reset();

        if previous != CircuitState::Closed {
            self.announce(previous, CircuitState::Closed);
        }
    }

    /// Current health, consistent with [`is_open`](Self::is_open).
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::capture(&self.metrics, self.is_open())
    }

    fn permit(&self, trial: bool) -> Permit<'_> {
        #[cfg(feature = "tracing")]
        trace!(command = %self.config.command, trial, "request permitted");

        if !self.config.event_listeners.is_empty() {
            self.emit(CircuitBreakerEvent::CallPermitted {
                command: self.config.command.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state(),
                trial,
            });
        }

        Permit {
            breaker: self,
            trial,
            settled: false,
        }
    }

    fn now_millis(&self) -> u64 {
        Instant::now()
            .saturating_duration_since(self.origin)
            .as_millis() as u64
    }

    fn sleep_window_elapsed(&self) -> bool {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        if opened_at == NOT_OPENED {
            return false;
        }
        self.now_millis().saturating_sub(opened_at) >= self.config.sleep_window.as_millis() as u64
    }

    fn try_begin_trial(&self) -> Option<Permit<'_>> {
        if !self.sleep_window_elapsed() {
            return None;
        }
        if self
            .trial_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        if !self.transition(CircuitState::Open, CircuitState::HalfOpen) {
            // Reset or closed underneath us.
            self.trial_in_flight.store(false, Ordering::Release);
            return None;
        }
        Some(self.permit(true))
    }

    fn settle_success(&self, latency: Duration, trial: bool) {
        self.metrics.record(Outcome::Success, Some(latency));
        if trial {
            self.opened_at.store(NOT_OPENED, Ordering::Release);
            if self.transition(CircuitState::HalfOpen, CircuitState::Closed) {
                self.metrics.reset();
            }
            self.trial_in_flight.store(false, Ordering::Release);
        }
    }

    fn settle_error(&self, outcome: Outcome, latency: Duration, trial: bool) {
        self.metrics.record(outcome, Some(latency));
        if trial {
            self.opened_at.store(self.now_millis(), Ordering::Release);
            self.transition(CircuitState::HalfOpen, CircuitState::Open);
            self.trial_in_flight.store(false, Ordering::Release);
        } else {
            self.evaluate();
        }
    }

    /// Releases a trial whose outcome will never be reported. The
    /// open timestamp is kept so the next request may probe immediately.
    fn abandon_trial(&self) {
        self.transition(CircuitState::HalfOpen, CircuitState::Open);
        self.trial_in_flight.store(false, Ordering::Release);
    }

    /// Opens a closed circuit whose window crossed both thresholds.
    fn evaluate(&self) {
        if self.forced_closed.load(Ordering::Acquire) || self.state() != CircuitState::Closed {
            return;
        }
        let health = self.metrics.health_counts();
        if health.total < self.config.request_volume_threshold
            || health.error_percentage < self.config.error_threshold_percentage
        {
            return;
        }

        // Only the evaluation that wins the swap stamps the opening. Until
        // then readers see `NOT_OPENED` and refuse the trial.
        let opened = self
            .state
            .compare_exchange(
                CircuitState::Closed as u8,
                CircuitState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if opened {
            self.opened_at.store(self.now_millis(), Ordering::Release);
            self.announce(CircuitState::Closed, CircuitState::Open);
            #[cfg(feature = "tracing")]
            info!(
                command = %self.config.command,
                error_percentage = health.error_percentage,
                requests = health.total,
                "circuit opened"
            );
        }
    }

    fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        let swapped = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            self.announce(from, to);
        }
        swapped
    }

    fn announce(&self, from: CircuitState, to: CircuitState) {
        #[cfg(feature = "tracing")]
        info!(
            command = %self.config.command,
            from = from.as_str(),
            to = to.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "hystrix_circuit_transitions_total",
                "command" => self.config.command.to_string(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("hystrix_circuit_state", "command" => self.config.command.to_string())
                .set(to as u8 as f64);
        }

        self.emit(CircuitBreakerEvent::StateTransition {
            command: self.config.command.clone(),
            timestamp: std::time::Instant::now(),
            from_state: from,
            to_state: to,
        });
    }

    fn announce_forced(&self) {
        let forced_open = self.is_forced_open();
        let forced_closed = self.is_forced_closed();

        #[cfg(feature = "tracing")]
        info!(
            command = %self.config.command,
            forced_open,
            forced_closed,
            "forced circuit flags changed"
        );

        self.emit(CircuitBreakerEvent::ForcedStateChanged {
            command: self.config.command.clone(),
            timestamp: std::time::Instant::now(),
            forced_open,
            forced_closed,
        });
    }

    fn emit(&self, event: CircuitBreakerEvent) {
        self.config.event_listeners.emit(&event);
    }
}

/// Permission to run one request.
///
/// Settle it with [`success`](Self::success), [`failure`](Self::failure) or
/// [`timeout`](Self::timeout). Dropping an unsettled trial permit puts the
/// circuit back to open so another request can probe.
#[must_use = "the outcome must be reported through the permit"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Whether this is the half-open trial request.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Reports a successful execution.
    pub fn success(mut self, latency: Duration) {
        self.settled = true;
        self.breaker.settle_success(latency, self.trial);
    }

    /// Reports a failed execution.
    pub fn failure(mut self, latency: Duration) {
        self.settled = true;
        self.breaker
            .settle_error(Outcome::Failure, latency, self.trial);
    }

    /// Reports an execution that ran past its timeout.
    pub fn timeout(mut self, latency: Duration) {
        self.settled = true;
        self.breaker
            .settle_error(Outcome::Timeout, latency, self.trial);
    }

    fn detach(mut self) {
        self.settled = true;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.abandon_trial();
        }
    }
}
