use crate::config::CommandConfig;
use crate::error::CommandError;
use crate::events::CommandEvent;
use crate::fallback::Fallback;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use tower_hystrix_circuitbreaker::{CircuitBreaker, MetricsSnapshot, Outcome};
use tower_hystrix_core::{CommandKey, GroupKey};

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

#[cfg(feature = "tracing")]
use tracing::debug;

/// A circuit breaker, timeout and fallback around caller-supplied work.
///
/// One instance exists per command key, normally obtained from a
/// [`CommandRegistry`](crate::CommandRegistry). Any number of requests may
/// execute through it concurrently.
pub struct GuardedCommand<Req, Res, E> {
    config: CommandConfig<Req, Res, E>,
    breaker: Arc<CircuitBreaker>,
    semaphore: Option<Arc<Semaphore>>,
}

impl<Req, Res, E> GuardedCommand<Req, Res, E> {
    /// Creates a standalone command with its own circuit breaker.
    pub fn new(config: CommandConfig<Req, Res, E>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.circuit.clone()));
        Self::with_breaker(config, breaker)
    }

    pub(crate) fn with_breaker(
        config: CommandConfig<Req, Res, E>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let semaphore = config
            .max_concurrent
            .map(|max| Arc::new(Semaphore::new(max)));
        Self {
            config,
            breaker,
            semaphore,
        }
    }

    /// The command key.
    pub fn command(&self) -> &CommandKey {
        self.config.command()
    }

    /// The command's group.
    pub fn group(&self) -> &GroupKey {
        self.config.group()
    }

    /// The configuration captured at registration.
    pub fn config(&self) -> &CommandConfig<Req, Res, E> {
        &self.config
    }

    /// The breaker guarding this command.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Whether requests are currently being denied.
    pub fn is_circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Current health of the command.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.breaker.snapshot()
    }

    /// Runs `task` under the breaker and timeout, falling back to the
    /// configured fallback on denial, timeout or failure.
    ///
    /// `request` is only used to call the fallback; `task` is never invoked
    /// when the circuit denies the request.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tower_hystrix_command::{CommandConfig, GuardedCommand};
    ///
    /// # async fn example() {
    /// let config = CommandConfig::<String, String, String>::builder()
    ///     .command("echo")
    ///     .timeout(Duration::from_millis(500))
    ///     .fallback_fn(|_err, req| async move { Ok(format!("cached {req}")) })
    ///     .build()
    ///     .unwrap();
    /// let command = GuardedCommand::new(config);
    ///
    /// let reply = command
    ///     .execute("hello".to_string(), || async { Ok("hello".to_string()) })
    ///     .await;
    /// assert_eq!(reply.unwrap(), "hello");
    /// # }
    /// ```
    pub async fn execute<F, Fut>(&self, request: Req, task: F) -> Result<Res, CommandError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Res, E>>,
    {
        self.execute_with(request, task, |configured| configured.cloned())
            .await
    }

    /// Like [`execute`](Self::execute), with the fallback chosen by the
    /// caller.
    ///
    /// `select_fallback` runs only when a fallback is needed and receives the
    /// configured fallback; whatever it returns is used, and `None` surfaces
    /// the error. The task may produce any `T` a fallback value converts
    /// into.
    pub async fn execute_with<T, F, Fut, S>(
        &self,
        request: Req,
        task: F,
        select_fallback: S,
    ) -> Result<T, CommandError<E>>
    where
        T: From<Res>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: FnOnce(Option<&Fallback<Req, Res, E>>) -> Option<Fallback<Req, Res, E>>,
    {
        let Some(permit) = self.breaker.try_acquire() else {
            self.breaker.on_rejection();
            self.observe(Outcome::Rejected, None);
            return self
                .resolve_fallback(CommandError::OpenCircuit, request, select_fallback)
                .await;
        };

        let slot = match &self.semaphore {
            Some(semaphore) => match Arc::clone(semaphore).try_acquire_owned() {
                Ok(slot) => Some(slot),
                Err(_) => {
                    drop(permit);
                    self.breaker
                        .metrics()
                        .record(Outcome::SemaphoreRejected, None);
                    self.observe(Outcome::SemaphoreRejected, None);
                    return self
                        .resolve_fallback(CommandError::Rejected, request, select_fallback)
                        .await;
                }
            },
            None => None,
        };

        let running = self.breaker.metrics().begin_execution();
        let start = Instant::now();
        let result = timeout(self.config.timeout, task()).await;
        let elapsed = start.elapsed();
        drop(running);
        drop(slot);

        let error = match result {
            Ok(Ok(value)) => {
                permit.success(elapsed);
                self.observe(Outcome::Success, Some(elapsed));
                return Ok(value);
            }
            Ok(Err(err)) if !self.config.counts_as_failure(&err) => {
                permit.success(elapsed);
                self.observe(Outcome::Success, Some(elapsed));
                return Err(CommandError::Downstream(err));
            }
            Ok(Err(err)) => {
                permit.failure(elapsed);
                self.observe(Outcome::Failure, Some(elapsed));
                CommandError::Downstream(err)
            }
            Err(_elapsed) => {
                permit.timeout(elapsed);
                self.observe(Outcome::Timeout, Some(elapsed));
                CommandError::Timeout
            }
        };

        self.resolve_fallback(error, request, select_fallback).await
    }

    async fn resolve_fallback<T, S>(
        &self,
        error: CommandError<E>,
        request: Req,
        select_fallback: S,
    ) -> Result<T, CommandError<E>>
    where
        T: From<Res>,
        S: FnOnce(Option<&Fallback<Req, Res, E>>) -> Option<Fallback<Req, Res, E>>,
    {
        let Some(fallback) = select_fallback(self.config.fallback.as_ref()) else {
            return Err(error);
        };

        match fallback.call(error, request).await {
            Ok(value) => {
                self.breaker
                    .metrics()
                    .record(Outcome::FallbackSuccess, None);
                self.observe(Outcome::FallbackSuccess, None);
                Ok(T::from(value))
            }
            Err(err) => {
                self.breaker
                    .metrics()
                    .record(Outcome::FallbackFailure, None);
                self.observe(Outcome::FallbackFailure, None);
                Err(CommandError::Fallback(err))
            }
        }
    }

    /// Logs, counts and announces an outcome. The rolling window is updated
    /// by the caller.
    fn observe(&self, outcome: Outcome, duration: Option<Duration>) {
        let command = self.config.command();

        #[cfg(feature = "tracing")]
        if outcome != Outcome::Success {
            debug!(
                command = %command,
                outcome = outcome.as_str(),
                latency_ms = duration.map(|d| d.as_millis() as u64),
                "command did not succeed"
            );
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "hystrix_command_calls_total",
                "command" => command.to_string(),
                "outcome" => outcome.as_str()
            )
            .increment(1);
            if let Some(duration) = duration {
                histogram!("hystrix_command_duration_seconds", "command" => command.to_string())
                    .record(duration.as_secs_f64());
            }
        }

        if self.config.event_listeners.is_empty() {
            return;
        }

        let command = command.clone();
        let timestamp = std::time::Instant::now();
        let duration = duration.unwrap_or_default();
        let event = match outcome {
            Outcome::Success => CommandEvent::Success {
                command,
                timestamp,
                duration,
            },
            Outcome::Failure => CommandEvent::Failure {
                command,
                timestamp,
                duration,
            },
            Outcome::Timeout => CommandEvent::Timeout {
                command,
                timestamp,
                timeout: self.config.timeout,
            },
            Outcome::Rejected => CommandEvent::ShortCircuited { command, timestamp },
            Outcome::SemaphoreRejected => CommandEvent::SemaphoreRejected {
                command,
                timestamp,
                max_concurrent: self.config.max_concurrent.unwrap_or_default(),
            },
            Outcome::FallbackSuccess => CommandEvent::FallbackSuccess { command, timestamp },
            Outcome::FallbackFailure => CommandEvent::FallbackFailure { command, timestamp },
        };
        self.config.event_listeners.emit(&event);
    }
}

impl<Req, Res, E> std::fmt::Debug for GuardedCommand<Req, Res, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedCommand")
            .field("command", self.command())
            .field("breaker", &self.breaker)
            .field("max_concurrent", &self.config.max_concurrent)
            .finish_non_exhaustive()
    }
}
