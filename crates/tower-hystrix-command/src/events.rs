//! Events emitted by a guarded command.

use std::time::{Duration, Instant};
use tower_hystrix_core::{CommandKey, HystrixEvent};

/// Events emitted by a [`GuardedCommand`](crate::GuardedCommand).
#[derive(Debug, Clone)]
pub enum CommandEvent {
    /// The operation completed successfully.
    Success {
        command: CommandKey,
        timestamp: Instant,
        duration: Duration,
    },
    /// The operation failed and the error counted against the circuit.
    Failure {
        command: CommandKey,
        timestamp: Instant,
        duration: Duration,
    },
    /// The operation ran past the command timeout.
    Timeout {
        command: CommandKey,
        timestamp: Instant,
        timeout: Duration,
    },
    /// The circuit denied the request.
    ShortCircuited {
        command: CommandKey,
        timestamp: Instant,
    },
    /// The concurrency cap denied the request.
    SemaphoreRejected {
        command: CommandKey,
        timestamp: Instant,
        max_concurrent: usize,
    },
    /// A fallback replaced the error with a value.
    FallbackSuccess {
        command: CommandKey,
        timestamp: Instant,
    },
    /// A fallback ran and failed.
    FallbackFailure {
        command: CommandKey,
        timestamp: Instant,
    },
}

impl HystrixEvent for CommandEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CommandEvent::Success { .. } => "success",
            CommandEvent::Failure { .. } => "failure",
            CommandEvent::Timeout { .. } => "timeout",
            CommandEvent::ShortCircuited { .. } => "short_circuited",
            CommandEvent::SemaphoreRejected { .. } => "semaphore_rejected",
            CommandEvent::FallbackSuccess { .. } => "fallback_success",
            CommandEvent::FallbackFailure { .. } => "fallback_failure",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CommandEvent::Success { timestamp, .. }
            | CommandEvent::Failure { timestamp, .. }
            | CommandEvent::Timeout { timestamp, .. }
            | CommandEvent::ShortCircuited { timestamp, .. }
            | CommandEvent::SemaphoreRejected { timestamp, .. }
            | CommandEvent::FallbackSuccess { timestamp, .. }
            | CommandEvent::FallbackFailure { timestamp, .. } => *timestamp,
        }
    }

    fn command_key(&self) -> &CommandKey {
        match self {
            CommandEvent::Success { command, .. }
            | CommandEvent::Failure { command, .. }
            | CommandEvent::Timeout { command, .. }
            | CommandEvent::ShortCircuited { command, .. }
            | CommandEvent::SemaphoreRejected { command, .. }
            | CommandEvent::FallbackSuccess { command, .. }
            | CommandEvent::FallbackFailure { command, .. } => command,
        }
    }
}
