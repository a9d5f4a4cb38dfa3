use crate::circuit::CircuitState;
use std::time::Instant;
use tower_hystrix_core::{CommandKey, HystrixEvent};

/// Events emitted by a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The computed state changed.
    StateTransition {
        command: CommandKey,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A request was allowed through.
    CallPermitted {
        command: CommandKey,
        timestamp: Instant,
        state: CircuitState,
        trial: bool,
    },
    /// A request was denied without running.
    CallRejected {
        command: CommandKey,
        timestamp: Instant,
        forced: bool,
    },
    /// An operator toggled a forced flag.
    ForcedStateChanged {
        command: CommandKey,
        timestamp: Instant,
        forced_open: bool,
        forced_closed: bool,
    },
}

impl HystrixEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::ForcedStateChanged { .. } => "forced_state_changed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::ForcedStateChanged { timestamp, .. } => *timestamp,
        }
    }

    fn command_key(&self) -> &CommandKey {
        match self {
            CircuitBreakerEvent::StateTransition { command, .. }
            | CircuitBreakerEvent::CallPermitted { command, .. }
            | CircuitBreakerEvent::CallRejected { command, .. }
            | CircuitBreakerEvent::ForcedStateChanged { command, .. } => command,
        }
    }
}
