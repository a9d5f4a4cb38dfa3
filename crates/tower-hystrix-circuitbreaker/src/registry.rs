//! Process-wide map from command key to breaker and metrics.

use crate::circuit::CircuitBreaker;
use crate::config::CircuitBreakerConfig;
use crate::health::{MetricsSnapshot, Outcome};
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tower_hystrix_core::CommandKey;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Owns one [`CircuitBreaker`] (and through it one metrics window) per
/// command key.
///
/// The registry is an explicit value: construct one, share it behind an
/// [`Arc`], and hand it to whatever creates commands. Lookups take a read
/// lock on the map only; per-request state lives in the breaker itself.
#[derive(Debug, Default)]
pub struct CircuitRegistry {
    circuits: RwLock<HashMap<CommandKey, Arc<CircuitBreaker>>>,
}

impl CircuitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the breaker for `config.command()`, creating it from
    /// `config` on first use. Later calls ignore `config`.
    pub fn get_or_create(&self, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.circuits.read().get(config.command()) {
            return Arc::clone(existing);
        }

        let mut circuits = self.circuits.write();
        let breaker = circuits
            .entry(config.command().clone())
            .or_insert_with(|| {
                #[cfg(feature = "tracing")]
                debug!(command = %config.command(), group = %config.group(), "creating circuit");
                Arc::new(CircuitBreaker::new(config.clone()))
            });
        Arc::clone(breaker)
    }

    /// The breaker for `command`, if one exists.
    pub fn get(&self, command: &str) -> Option<Arc<CircuitBreaker>> {
        self.circuits.read().get(command).cloned()
    }

    /// Records `outcome` for `command`. Returns false for an unknown key.
    pub fn record(&self, command: &str, outcome: Outcome, latency: Option<Duration>) -> bool {
        match self.get(command) {
            Some(breaker) => {
                breaker.metrics().record(outcome, latency);
                true
            }
            None => false,
        }
    }

    /// Health snapshot for `command`.
    pub fn snapshot(&self, command: &str) -> Option<MetricsSnapshot> {
        self.get(command).map(|breaker| breaker.snapshot())
    }

    /// Snapshots for every registered command, ordered by key.
    pub fn snapshots(&self) -> Vec<MetricsSnapshot> {
        self.breakers()
            .iter()
            .map(|breaker| breaker.snapshot())
            .collect()
    }

    /// Every registered breaker, ordered by key.
    pub fn breakers(&self) -> Vec<Arc<CircuitBreaker>> {
        let mut breakers: Vec<_> = self.circuits.read().values().cloned().collect();
        breakers.sort_by(|a, b| a.command().cmp(b.command()));
        breakers
    }

    /// Sets the forced-open flag for `command`. Returns false for an unknown key.
    pub fn force_open(&self, command: &str, forced: bool) -> bool {
        self.get(command)
            .map(|breaker| breaker.force_open(forced))
            .is_some()
    }

    /// Sets the forced-closed flag for `command`. Returns false for an unknown key.
    pub fn force_closed(&self, command: &str, forced: bool) -> bool {
        self.get(command)
            .map(|breaker| breaker.force_closed(forced))
            .is_some()
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.circuits.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.circuits.read().is_empty()
    }

    /// Resets every breaker and forgets all of them.
    ///
    /// Requests already holding a breaker finish against the reset
    /// instance; new lookups create fresh breakers.
    pub fn reset_all(&self) {
        let drained: Vec<_> = self.circuits.write().drain().collect();

        #[cfg(feature = "tracing")]
        debug!(circuits = drained.len(), "resetting all circuits");

        for (_, breaker) in drained {
            breaker.reset();
        }
    }
}
