//! Event system for breakers and commands.
//!
//! Every component that changes state emits a typed event. Listeners are
//! registered on the configuration builders and invoked synchronously on
//! the thread that produced the event, so they should be cheap.

use crate::key::CommandKey;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An observable occurrence inside a breaker or command.
pub trait HystrixEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable name, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// The command the event belongs to.
    fn command_key(&self) -> &CommandKey;
}

/// Receives events of one type.
pub trait EventListener<E: HystrixEvent>: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &E);
}

/// Type alias for shared event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered set of listeners.
pub struct EventListeners<E: HystrixEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: HystrixEvent> EventListeners<E> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener is isolated: the panic is caught and the
    /// remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            if outcome.is_err() {
                tracing::warn!(
                    command = %event.command_key(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = outcome;
        }
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: HystrixEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: HystrixEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: HystrixEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: HystrixEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
