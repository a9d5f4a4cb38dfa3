use crate::command::GuardedCommand;
use crate::config::CommandConfig;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tower_hystrix_circuitbreaker::CircuitRegistry;
use tower_hystrix_core::CommandKey;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Cache of guarded commands by key.
///
/// The first configuration registered for a key is the one that sticks:
/// building a pipeline once per connection with the same key reuses the
/// same command, breaker and metrics.
///
/// Breakers live in a [`CircuitRegistry`], which several command registries
/// with different request or response types may share.
pub struct CommandRegistry<Req, Res, E> {
    commands: RwLock<HashMap<CommandKey, Arc<GuardedCommand<Req, Res, E>>>>,
    circuits: Arc<CircuitRegistry>,
}

impl<Req, Res, E> CommandRegistry<Req, Res, E> {
    /// Creates an empty registry with its own circuit registry.
    pub fn new() -> Self {
        Self::with_circuits(Arc::new(CircuitRegistry::new()))
    }

    /// Creates an empty registry whose breakers live in `circuits`.
    pub fn with_circuits(circuits: Arc<CircuitRegistry>) -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
            circuits,
        }
    }

    /// The breaker registry backing these commands.
    pub fn circuits(&self) -> &Arc<CircuitRegistry> {
        &self.circuits
    }

    /// Returns the command for `config.command()`, building it from `config`
    /// on first use. Later calls return the cached command and ignore
    /// `config`.
    pub fn get_or_create(&self, config: &CommandConfig<Req, Res, E>) -> Arc<GuardedCommand<Req, Res, E>> {
        if let Some(existing) = self.commands.read().get(config.command()) {
            return Arc::clone(existing);
        }

        let mut commands = self.commands.write();
        let command = commands.entry(config.command().clone()).or_insert_with(|| {
            #[cfg(feature = "tracing")]
            debug!(command = %config.command(), group = %config.group(), "registering command");

            let breaker = self.circuits.get_or_create(config.circuit());
            Arc::new(GuardedCommand::with_breaker(config.clone(), breaker))
        });
        Arc::clone(command)
    }

    /// The command registered under `command`, if any.
    pub fn get(&self, command: &str) -> Option<Arc<GuardedCommand<Req, Res, E>>> {
        self.commands.read().get(command).cloned()
    }

    /// Registered command keys, sorted.
    pub fn keys(&self) -> Vec<CommandKey> {
        let mut keys: Vec<_> = self.commands.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    /// Returns true if no command is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    /// Forgets every command and resets every breaker and metrics window.
    ///
    /// Callers that resolve through [`get_or_create`](Self::get_or_create)
    /// pick up a fresh command on their next lookup. An `Arc` held across
    /// the reset keeps pointing at the forgotten instance.
    pub fn reset_all(&self) {
        self.commands.write().clear();
        self.circuits.reset_all();
    }
}

impl<Req, Res, E> Default for CommandRegistry<Req, Res, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res, E> fmt::Debug for CommandRegistry<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.keys())
            .field("circuits", &self.circuits)
            .finish()
    }
}
