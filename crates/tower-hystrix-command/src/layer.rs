//! Tower layer that runs every call through a guarded command.

use crate::command::GuardedCommand;
use crate::config::CommandConfig;
use crate::error::CommandError;
use crate::registry::CommandRegistry;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::layer::Layer;
use tower::Service;

/// A Tower layer that guards a service with a [`GuardedCommand`].
///
/// Each call becomes one execution: the breaker decides whether the inner
/// service is called, the command timeout bounds it, and the command's
/// fallback gets a clone of the request.
pub struct HystrixLayer<Req, Res, E> {
    command: Arc<GuardedCommand<Req, Res, E>>,
}

impl<Req, Res, E> HystrixLayer<Req, Res, E> {
    /// Creates a layer around an existing command.
    pub fn new(command: Arc<GuardedCommand<Req, Res, E>>) -> Self {
        Self { command }
    }

    /// Creates a layer for the command registered under `config`'s key,
    /// registering it first if needed.
    ///
    /// The layer keeps that instance; it is not re-resolved after
    /// [`CommandRegistry::reset_all`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tower::{service_fn, Layer};
    /// use tower_hystrix_command::{CommandConfig, CommandRegistry, HystrixLayer};
    ///
    /// let registry = CommandRegistry::<String, String, String>::new();
    /// let config = CommandConfig::builder()
    ///     .command("echo")
    ///     .timeout(Duration::from_secs(1))
    ///     .build()
    ///     .unwrap();
    ///
    /// let layer = HystrixLayer::from_registry(&registry, &config);
    /// let service = layer.layer(service_fn(|req: String| async move { Ok::<_, String>(req) }));
    /// ```
    pub fn from_registry(
        registry: &CommandRegistry<Req, Res, E>,
        config: &CommandConfig<Req, Res, E>,
    ) -> Self {
        Self::new(registry.get_or_create(config))
    }

    /// The command this layer applies.
    pub fn command(&self) -> &Arc<GuardedCommand<Req, Res, E>> {
        &self.command
    }
}

impl<Req, Res, E> Clone for HystrixLayer<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            command: Arc::clone(&self.command),
        }
    }
}

impl<S, Req, Res, E> Layer<S> for HystrixLayer<Req, Res, E> {
    type Service = HystrixService<S, Req, Res, E>;

    fn layer(&self, service: S) -> Self::Service {
        HystrixService {
            inner: service,
            command: Arc::clone(&self.command),
        }
    }
}

/// A Tower service guarded by a [`GuardedCommand`].
pub struct HystrixService<S, Req, Res, E> {
    inner: S,
    command: Arc<GuardedCommand<Req, Res, E>>,
}

impl<S: Clone, Req, Res, E> Clone for HystrixService<S, Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            command: Arc::clone(&self.command),
        }
    }
}

impl<S, Req, Res, E> Service<Req> for HystrixService<S, Req, Res, E>
where
    S: Service<Req, Response = Res, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    type Response = Res;
    type Error = CommandError<E>;
    type Future = BoxFuture<'static, Result<Res, CommandError<E>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CommandError::Downstream)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut inner = self.inner.clone();
        let command = Arc::clone(&self.command);

        Box::pin(async move {
            let call = req.clone();
            command.execute(req, move || inner.call(call)).await
        })
    }
}
