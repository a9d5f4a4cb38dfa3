//! Tower layer that puts a handler behind a pipeline bridge.

use crate::bridge::PipelineBridge;
use crate::handler::Handler;
use std::fmt;
use std::sync::Arc;
use tower::layer::Layer;
use tower_hystrix_command::{CommandConfig, CommandRegistry, Fallback};

/// Applies a guarded command to every pipeline built with this layer.
///
/// Building the layer once per connection is cheap: each bridge resolves its
/// command through the shared registry, so all of them share one breaker.
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tower::Layer;
/// use tower_hystrix_command::{CommandConfig, CommandRegistry, Fallback};
/// use tower_hystrix_pipeline::{handler_fn, PipelineLayer, Responder};
///
/// let registry = Arc::new(CommandRegistry::<String, String, String>::new());
/// let config = CommandConfig::builder()
///     .command("echo")
///     .timeout(Duration::from_millis(500))
///     .build()
///     .unwrap();
///
/// let layer = PipelineLayer::new(Arc::clone(&registry), config)
///     .fallback(Fallback::value("unavailable".to_string()));
/// let bridge = layer.layer(handler_fn(
///     |req: String, res: Responder<String, String, String>| async move { res.respond(req) },
/// ));
/// assert_eq!(registry.len(), 1);
/// ```
pub struct PipelineLayer<Req, Res, E> {
    registry: Arc<CommandRegistry<Req, Res, E>>,
    config: CommandConfig<Req, Res, E>,
    fallback: Option<Fallback<Req, Res, E>>,
}

impl<Req, Res, E> PipelineLayer<Req, Res, E> {
    /// Creates a layer that registers `config` in `registry`.
    pub fn new(registry: Arc<CommandRegistry<Req, Res, E>>, config: CommandConfig<Req, Res, E>) -> Self {
        Self {
            registry,
            config,
            fallback: None,
        }
    }

    /// Sets the pipeline-level fallback. It applies to every request of the
    /// bridges this layer builds, unless a request brings its own.
    ///
    /// Default: none
    pub fn fallback(mut self, fallback: Fallback<Req, Res, E>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl<Req, Res, E> Clone for PipelineLayer<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<Req, Res, E> fmt::Debug for PipelineLayer<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineLayer")
            .field("command", self.config.command())
            .field("fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

impl<H, Req, Res, E> Layer<H> for PipelineLayer<Req, Res, E>
where
    H: Handler<Req, Response = Res, Error = E>,
    Req: Clone + Send + 'static,
{
    type Service = PipelineBridge<H, Req>;

    fn layer(&self, handler: H) -> Self::Service {
        PipelineBridge::new(handler, Arc::clone(&self.registry), self.config.clone())
            .with_fallback(self.fallback.clone())
    }
}
