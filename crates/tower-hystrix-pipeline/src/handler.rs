use crate::responder::Responder;
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use tower::{Service, ServiceExt};

/// Downstream processing of a pipeline.
///
/// A handler receives the request and a [`Responder`], and answers through
/// the responder: once with a full response or an error, or as a stream of
/// chunks. The returned future drives the handler; it may finish before or
/// after the answer is sent. Work left after the answer keeps running on a
/// task of its own. A handler that has not answered by the command timeout
/// is dropped.
pub trait Handler<Req>: Send + Sync + 'static {
    /// Full response, or head of a streamed response.
    type Response: Send + 'static;
    /// Streamed body chunk.
    type Chunk: Send + 'static;
    /// Handler error.
    type Error: Send + 'static;

    /// Handles one request.
    fn handle(
        &self,
        request: Req,
        responder: Responder<Self::Response, Self::Chunk, Self::Error>,
    ) -> BoxFuture<'static, ()>;
}

/// Handler built from an async function. See [`handler_fn`].
pub struct HandlerFn<F, Res, Chunk, E> {
    f: F,
    _types: PhantomData<fn() -> (Res, Chunk, E)>,
}

/// Creates a [`Handler`] from an async function.
///
/// ```rust
/// use tower_hystrix_pipeline::{handler_fn, Responder};
///
/// let handler = handler_fn(|req: String, res: Responder<String, String, String>| async move {
///     let body = res.stream_response(format!("re: {req}"));
///     body.write("part 1".to_string());
///     body.end();
/// });
/// ```
pub fn handler_fn<F, Req, Res, Chunk, E, Fut>(f: F) -> HandlerFn<F, Res, Chunk, E>
where
    F: Fn(Req, Responder<Res, Chunk, E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    HandlerFn {
        f,
        _types: PhantomData,
    }
}

impl<F, Req, Res, Chunk, E, Fut> Handler<Req> for HandlerFn<F, Res, Chunk, E>
where
    F: Fn(Req, Responder<Res, Chunk, E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    Res: Send + 'static,
    Chunk: Send + 'static,
    E: Send + 'static,
{
    type Response = Res;
    type Chunk = Chunk;
    type Error = E;

    fn handle(&self, request: Req, responder: Responder<Res, Chunk, E>) -> BoxFuture<'static, ()> {
        Box::pin((self.f)(request, responder))
    }
}

impl<F: Clone, Res, Chunk, E> Clone for HandlerFn<F, Res, Chunk, E> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            _types: PhantomData,
        }
    }
}

impl<F, Res, Chunk, E> fmt::Debug for HandlerFn<F, Res, Chunk, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Adapts a `tower::Service` into a non-streaming [`Handler`].
#[derive(Debug, Clone)]
pub struct ServiceHandler<S> {
    inner: S,
}

impl<S> ServiceHandler<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, Req> Handler<Req> for ServiceHandler<S>
where
    S: Service<Req> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Chunk = Infallible;
    type Error = S::Error;

    fn handle(
        &self,
        request: Req,
        responder: Responder<S::Response, Infallible, S::Error>,
    ) -> BoxFuture<'static, ()> {
        let service = self.inner.clone();
        Box::pin(async move {
            match service.oneshot(request).await {
                Ok(response) => responder.respond(response),
                Err(error) => responder.throw(error),
            }
        })
    }
}
