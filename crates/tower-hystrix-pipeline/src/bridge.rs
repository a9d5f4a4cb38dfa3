//! Runs a pipeline exchange as one guarded-command execution.
//!
//! Each request gets its own event channel, delivery slot and execution
//! context. A spawned driver executes the exchange through the command and
//! routes the outcome to the consumer:
//!
//! ```text
//! request ──► driver ──► command.execute_with(exchange)
//!                             │
//!          handler ──events──►│ Response      ─► Reply::Full
//!                             │ ResponseStart    (head held back)
//!                             │ first Data    ─► Reply::Stream, fallback disabled
//!                             │ Data / End    ─► body
//!                             │ Error         ─► fallback or error
//! ```

use crate::context::{ExecutionContext, RequestContext};
use crate::error::PipelineError;
use crate::handler::Handler;
use crate::reply::{BodySender, Reply, ResponseBody};
use crate::responder::{PipeEvent, Responder};
use futures::future::{self, BoxFuture, Either};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tower::Service;
use tower_hystrix_command::{CommandConfig, CommandRegistry, Fallback, GuardedCommand};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

type ResOf<H, Req> = <H as Handler<Req>>::Response;
type ChunkOf<H, Req> = <H as Handler<Req>>::Chunk;
type ErrOf<H, Req> = <H as Handler<Req>>::Error;

/// Reply type produced by a bridge over `H`.
pub type BridgeReply<H, Req> = Reply<ResOf<H, Req>, ChunkOf<H, Req>, ErrOf<H, Req>>;
/// Error type produced by a bridge over `H`.
pub type BridgeError<H, Req> = PipelineError<ErrOf<H, Req>>;
/// Per-request context accepted by a bridge over `H`.
pub type BridgeContext<H, Req> = RequestContext<Req, ResOf<H, Req>, ErrOf<H, Req>>;

type Settled<H, Req> = Result<BridgeReply<H, Req>, BridgeError<H, Req>>;

/// Guards a pipeline [`Handler`] with a [`GuardedCommand`].
///
/// Every request runs the handler as one command execution. Fallbacks are
/// chosen per request, highest first: the [`RequestContext`] fallback, the
/// bridge's own fallback, the fallback registered with the command, none.
/// Once a streamed response has delivered its first chunk, no fallback
/// applies to that request anymore.
pub struct PipelineBridge<H, Req>
where
    H: Handler<Req>,
{
    handler: Arc<H>,
    registry: Arc<CommandRegistry<Req, ResOf<H, Req>, ErrOf<H, Req>>>,
    config: CommandConfig<Req, ResOf<H, Req>, ErrOf<H, Req>>,
    fallback: Option<Fallback<Req, ResOf<H, Req>, ErrOf<H, Req>>>,
    in_flight: Arc<AtomicUsize>,
}

impl<H, Req> PipelineBridge<H, Req>
where
    H: Handler<Req>,
    Req: Clone + Send + 'static,
{
    /// Creates a bridge for `handler`, registering `config` in `registry`.
    ///
    /// The command is looked up in `registry` on every request, so a
    /// [`reset_all`](CommandRegistry::reset_all) takes effect on bridges
    /// already built. If the key is already registered, the cached command
    /// is used and `config` only serves as the template for re-registration
    /// and context-selected commands.
    pub fn new(
        handler: H,
        registry: Arc<CommandRegistry<Req, ResOf<H, Req>, ErrOf<H, Req>>>,
        config: CommandConfig<Req, ResOf<H, Req>, ErrOf<H, Req>>,
    ) -> Self {
        registry.get_or_create(&config);
        Self {
            handler: Arc::new(handler),
            registry,
            config,
            fallback: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the pipeline-level fallback.
    pub fn with_fallback(mut self, fallback: Option<Fallback<Req, ResOf<H, Req>, ErrOf<H, Req>>>) -> Self {
        self.fallback = fallback;
        self
    }

    /// The command requests run under by default, as currently registered.
    pub fn command(&self) -> Arc<GuardedCommand<Req, ResOf<H, Req>, ErrOf<H, Req>>> {
        self.registry.get_or_create(&self.config)
    }

    /// The registry commands are resolved in.
    pub fn registry(&self) -> &Arc<CommandRegistry<Req, ResOf<H, Req>, ErrOf<H, Req>>> {
        &self.registry
    }

    /// Requests accepted and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Sends `request` down the pipeline with default options.
    pub async fn request(&self, request: Req) -> Settled<H, Req> {
        self.request_with(request, RequestContext::new()).await
    }

    /// Sends `request` down the pipeline with per-request options.
    pub async fn request_with(&self, request: Req, ctx: BridgeContext<H, Req>) -> Settled<H, Req> {
        let command = self.resolve_command(&ctx);
        let exec = ExecutionContext::new(ctx.fallback, self.fallback.clone());
        let (reply_tx, reply_rx) = oneshot::channel();
        let driver = Driver {
            handler: Arc::clone(&self.handler),
            command,
            exec,
            delivery: Delivery::new(reply_tx),
            in_flight: InFlight::enter(&self.in_flight),
        };

        tokio::spawn(driver.run(request));
        reply_rx.await.unwrap_or(Err(PipelineError::Closed))
    }

    fn resolve_command(
        &self,
        ctx: &BridgeContext<H, Req>,
    ) -> Arc<GuardedCommand<Req, ResOf<H, Req>, ErrOf<H, Req>>> {
        match &ctx.command {
            Some(key) if key != self.config.command() => self
                .registry
                .get_or_create(&self.config.with_command(key.clone(), ctx.group.clone())),
            _ => self.command(),
        }
    }
}

impl<H, Req> Clone for PipelineBridge<H, Req>
where
    H: Handler<Req>,
{
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            fallback: self.fallback.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<H, Req> fmt::Debug for PipelineBridge<H, Req>
where
    H: Handler<Req>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBridge")
            .field("command", self.config.command())
            .field("fallback", &self.fallback.is_some())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<H, Req> Service<Req> for PipelineBridge<H, Req>
where
    H: Handler<Req>,
    Req: Clone + Send + 'static,
{
    type Response = BridgeReply<H, Req>;
    type Error = BridgeError<H, Req>;
    type Future = BoxFuture<'static, Settled<H, Req>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let bridge = self.clone();
        Box::pin(async move { bridge.request(req).await })
    }
}

/// Completion of the exchange as the command sees it.
enum Completion<Res> {
    Full(Res),
    /// Already delivered to the consumer chunk by chunk.
    Streamed,
}

impl<Res> From<Res> for Completion<Res> {
    fn from(res: Res) -> Self {
        Completion::Full(res)
    }
}

/// Where the consumer's reply goes: the one-shot reply slot until a stream
/// commits, then the stream body.
struct Delivery<Res, Chunk, E> {
    slots: Mutex<Slots<Res, Chunk, E>>,
}

struct Slots<Res, Chunk, E> {
    reply: Option<oneshot::Sender<Result<Reply<Res, Chunk, E>, PipelineError<E>>>>,
    body: Option<BodySender<Chunk, E>>,
}

impl<Res, Chunk, E> Delivery<Res, Chunk, E> {
    fn new(reply: oneshot::Sender<Result<Reply<Res, Chunk, E>, PipelineError<E>>>) -> Self {
        Self {
            slots: Mutex::new(Slots {
                reply: Some(reply),
                body: None,
            }),
        }
    }

    fn settle(&self, result: Result<Reply<Res, Chunk, E>, PipelineError<E>>) {
        if let Some(reply) = self.slots.lock().reply.take() {
            let _ = reply.send(result);
        }
    }

    fn open_stream(&self, head: Res) {
        let (tx, body) = ResponseBody::channel();
        let mut slots = self.slots.lock();
        if let Some(reply) = slots.reply.take() {
            let _ = reply.send(Ok(Reply::Stream { head, body }));
            slots.body = Some(tx);
        }
    }

    fn push(&self, chunk: Chunk) {
        if let Some(body) = &self.slots.lock().body {
            let _ = body.send(Ok(chunk));
        }
    }

    fn finish(&self) {
        self.slots.lock().body = None;
    }

    fn fail(&self, error: PipelineError<E>) {
        let mut slots = self.slots.lock();
        if let Some(reply) = slots.reply.take() {
            let _ = reply.send(Err(error));
        } else if let Some(body) = slots.body.take() {
            let _ = body.send(Err(error));
        }
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

struct Driver<H, Req>
where
    H: Handler<Req>,
{
    handler: Arc<H>,
    command: Arc<GuardedCommand<Req, ResOf<H, Req>, ErrOf<H, Req>>>,
    exec: ExecutionContext<Req, ResOf<H, Req>, ErrOf<H, Req>>,
    delivery: Delivery<ResOf<H, Req>, ChunkOf<H, Req>, ErrOf<H, Req>>,
    in_flight: InFlight,
}

impl<H, Req> Driver<H, Req>
where
    H: Handler<Req>,
    Req: Clone + Send + 'static,
{
    async fn run(self, request: Req) {
        let forwarded = request.clone();
        let result = self
            .command
            .execute_with(
                request,
                || self.exchange(forwarded),
                |configured| self.exec.select_fallback(configured),
            )
            .await;

        // Settled before the consumer can observe the reply.
        drop(self.in_flight);

        match result {
            Ok(Completion::Full(response)) => self.delivery.settle(Ok(Reply::Full(response))),
            Ok(Completion::Streamed) => {}
            Err(err) => {
                #[cfg(feature = "tracing")]
                debug!(
                    command = %self.command.command(),
                    kind = err.kind().name(),
                    streaming = self.exec.is_streaming(),
                    "pipeline request failed"
                );
                self.delivery.fail(PipelineError::Command(err));
            }
        }
    }

    /// Runs the handler and waits for the request's terminal event.
    async fn exchange(&self, request: Req) -> Result<Completion<ResOf<H, Req>>, ErrOf<H, Req>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handling = self.handler.handle(request, Responder::new(tx));
        let events = Box::pin(self.collect(rx));

        match future::select(handling, events).await {
            Either::Left(((), events)) => events.await,
            Either::Right((outcome, handling)) => {
                // Answered; the handler finishes on its own task.
                tokio::spawn(handling);
                outcome
            }
        }
    }

    async fn collect(
        &self,
        mut rx: mpsc::UnboundedReceiver<PipeEvent<ResOf<H, Req>, ChunkOf<H, Req>, ErrOf<H, Req>>>,
    ) -> Result<Completion<ResOf<H, Req>>, ErrOf<H, Req>> {
        let mut head = None;
        while let Some(event) = rx.recv().await {
            match event {
                PipeEvent::Response(response) => return Ok(Completion::Full(response)),
                PipeEvent::ResponseStart(start) => head = Some(start),
                PipeEvent::Data(chunk) => {
                    self.commit(&mut head);
                    self.delivery.push(chunk);
                }
                PipeEvent::End => {
                    self.commit(&mut head);
                    self.delivery.finish();
                    return Ok(Completion::Streamed);
                }
                PipeEvent::Error(error) => return Err(error),
            }
        }

        // The handler dropped its responder without answering.
        future::pending().await
    }

    /// Hands the held-back head to the consumer and disables fallbacks.
    fn commit(&self, head: &mut Option<ResOf<H, Req>>) {
        if let Some(head) = head.take() {
            if self.exec.begin_streaming() {
                #[cfg(feature = "tracing")]
                trace!(command = %self.command.command(), "response streaming started");
            }
            self.delivery.open_stream(head);
        }
    }
}
