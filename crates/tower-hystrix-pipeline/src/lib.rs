//! Guarded execution for event-driven, possibly streaming pipelines.
//!
//! A pipeline [`Handler`] answers each request through a [`Responder`]:
//! with a full response, with an error, or by streaming a head followed by
//! body chunks. [`PipelineBridge`] turns that exchange into a single
//! [`GuardedCommand`](tower_hystrix_command::GuardedCommand) execution, so
//! the circuit breaker, timeout and fallback apply to it.
//!
//! # Fallback precedence
//!
//! For each failed request the first available fallback wins:
//!
//! 1. the fallback in the request's [`RequestContext`];
//! 2. the fallback given to the [`PipelineLayer`] (or bridge);
//! 3. the fallback registered with the command;
//! 4. none: the error reaches the consumer.
//!
//! # Streaming
//!
//! A streamed response is handed to the consumer as [`Reply::Stream`] when
//! its first chunk arrives. From that moment no fallback applies to the
//! request: an error later in the stream is delivered as the last item of
//! the [`ResponseBody`]. An error after the head but before any chunk still
//! falls back, and the head is discarded.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::Layer;
//! use tower_hystrix_command::{CommandConfig, CommandRegistry, Fallback};
//! use tower_hystrix_pipeline::{handler_fn, PipelineLayer, Reply, RequestContext, Responder};
//!
//! # async fn example() {
//! let registry = Arc::new(CommandRegistry::<String, String, String>::new());
//! let config = CommandConfig::builder()
//!     .command("greeter")
//!     .timeout(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//!
//! let bridge = PipelineLayer::new(registry, config)
//!     .fallback(Fallback::value("pipeline fallback".to_string()))
//!     .layer(handler_fn(|_req: String, res: Responder<String, String, String>| async move {
//!         res.throw("Boom".to_string());
//!     }));
//!
//! let reply = bridge.request("hi".to_string()).await.unwrap();
//! assert_eq!(reply.into_full().unwrap(), "pipeline fallback");
//!
//! let ctx = RequestContext::new().fallback(Fallback::value("request fallback".to_string()));
//! let reply = bridge.request_with("hi".to_string(), ctx).await.unwrap();
//! assert!(matches!(reply, Reply::Full(ref body) if body == "request fallback"));
//! # }
//! ```
//!
//! The bridge spawns one task per request and must run inside a Tokio
//! runtime.
//!
//! # Feature flags
//!
//! - `tracing`: logs failed requests and the start of streamed responses

mod bridge;
mod context;
mod error;
mod handler;
mod layer;
mod reply;
mod responder;

pub use bridge::{BridgeContext, BridgeError, BridgeReply, PipelineBridge};
pub use context::RequestContext;
pub use error::PipelineError;
pub use handler::{handler_fn, Handler, HandlerFn, ServiceHandler};
pub use layer::PipelineLayer;
pub use reply::{Reply, ResponseBody};
pub use responder::{Responder, ResponseWriter};
