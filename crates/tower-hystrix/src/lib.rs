//! Hystrix-style resilience for Tower services and streaming pipelines.
//!
//! Each logical operation is a *command* identified by a key. A command
//! owns a circuit breaker fed by a rolling window of outcomes, a timeout
//! and an optional fallback. The components are available as individual
//! crates and as features of this one.
//!
//! # Components
//!
//! - **Circuit breaker** (`circuitbreaker` feature): per-key breaker with
//!   rolling counts, latency percentiles, forced states and a periodic
//!   `HystrixCommand` metrics stream
//! - **Command** (`command` feature): guarded execution with timeout and
//!   fallback, a first-write-wins command registry and a Tower layer
//! - **Pipeline** (`pipeline` feature): runs event-driven, possibly
//!   streaming handlers as guarded commands, with per-request fallbacks
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! tower-hystrix = { version = "0.3", features = ["full"] }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "command")]
//! # {
//! use std::time::Duration;
//! use tower::{Layer, ServiceExt};
//! use tower_hystrix::command::{CommandConfig, CommandRegistry, Fallback, HystrixLayer};
//!
//! # async fn example() {
//! let registry = CommandRegistry::<String, String, std::io::Error>::new();
//! let config = CommandConfig::builder()
//!     .command("users.lookup")
//!     .timeout(Duration::from_millis(300))
//!     .fallback(Fallback::value("guest".to_string()))
//!     .build()
//!     .unwrap();
//!
//! let service = HystrixLayer::from_registry(&registry, &config).layer(tower::service_fn(
//!     |id: String| async move { Ok::<_, std::io::Error>(format!("user {id}")) },
//! ));
//! let name = service.oneshot("42".to_string()).await.unwrap();
//! # }
//! # }
//! ```
//!
//! # Individual Crates
//!
//! - `tower-hystrix-core` (keys, configuration errors, event listeners)
//! - `tower-hystrix-circuitbreaker`
//! - `tower-hystrix-command`
//! - `tower-hystrix-pipeline`

// Re-export core (always available)
pub use tower_hystrix_core as core;

#[cfg(feature = "circuitbreaker")]
pub use tower_hystrix_circuitbreaker as circuitbreaker;

#[cfg(feature = "command")]
pub use tower_hystrix_command as command;

#[cfg(feature = "pipeline")]
pub use tower_hystrix_pipeline as pipeline;
