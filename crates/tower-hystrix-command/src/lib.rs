//! Guarded commands: one circuit breaker, timeout and fallback per command key.
//!
//! A [`GuardedCommand`] wraps caller-supplied async work. For each request it
//!
//! 1. asks the circuit breaker for permission, failing fast with
//!    [`CommandError::OpenCircuit`] when the circuit is open;
//! 2. runs the work under the command timeout, failing with
//!    [`CommandError::Timeout`] when it runs late;
//! 3. records the outcome in the rolling window;
//! 4. on denial, timeout or failure, calls the [`Fallback`] if one is set.
//!    A failing fallback surfaces as [`CommandError::Fallback`].
//!
//! Commands are cached in a [`CommandRegistry`]. The first configuration
//! registered for a key wins; later registrations return the cached command.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tower_hystrix_command::{CommandConfig, CommandRegistry, Fallback};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CommandRegistry::<String, String, String>::new();
//! let config = CommandConfig::builder()
//!     .command("profile.load")
//!     .group("profiles")
//!     .timeout(Duration::from_millis(250))
//!     .error_threshold_percentage(50)
//!     .request_volume_threshold(20)
//!     .fallback(Fallback::value("anonymous".to_string()))
//!     .build()?;
//!
//! let command = registry.get_or_create(&config);
//! let name = command
//!     .execute("user-1".to_string(), || async { Err("backend down".to_string()) })
//!     .await?;
//! assert_eq!(name, "anonymous");
//! # Ok(())
//! # }
//! ```
//!
//! # Tower
//!
//! [`HystrixLayer`] applies a command to any `tower::Service`.
//!
//! # Feature flags
//!
//! - `metrics`: Prometheus counters for call outcomes and an execution latency histogram
//! - `tracing`: logs rejections, timeouts, failures and fallbacks
//! - `serde`: deserialize [`CommandProperties`] from configuration files

mod command;
mod config;
mod error;
mod events;
mod fallback;
mod layer;
mod properties;
mod registry;

pub use command::GuardedCommand;
pub use config::{CommandConfig, CommandConfigBuilder};
pub use error::{CommandError, ErrorKind};
pub use events::CommandEvent;
pub use fallback::Fallback;
pub use layer::{HystrixLayer, HystrixService};
pub use properties::CommandProperties;
pub use registry::CommandRegistry;

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_histogram};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "hystrix_command_calls_total",
            "Total number of command calls by outcome"
        );
        describe_histogram!(
            "hystrix_command_duration_seconds",
            "Execution latency of guarded commands"
        );
    });
}
