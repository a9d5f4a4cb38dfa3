//! Pipeline bridge tests.
//!
//! Test organization:
//! - precedence.rs: request, pipeline and registered fallbacks
//! - streaming.rs: streamed responses and fallback cancellation
//! - lifecycle.rs: timeouts, per-request isolation and command selection

mod lifecycle;

use std::sync::Arc;
use std::time::Duration;
use tower_hystrix_command::{CommandConfig, CommandConfigBuilder, CommandRegistry};
use tower_hystrix_pipeline::Responder;

pub(crate) type Res = Responder<String, String, String>;
pub(crate) type Registry = Arc<CommandRegistry<String, String, String>>;

pub(crate) fn registry() -> Registry {
    Arc::new(CommandRegistry::new())
}

pub(crate) fn config(command: &str) -> CommandConfigBuilder<String, String, String> {
    CommandConfig::builder()
        .command(command)
        .timeout(Duration::from_secs(1))
}
