//! Declarative command settings, as they appear in configuration files.

use crate::config::CommandConfigBuilder;
use std::time::Duration;

/// Serializable command settings.
///
/// Every field is optional; unset fields keep the builder defaults. With the
/// `serde` feature the struct deserializes from camelCase keys such as
/// `circuitBreakerSleepWindowInMilliseconds`. Durations are milliseconds.
///
/// ```rust
/// use tower_hystrix_command::{CommandConfig, CommandProperties};
///
/// let properties = CommandProperties {
///     command: Some("inventory".into()),
///     timeout: Some(250),
///     ..Default::default()
/// };
/// let config: CommandConfig<String, String, String> =
///     properties.into_builder().build().unwrap();
/// assert_eq!(config.timeout().as_millis(), 250);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
pub struct CommandProperties {
    pub command: Option<String>,
    pub group: Option<String>,
    pub timeout: Option<u64>,
    pub circuit_breaker_error_threshold_percentage: Option<u32>,
    pub circuit_breaker_request_volume_threshold: Option<u64>,
    pub circuit_breaker_sleep_window_in_milliseconds: Option<u64>,
    pub circuit_breaker_force_opened: Option<bool>,
    pub circuit_breaker_force_closed: Option<bool>,
    pub statistical_window_length: Option<u64>,
    pub statistical_window_number_of_buckets: Option<usize>,
    pub request_volume_rejection_threshold: Option<usize>,
}

impl CommandProperties {
    /// Starts a builder from these settings.
    pub fn into_builder<Req, Res, E>(self) -> CommandConfigBuilder<Req, Res, E> {
        self.apply(CommandConfigBuilder::new())
    }

    /// Applies the set fields on top of `builder`.
    pub fn apply<Req, Res, E>(
        self,
        mut builder: CommandConfigBuilder<Req, Res, E>,
    ) -> CommandConfigBuilder<Req, Res, E> {
        if let Some(command) = self.command {
            builder = builder.command(command);
        }
        if let Some(group) = self.group {
            builder = builder.group(group);
        }
        if let Some(ms) = self.timeout {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(percentage) = self.circuit_breaker_error_threshold_percentage {
            builder = builder.error_threshold_percentage(percentage);
        }
        if let Some(volume) = self.circuit_breaker_request_volume_threshold {
            builder = builder.request_volume_threshold(volume);
        }
        if let Some(ms) = self.circuit_breaker_sleep_window_in_milliseconds {
            builder = builder.sleep_window(Duration::from_millis(ms));
        }
        if let Some(forced) = self.circuit_breaker_force_opened {
            builder = builder.force_open(forced);
        }
        if let Some(forced) = self.circuit_breaker_force_closed {
            builder = builder.force_closed(forced);
        }
        if self.statistical_window_length.is_some()
            || self.statistical_window_number_of_buckets.is_some()
        {
            let window = self.statistical_window_length.unwrap_or(10_000);
            let buckets = self.statistical_window_number_of_buckets.unwrap_or(10);
            builder = builder.statistical_window(Duration::from_millis(window), buckets);
        }
        if let Some(max) = self.request_volume_rejection_threshold {
            builder = builder.max_concurrent(max);
        }
        builder
    }
}
