//! Configuration errors.

use thiserror::Error;

/// Raised while building a command, breaker or publisher configuration.
///
/// These are setup-time failures: they surface from `build()` before any
/// request is processed and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// No command name was supplied.
    #[error("Command name should be provided")]
    MissingCommand,

    /// A setting is outside its valid range.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigurationError {
    /// Builds an [`Invalid`](ConfigurationError::Invalid) error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Returns true if the command name was missing.
    pub fn is_missing_command(&self) -> bool {
        matches!(self, Self::MissingCommand)
    }
}
