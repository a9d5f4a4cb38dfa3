//! Core infrastructure shared by the tower-hystrix crates.
//!
//! This crate provides:
//! - [`CommandKey`] and [`GroupKey`], the identifiers every guarded command,
//!   circuit breaker and metrics window is keyed by
//! - [`ConfigurationError`], raised synchronously when a command is set up
//! - an event system ([`HystrixEvent`], [`EventListeners`], [`FnListener`])
//!   used by the breaker and command crates for observability

pub mod error;
pub mod events;
pub mod key;

pub use error::ConfigurationError;
pub use events::{EventListener, EventListeners, FnListener, HystrixEvent};
pub use key::{CommandKey, GroupKey, DEFAULT_GROUP};
