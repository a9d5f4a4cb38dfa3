use thiserror::Error;

/// Error returned by a guarded command.
///
/// The display text of the breaker-produced variants matches the names
/// clients conventionally test for (`OpenCircuitError`, `CommandTimeOut`);
/// downstream and fallback errors display as the wrapped error.
#[derive(Debug, Error)]
pub enum CommandError<E> {
    /// The circuit breaker denied the request; the operation never ran.
    #[error("OpenCircuitError")]
    OpenCircuit,

    /// The operation did not finish before the command timeout.
    #[error("CommandTimeOut")]
    Timeout,

    /// The command was already running its maximum number of concurrent
    /// executions.
    #[error("CommandRejected")]
    Rejected,

    /// The operation itself failed.
    #[error("{0}")]
    Downstream(E),

    /// The fallback ran and failed.
    #[error("{0}")]
    Fallback(E),
}

impl<E> CommandError<E> {
    /// Which kind of failure this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::OpenCircuit => ErrorKind::OpenCircuit,
            CommandError::Timeout => ErrorKind::Timeout,
            CommandError::Rejected => ErrorKind::Rejected,
            CommandError::Downstream(_) => ErrorKind::Downstream,
            CommandError::Fallback(_) => ErrorKind::Fallback,
        }
    }

    /// Returns true if the breaker denied the request.
    pub fn is_open_circuit(&self) -> bool {
        matches!(self, CommandError::OpenCircuit)
    }

    /// Returns true if the operation timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::Timeout)
    }

    /// Returns true if the concurrency limit rejected the request.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CommandError::Rejected)
    }

    /// The wrapped downstream or fallback error, if any.
    pub fn inner(&self) -> Option<&E> {
        match self {
            CommandError::Downstream(e) | CommandError::Fallback(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the error, returning the wrapped downstream or fallback error.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CommandError::Downstream(e) | CommandError::Fallback(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the wrapped error type.
    pub fn map<F, T>(self, f: F) -> CommandError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            CommandError::OpenCircuit => CommandError::OpenCircuit,
            CommandError::Timeout => CommandError::Timeout,
            CommandError::Rejected => CommandError::Rejected,
            CommandError::Downstream(e) => CommandError::Downstream(f(e)),
            CommandError::Fallback(e) => CommandError::Fallback(f(e)),
        }
    }
}

/// Discriminant of [`CommandError`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CommandError::OpenCircuit`].
    OpenCircuit,
    /// See [`CommandError::Timeout`].
    Timeout,
    /// See [`CommandError::Rejected`].
    Rejected,
    /// See [`CommandError::Downstream`].
    Downstream,
    /// See [`CommandError::Fallback`].
    Fallback,
}

impl ErrorKind {
    /// Stable name for logs and client-side matching.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::OpenCircuit => "OpenCircuitError",
            ErrorKind::Timeout => "CommandTimeOut",
            ErrorKind::Rejected => "CommandRejected",
            ErrorKind::Downstream => "DownstreamError",
            ErrorKind::Fallback => "FallbackError",
        }
    }
}
