use thiserror::Error;
use tower_hystrix_command::{CommandError, ErrorKind};

/// Error delivered to a pipeline consumer.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    /// The guarded command settled with an error. The circuit breaker has
    /// already counted it.
    #[error("{0}")]
    Command(CommandError<E>),

    /// The bridge stopped before the request settled.
    #[error("pipeline closed before the request settled")]
    Closed,
}

impl<E> PipelineError<E> {
    /// Returns true if the circuit breaker already counted this error.
    ///
    /// A guarded command wrapping this pipeline should not count it again;
    /// see [`counts_as_failure`](Self::counts_as_failure).
    pub fn is_recorded(&self) -> bool {
        matches!(self, PipelineError::Command(_))
    }

    /// Error classifier for a command layered over a bridge: only errors the
    /// inner breaker has not seen count as failures.
    ///
    /// ```rust
    /// use tower_hystrix_command::CommandConfig;
    /// use tower_hystrix_pipeline::PipelineError;
    ///
    /// let outer = CommandConfig::<String, String, PipelineError<String>>::builder()
    ///     .command("outer")
    ///     .error_classifier(PipelineError::counts_as_failure)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn counts_as_failure(&self) -> bool {
        !self.is_recorded()
    }

    /// Kind of the command error, if this is one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineError::Command(err) => Some(err.kind()),
            PipelineError::Closed => None,
        }
    }

    /// The command error, if this is one.
    pub fn as_command_error(&self) -> Option<&CommandError<E>> {
        match self {
            PipelineError::Command(err) => Some(err),
            PipelineError::Closed => None,
        }
    }

    /// Consumes the error, returning the command error if this is one.
    pub fn into_command_error(self) -> Option<CommandError<E>> {
        match self {
            PipelineError::Command(err) => Some(err),
            PipelineError::Closed => None,
        }
    }
}

impl<E> From<CommandError<E>> for PipelineError<E> {
    fn from(err: CommandError<E>) -> Self {
        PipelineError::Command(err)
    }
}
