use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_hystrix_command::Fallback;
use tower_hystrix_core::{CommandKey, GroupKey};

/// Per-request options supplied by the caller.
///
/// ```rust
/// use tower_hystrix_command::Fallback;
/// use tower_hystrix_pipeline::RequestContext;
///
/// let ctx = RequestContext::<String, String, String>::new()
///     .fallback(Fallback::value("from request".to_string()))
///     .command("search.suggest");
/// ```
pub struct RequestContext<Req, Res, E> {
    pub(crate) fallback: Option<Fallback<Req, Res, E>>,
    pub(crate) command: Option<CommandKey>,
    pub(crate) group: Option<GroupKey>,
}

impl<Req, Res, E> RequestContext<Req, Res, E> {
    /// An empty context: pipeline defaults apply.
    pub fn new() -> Self {
        Self {
            fallback: None,
            command: None,
            group: None,
        }
    }

    /// Fallback for this request only. Takes precedence over every other
    /// fallback.
    pub fn fallback(mut self, fallback: Fallback<Req, Res, E>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Runs this request under a different command key.
    pub fn command<K: Into<CommandKey>>(mut self, command: K) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Group for the command named by [`command`](Self::command).
    pub fn group<G: Into<GroupKey>>(mut self, group: G) -> Self {
        self.group = Some(group.into());
        self
    }
}

impl<Req, Res, E> Default for RequestContext<Req, Res, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res, E> Clone for RequestContext<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            fallback: self.fallback.clone(),
            command: self.command.clone(),
            group: self.group.clone(),
        }
    }
}

impl<Req, Res, E> fmt::Debug for RequestContext<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("fallback", &self.fallback.is_some())
            .field("command", &self.command)
            .field("group", &self.group)
            .finish()
    }
}

/// Fallback state of one in-flight request.
pub(crate) struct ExecutionContext<Req, Res, E> {
    request_fallback: Option<Fallback<Req, Res, E>>,
    pipeline_fallback: Option<Fallback<Req, Res, E>>,
    streaming: AtomicBool,
}

impl<Req, Res, E> ExecutionContext<Req, Res, E> {
    pub(crate) fn new(
        request_fallback: Option<Fallback<Req, Res, E>>,
        pipeline_fallback: Option<Fallback<Req, Res, E>>,
    ) -> Self {
        Self {
            request_fallback,
            pipeline_fallback,
            streaming: AtomicBool::new(false),
        }
    }

    /// Marks the response as committed to the consumer. Returns true the
    /// first time only.
    pub(crate) fn begin_streaming(&self) -> bool {
        !self.streaming.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Request fallback, then pipeline fallback, then the command's own.
    /// Nothing once streaming has begun.
    pub(crate) fn select_fallback(
        &self,
        configured: Option<&Fallback<Req, Res, E>>,
    ) -> Option<Fallback<Req, Res, E>> {
        if self.is_streaming() {
            return None;
        }
        self.request_fallback
            .as_ref()
            .or(self.pipeline_fallback.as_ref())
            .or(configured)
            .cloned()
    }
}
