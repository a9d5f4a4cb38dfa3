use crate::error::CommandError;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type FallbackFn<Req, Res, E> =
    dyn Fn(CommandError<E>, Req) -> BoxFuture<'static, Result<Res, E>> + Send + Sync;

/// Substitute result for a command that was denied, timed out or failed.
///
/// A fallback receives the error and the original request. If it succeeds
/// its value replaces the error; if it fails, its error is surfaced as
/// [`CommandError::Fallback`].
pub struct Fallback<Req, Res, E> {
    f: Arc<FallbackFn<Req, Res, E>>,
}

impl<Req, Res, E> Fallback<Req, Res, E>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    /// Creates a fallback from an async function.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tower_hystrix_command::Fallback;
    ///
    /// let fallback = Fallback::<String, String, String>::new(|err, req| async move {
    ///     Ok(format!("{req} unavailable: {err}"))
    /// });
    /// ```
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CommandError<E>, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |error, request| Box::pin(f(error, request))),
        }
    }

    /// A fallback that always returns a clone of `value`.
    pub fn value(value: Res) -> Self
    where
        Res: Clone + Sync,
    {
        Self::new(move |_, _| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// A fallback computed synchronously from the error and request.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CommandError<E>, &Req) -> Result<Res, E> + Send + Sync + 'static,
    {
        Self::new(move |error, request| {
            let result = f(&error, &request);
            async move { result }
        })
    }
}

impl<Req, Res, E> Fallback<Req, Res, E> {
    /// Runs the fallback for `error` and `request`.
    pub fn call(&self, error: CommandError<E>, request: Req) -> BoxFuture<'static, Result<Res, E>> {
        (self.f)(error, request)
    }
}

impl<Req, Res, E> Clone for Fallback<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<Req, Res, E> fmt::Debug for Fallback<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback").finish_non_exhaustive()
    }
}
