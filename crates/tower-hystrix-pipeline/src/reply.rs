use crate::error::PipelineError;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub(crate) type BodySender<Chunk, E> = mpsc::UnboundedSender<Result<Chunk, PipelineError<E>>>;

/// What a pipeline consumer receives for one request.
#[derive(Debug)]
pub enum Reply<Res, Chunk, E> {
    /// A complete response: the handler's, or a fallback value.
    Full(Res),
    /// A streamed response. Delivered once the first chunk is available
    /// (or at the end of an empty stream).
    Stream {
        head: Res,
        body: ResponseBody<Chunk, E>,
    },
}

impl<Res, Chunk, E> Reply<Res, Chunk, E> {
    /// The full response, or the head of a streamed one.
    pub fn head(&self) -> &Res {
        match self {
            Reply::Full(res) | Reply::Stream { head: res, .. } => res,
        }
    }

    /// Returns true for a streamed response.
    pub fn is_stream(&self) -> bool {
        matches!(self, Reply::Stream { .. })
    }

    /// The full response, discarding a stream.
    pub fn into_full(self) -> Option<Res> {
        match self {
            Reply::Full(res) => Some(res),
            Reply::Stream { .. } => None,
        }
    }

    /// Splits a streamed response into head and body.
    pub fn into_stream(self) -> Option<(Res, ResponseBody<Chunk, E>)> {
        match self {
            Reply::Full(_) => None,
            Reply::Stream { head, body } => Some((head, body)),
        }
    }
}

/// Body of a streamed response.
///
/// Yields chunks in the order they were written. A failure after the stream
/// began arrives as a final `Err` item; the stream then ends.
#[derive(Debug)]
pub struct ResponseBody<Chunk, E> {
    rx: mpsc::UnboundedReceiver<Result<Chunk, PipelineError<E>>>,
}

impl<Chunk, E> ResponseBody<Chunk, E> {
    pub(crate) fn channel() -> (BodySender<Chunk, E>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Receives the next chunk, or `None` at the end of the stream.
    pub async fn recv(&mut self) -> Option<Result<Chunk, PipelineError<E>>> {
        self.rx.recv().await
    }
}

impl<Chunk, E> Stream for ResponseBody<Chunk, E> {
    type Item = Result<Chunk, PipelineError<E>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
