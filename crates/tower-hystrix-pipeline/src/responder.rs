//! The handler-facing side of one request's exchange.

use tokio::sync::mpsc;

/// Events a handler sends back for one request.
#[derive(Debug)]
pub(crate) enum PipeEvent<Res, Chunk, E> {
    Response(Res),
    ResponseStart(Res),
    Data(Chunk),
    End,
    Error(E),
}

pub(crate) type EventSender<Res, Chunk, E> = mpsc::UnboundedSender<PipeEvent<Res, Chunk, E>>;

/// Answers one request.
///
/// A responder is consumed by whichever answer the handler gives: a full
/// response, an error, or the head of a streamed response. Dropping it
/// without answering leaves the request pending until the command timeout.
/// Answers sent after the request has settled are ignored.
#[derive(Debug)]
pub struct Responder<Res, Chunk, E> {
    tx: EventSender<Res, Chunk, E>,
}

impl<Res, Chunk, E> Responder<Res, Chunk, E> {
    pub(crate) fn new(tx: EventSender<Res, Chunk, E>) -> Self {
        Self { tx }
    }

    /// Sends a complete response.
    pub fn respond(self, response: Res) {
        let _ = self.tx.send(PipeEvent::Response(response));
    }

    /// Fails the request.
    pub fn throw(self, error: E) {
        let _ = self.tx.send(PipeEvent::Error(error));
    }

    /// Starts a streamed response with `head`, returning the writer for the
    /// body.
    pub fn stream_response(self, head: Res) -> ResponseWriter<Res, Chunk, E> {
        let _ = self.tx.send(PipeEvent::ResponseStart(head));
        ResponseWriter { tx: self.tx }
    }

    /// Returns true once the request has settled and nothing more will be
    /// read.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Writes the body of a streamed response.
///
/// The first chunk commits the response: from then on a failure is
/// delivered to the consumer as-is and never replaced by a fallback.
#[derive(Debug)]
pub struct ResponseWriter<Res, Chunk, E> {
    tx: EventSender<Res, Chunk, E>,
}

impl<Res, Chunk, E> ResponseWriter<Res, Chunk, E> {
    /// Sends one chunk. Returns false if the request already settled.
    pub fn write(&self, chunk: Chunk) -> bool {
        self.tx.send(PipeEvent::Data(chunk)).is_ok()
    }

    /// Ends the stream.
    pub fn end(self) {
        let _ = self.tx.send(PipeEvent::End);
    }

    /// Fails the stream.
    pub fn throw(self, error: E) {
        let _ = self.tx.send(PipeEvent::Error(error));
    }

    /// Returns true once the request has settled and nothing more will be
    /// read.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
