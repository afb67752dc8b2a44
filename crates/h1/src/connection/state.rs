//! Request assembly state machine.
//!
//! [`RequestAssembler`] consumes the inbound events of one connection
//! (`on_head`, `on_body_fragment`, `on_end`) and decides when a request is
//! complete enough to hand to the responder:
//!
//! - a bodiless request is dispatched on its end marker
//! - a length-delimited body is buffered up to the configured maximum and
//!   dispatched on its end marker
//! - a transfer-chunked body is dispatched on its first fragment, carrying a
//!   [`BodyStream`](crate::protocol::body::BodyStream) the remaining fragments
//!   are pushed into
//!
//! The assembler does no I/O. It returns a [`Dispatch`] and the caller invokes
//! the responder.

use bytes::{Bytes, BytesMut};
use http::{Method, Request};
use tracing::{trace, warn};

use crate::ensure;
use crate::protocol::body::{Body, BodySender};
use crate::protocol::{BodyError, HttpError, ParseError, RequestHeader};

/// The request-assembly state of a connection; exactly one is active.
#[derive(Debug, Default)]
pub enum ConnectionState {
    /// No request in progress.
    #[default]
    Ready,
    /// Head seen, buffered-or-streamed not decided yet.
    AwaitingHeadOnly(RequestHeader),
    /// Collecting a length-delimited body; the buffer is allocated on the first fragment.
    CollectingBuffered(RequestHeader, Option<BytesMut>),
    /// Pushing a transfer-chunked body into the stream the responder reads.
    ///
    /// The head already travels with the dispatched request, only its method is kept.
    StreamingBody(Method, BodySender),
}

/// A request ready for the responder.
#[derive(Debug)]
pub struct Dispatch {
    request: Request<Body>,
    original_method: Method,
}

impl Dispatch {
    fn new(head: RequestHeader, body: Body) -> Self {
        let mut request = head.body(body);
        let original_method = request.method().clone();

        // the responder generates a HEAD response the way it generates a GET response
        if original_method == Method::HEAD {
            *request.method_mut() = Method::GET;
        }

        Self { request, original_method }
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    /// The method the client sent, before `HEAD` was normalized to `GET`.
    pub fn original_method(&self) -> &Method {
        &self.original_method
    }

    pub fn into_parts(self) -> (Request<Body>, Method) {
        (self.request, self.original_method)
    }
}

#[derive(Debug)]
pub struct RequestAssembler {
    state: ConnectionState,
    max_body_size: usize,
}

impl RequestAssembler {
    pub fn new(max_body_size: usize) -> Self {
        Self { state: ConnectionState::Ready, max_body_size }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ConnectionState::Ready)
    }

    /// Starts a new request.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ProtocolViolation`] if a request is already in
    /// progress; the state is left untouched.
    pub fn on_head(&mut self, head: RequestHeader) -> Result<(), HttpError> {
        ensure!(self.is_ready(), HttpError::protocol_violation(format!("request head received in state {}", self.state_name())));

        trace!(method = %head.method(), uri = %head.uri(), "receive request head");
        self.state = ConnectionState::AwaitingHeadOnly(head);
        Ok(())
    }

    /// Consumes one fragment of the request body.
    ///
    /// Returns a [`Dispatch`] when the fragment is the first one of a
    /// transfer-chunked body.
    ///
    /// # Errors
    ///
    /// - [`HttpError::ProtocolViolation`] if no request is in progress, the
    ///   state is left untouched
    /// - [`ParseError::TooLargeBody`] if the buffered body would exceed the
    ///   configured maximum
    pub fn on_body_fragment(&mut self, bytes: Bytes) -> Result<Option<Dispatch>, HttpError> {
        match std::mem::take(&mut self.state) {
            ConnectionState::Ready => {
                Err(HttpError::protocol_violation(format!("body fragment of {} bytes received without a request head", bytes.len())))
            }

            ConnectionState::AwaitingHeadOnly(head) if head.is_chunked() => {
                let (sender, body) = Body::channel();
                push(&sender, bytes);
                self.state = ConnectionState::StreamingBody(head.method().clone(), sender);
                Ok(Some(Dispatch::new(head, body)))
            }

            ConnectionState::AwaitingHeadOnly(head) => {
                self.state = ConnectionState::CollectingBuffered(head, None);
                self.on_body_fragment(bytes)
            }

            ConnectionState::CollectingBuffered(head, buffer) => {
                let current_size = buffer.as_ref().map_or(0, BytesMut::len);
                let new_size = current_size.saturating_add(bytes.len());
                // dropping the state here releases the buffered bytes
                ensure!(new_size <= self.max_body_size, ParseError::too_large_body(new_size, self.max_body_size).into());

                let mut buffer = buffer.unwrap_or_else(|| BytesMut::with_capacity(bytes.len()));
                buffer.extend_from_slice(&bytes);
                self.state = ConnectionState::CollectingBuffered(head, Some(buffer));
                Ok(None)
            }

            ConnectionState::StreamingBody(method, sender) => {
                push(&sender, bytes);
                self.state = ConnectionState::StreamingBody(method, sender);
                Ok(None)
            }
        }
    }

    /// Completes the current request and returns to [`ConnectionState::Ready`].
    ///
    /// Returns a [`Dispatch`] unless the request was already dispatched as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ProtocolViolation`] if no request is in progress.
    pub fn on_end(&mut self) -> Result<Option<Dispatch>, HttpError> {
        match std::mem::take(&mut self.state) {
            ConnectionState::Ready => Err(HttpError::protocol_violation("end of request received without a request head")),

            ConnectionState::AwaitingHeadOnly(head) => Ok(Some(Dispatch::new(head, Body::empty()))),

            ConnectionState::CollectingBuffered(head, buffer) => {
                let body = buffer.map_or_else(Body::empty, |buffer| Body::Full(buffer.freeze()));
                Ok(Some(Dispatch::new(head, body)))
            }

            ConnectionState::StreamingBody(method, sender) => {
                if let Err(e) = sender.push_end() {
                    warn!(%method, cause = %e, "can't end request body stream");
                }
                Ok(None)
            }
        }
    }

    /// Abandons the current request after an inbound failure.
    ///
    /// A streaming consumer receives `error` as the terminal element of its stream.
    pub fn abort(&mut self, error: BodyError) {
        if let ConnectionState::StreamingBody(method, sender) = std::mem::take(&mut self.state) {
            trace!(%method, cause = %error, "abort request body stream");
            let _ = sender.push_error(error);
        }
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            ConnectionState::Ready => "Ready",
            ConnectionState::AwaitingHeadOnly(_) => "AwaitingHeadOnly",
            ConnectionState::CollectingBuffered(..) => "CollectingBuffered",
            ConnectionState::StreamingBody(..) => "StreamingBody",
        }
    }
}

fn push(sender: &BodySender, bytes: Bytes) {
    if let Err(e) = sender.push_chunk(bytes) {
        warn!(cause = %e, "can't forward request body fragment");
    }
}
