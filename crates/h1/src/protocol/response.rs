//! HTTP response head handling.
//!
//! [`ResponseHead`] is the status line and header list a responder produces. It
//! stays mutable until serialization, when the `Date` header is injected and the
//! framing headers are derived from the body. [`ResponseHeader`] is the head
//! frame handed to the encoder: the head plus how its body is framed.

use http::{Response, StatusCode};

use crate::protocol::PayloadSize;

/// Type alias for HTTP response heads, `http::Response` with an empty body placeholder.
pub type ResponseHead = Response<()>;

/// The head frame of an outbound message.
#[derive(Debug)]
pub struct ResponseHeader {
    head: ResponseHead,
    payload_size: PayloadSize,
    omit_body: bool,
    close_delimited: bool,
}

impl ResponseHeader {
    pub fn new(head: ResponseHead, payload_size: PayloadSize) -> Self {
        Self { head, payload_size, omit_body: false, close_delimited: false }
    }

    /// Keeps the framing headers derived from `payload_size` but writes no body
    /// bytes, as required for responses to `HEAD`.
    #[must_use]
    pub fn omit_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    /// Writes no framing headers; the body ends when the connection closes.
    ///
    /// Used for streamed bodies sent to HTTP/1.0 peers, which cannot read
    /// chunked transfer encoding. The caller must close the connection after
    /// the message.
    #[must_use]
    pub fn close_delimited(mut self) -> Self {
        self.close_delimited = true;
        self
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// True for `HEAD` responses and for statuses that never carry a body.
    pub fn is_body_omitted(&self) -> bool {
        self.omit_body || is_bodiless_status(self.head.status())
    }

    pub fn is_close_delimited(&self) -> bool {
        self.close_delimited
    }

    pub fn into_parts(self) -> (ResponseHead, PayloadSize) {
        (self.head, self.payload_size)
    }
}

/// `1xx`, `204 No Content` and `304 Not Modified` responses end after the head,
/// see [RFC 9112 section 6.3](https://www.rfc-editor.org/rfc/rfc9112.html#section-6.3).
pub(crate) fn is_bodiless_status(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}
