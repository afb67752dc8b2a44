//! HTTP request head handling.
//!
//! [`RequestHeader`] is the immutable request head the connection state machine
//! receives from the decoder: method, target, version and header list. It wraps
//! `http::Request<()>` and adds the framing and connection-management queries
//! the state machine and the connection loop need.

use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, Request, Uri, Version, header};

/// Represents an HTTP request head.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns true if the body is declared transfer-chunked, meaning it is
    /// delimited by an end marker rather than a declared length.
    pub fn is_chunked(&self) -> bool {
        is_chunked(self.headers().get(header::TRANSFER_ENCODING))
    }

    /// Returns true if the client asked for an interim `100 Continue`.
    pub fn expects_continue(&self) -> bool {
        self.headers()
            .get(header::EXPECT)
            .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
    }

    /// Returns whether the client allows the connection to serve another request.
    ///
    /// HTTP/1.1 defaults to persistent connections unless `Connection: close`
    /// is sent; HTTP/1.0 requires an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get(header::CONNECTION);
        match self.version() {
            Version::HTTP_11 => !has_token(connection, b"close"),
            _ => has_token(connection, b"keep-alive"),
        }
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 9112, chunked must be the last encoding if present.
pub(crate) fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value
        && let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next()
    {
        return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
    }
    false
}

fn has_token(header_value: Option<&HeaderValue>, token: &[u8]) -> bool {
    header_value.is_some_and(|value| value.as_bytes().split(|b| *b == b',').any(|t| t.trim_ascii().eq_ignore_ascii_case(token)))
}
