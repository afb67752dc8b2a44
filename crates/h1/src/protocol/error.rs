use std::error::Error;
use std::io;
use thiserror::Error;

/// Boxed failure cause returned by a responder.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// The single failure a connection terminates with.
///
/// Every value of this type that leaves [`HttpConnection::process`](crate::connection::HttpConnection::process)
/// has already been handed to the connection's [`ErrorSink`](crate::sink::ErrorSink).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("handler error: {source}")]
    HandlerError { source: BoxError },
}

impl HttpError {
    pub fn protocol_violation<S: ToString>(str: S) -> Self {
        Self::ProtocolViolation { reason: str.to_string() }
    }

    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::HandlerError { source: e.into() }
    }

    /// Returns true when the buffered request body exceeded the configured maximum.
    pub fn is_body_too_large(&self) -> bool {
        matches!(self, HttpError::RequestError { source: ParseError::TooLargeBody { .. } })
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: usize, max_size: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_body(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("response body stream failed: {source}")]
    Body {
        #[from]
        source: BodyError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Failure carried through a chunked body stream, or raised by misuse of one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("body stream aborted: {reason}")]
    Aborted { reason: String },

    #[error("body stream already received its terminal element")]
    Closed,

    #[error("a pull is already outstanding on this body stream")]
    PullInFlight,

    #[error("request body decoding failed: {reason}")]
    Parse { reason: String },
}

impl BodyError {
    pub fn aborted<S: ToString>(str: S) -> Self {
        Self::Aborted { reason: str.to_string() }
    }
}

impl From<&ParseError> for BodyError {
    fn from(e: &ParseError) -> Self {
        Self::Parse { reason: e.to_string() }
    }
}
