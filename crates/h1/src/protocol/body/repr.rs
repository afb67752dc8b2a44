use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use http_body::{Frame, SizeHint};

use super::stream::{self, BodySender, BodyStream, StreamItem};
use crate::protocol::{BodyError, PayloadSize};

/// The body of a request or response.
///
/// Exactly one variant describes a given body. Buffered request bodies arrive as
/// `Full`, transfer-chunked request bodies as `Stream`; a responder picks
/// whichever variant suits the response it produces.
#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Full(Bytes),
    Static(&'static [u8]),
    Stream(BodyStream),
}

impl Body {
    pub fn empty() -> Self {
        Body::Empty
    }

    pub fn full<B: Into<Bytes>>(bytes: B) -> Self {
        Body::Full(bytes.into())
    }

    /// Creates a streamed body together with the sender that feeds it.
    pub fn channel() -> (BodySender, Body) {
        let (sender, stream) = stream::channel();
        (sender, Body::Stream(stream))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// How this body is framed when written on the wire.
    pub fn payload_size(&self) -> PayloadSize {
        match self {
            Body::Empty => PayloadSize::Empty,
            Body::Full(bytes) => PayloadSize::new_length(bytes.len() as u64),
            Body::Static(bytes) => PayloadSize::new_length(bytes.len() as u64),
            Body::Stream(_) => PayloadSize::Chunked,
        }
    }

    /// Takes the buffered bytes out of a `Full` or `Static` body, leaving it `Empty`.
    fn take_bytes(&mut self) -> Option<Bytes> {
        match mem::take(self) {
            Body::Full(bytes) => Some(bytes),
            Body::Static(bytes) => Some(Bytes::from_static(bytes)),
            other => {
                *self = other;
                None
            }
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(bytes.into())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Full(s.into())
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Static(s.as_bytes())
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Static(bytes)
    }
}

impl From<BodyStream> for Body {
    fn from(stream: BodyStream) -> Self {
        Body::Stream(stream)
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this {
            Body::Stream(stream) => match ready!(stream.poll_item(cx)) {
                Some(StreamItem::Chunk(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                Some(StreamItem::Error(e)) => Poll::Ready(Some(Err(e))),
                Some(StreamItem::End) | None => Poll::Ready(None),
            },
            _ => Poll::Ready(this.take_bytes().filter(|bytes| !bytes.is_empty()).map(|bytes| Ok(Frame::data(bytes)))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Full(bytes) => bytes.is_empty(),
            Body::Static(bytes) => bytes.is_empty(),
            Body::Stream(stream) => stream.is_closed(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Body::Empty => SizeHint::with_exact(0),
            Body::Full(bytes) => SizeHint::with_exact(bytes.len() as u64),
            Body::Static(bytes) => SizeHint::with_exact(bytes.len() as u64),
            Body::Stream(_) => SizeHint::new(),
        }
    }
}
