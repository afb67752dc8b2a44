//! Response serialization.
//!
//! [`ResponseSerializer::serialize`] writes exactly one message per response:
//! a head frame carrying a `Date` header, zero or more body frames, and one
//! end-of-message frame.
//!
//! | body | frames | flushes |
//! |---|---|---|
//! | any, request method `HEAD` or status `1xx`/`204`/`304` | head, end | once |
//! | empty | head, end | once |
//! | buffered | head, body, end | once |
//! | stream | head, body per chunk, end | after the head and after every frame |
//!
//! A stream that fails is reported to the error sink and still ends with an
//! end-of-message frame, so the framing stays valid.
//!
//! A stream answering an `HTTP/1.0` head is written close-delimited: no framing
//! headers and raw body bytes. The connection must close after such a message.

use std::sync::Arc;

use bytes::Bytes;
use futures::SinkExt;
use http::{Method, Version, header};
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{trace, warn};

use crate::codec::ResponseEncoder;
use crate::date::DateCache;
use crate::protocol::body::{Body, BodyStream, StreamItem};
use crate::protocol::{HttpError, Message, PayloadItem, ResponseHead, ResponseHeader, SendError};
use crate::sink::ErrorSink;

type OutboundMessage = Message<ResponseHeader, Bytes>;

pub struct ResponseSerializer<W> {
    framed_write: FramedWrite<W, ResponseEncoder>,
    date_cache: DateCache,
    sink: Arc<dyn ErrorSink>,
}

impl<W> ResponseSerializer<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W, sink: Arc<dyn ErrorSink>) -> Self {
        Self { framed_write: FramedWrite::new(writer, ResponseEncoder::new()), date_cache: DateCache::new(), sink }
    }

    pub fn set_error_sink(&mut self, sink: Arc<dyn ErrorSink>) {
        self.sink = sink;
    }

    /// The underlying writer, for interim responses written outside a message.
    pub fn get_mut(&mut self) -> &mut W {
        self.framed_write.get_mut()
    }

    /// Writes one response.
    ///
    /// `original_method` is the method the client sent; a `HEAD` request gets
    /// the framing headers of `body` but none of its bytes. A stream body under
    /// an `HTTP/1.0` head is sent close-delimited.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if writing to the connection fails. A failing
    /// response stream is not an error here, it is reported to the error sink.
    pub async fn serialize(&mut self, mut head: ResponseHead, body: Body, original_method: &Method) -> Result<(), SendError> {
        head.headers_mut().insert(header::DATE, self.date_cache.current_timestamp().clone());
        let close_delimited = head.version() == Version::HTTP_10 && body.is_stream();
        let mut header = ResponseHeader::new(head, body.payload_size());
        if close_delimited {
            header = header.close_delimited();
        }
        if original_method == Method::HEAD {
            header = header.omit_body();
        }

        if header.is_body_omitted() {
            trace!(status = %header.head().status(), "omit response body");
            self.framed_write.feed(OutboundMessage::Header(header)).await?;
            return self.framed_write.send(OutboundMessage::Payload(PayloadItem::Eof)).await;
        }

        match body {
            Body::Empty => self.write_buffered(header, Bytes::new()).await,
            Body::Full(bytes) => self.write_buffered(header, bytes).await,
            Body::Static(bytes) => self.write_buffered(header, Bytes::from_static(bytes)).await,
            Body::Stream(stream) => self.write_stream(header, stream).await,
        }
    }

    async fn write_buffered(&mut self, header: ResponseHeader, bytes: Bytes) -> Result<(), SendError> {
        self.framed_write.feed(OutboundMessage::Header(header)).await?;
        if !bytes.is_empty() {
            self.framed_write.feed(OutboundMessage::Payload(PayloadItem::Chunk(bytes))).await?;
        }
        self.framed_write.send(OutboundMessage::Payload(PayloadItem::Eof)).await
    }

    async fn write_stream(&mut self, header: ResponseHeader, mut stream: BodyStream) -> Result<(), SendError> {
        self.framed_write.send(OutboundMessage::Header(header)).await?;

        while let Some(item) = stream.next_item().await {
            match item {
                StreamItem::Chunk(bytes) => {
                    self.framed_write.send(OutboundMessage::Payload(PayloadItem::Chunk(bytes))).await?;
                }
                StreamItem::End => break,
                StreamItem::Error(e) => {
                    warn!(cause = %e, "response body stream failed, end message early");
                    self.sink.report(&HttpError::from(SendError::from(e)));
                    break;
                }
            }
        }

        self.framed_write.send(OutboundMessage::Payload(PayloadItem::Eof)).await
    }
}

impl<W> std::fmt::Debug for ResponseSerializer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSerializer").field("date_cache", &self.date_cache).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::BodyError;
    use crate::sink::{LogErrorSink, MockErrorSink};
    use http::{Response, StatusCode};

    fn head(status: StatusCode) -> ResponseHead {
        Response::builder().status(status).body(()).unwrap()
    }

    async fn serialize_with(sink: Arc<dyn ErrorSink>, head: ResponseHead, body: Body, method: &Method) -> String {
        let mut output = Vec::new();
        let mut serializer = ResponseSerializer::new(&mut output, sink);
        serializer.serialize(head, body, method).await.unwrap();
        drop(serializer);
        String::from_utf8(output).unwrap()
    }

    async fn serialize(head: ResponseHead, body: Body, method: &Method) -> String {
        serialize_with(Arc::new(LogErrorSink), head, body, method).await
    }

    #[tokio::test]
    async fn buffered_body_with_date() {
        let wire = serialize(head(StatusCode::OK), Body::from("GET /path"), &Method::GET).await;

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("date: "));
        assert!(wire.contains("content-length: 9\r\n"));
        assert!(wire.ends_with("\r\n\r\nGET /path"));
    }

    #[tokio::test]
    async fn empty_body_completes_framing() {
        let wire = serialize(head(StatusCode::OK), Body::empty(), &Method::GET).await;

        assert!(wire.contains("content-length: 0\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn head_request_never_carries_body() {
        let wire = serialize(head(StatusCode::OK), Body::from("hello"), &Method::HEAD).await;

        assert!(wire.contains("content-length: 5\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
        assert!(!wire.contains("hello"));
    }

    #[tokio::test]
    async fn head_request_drops_response_stream() {
        let (sender, body) = Body::channel();
        sender.push_chunk(Bytes::from_static(b"hello")).unwrap();

        let wire = serialize(head(StatusCode::OK), body, &Method::HEAD).await;

        assert!(wire.contains("transfer-encoding: chunked\r\n"));
        assert!(!wire.contains("hello"));
        assert!(sender.is_released());
    }

    #[tokio::test]
    async fn not_modified_drops_body() {
        let wire = serialize(head(StatusCode::NOT_MODIFIED), Body::from("stale"), &Method::GET).await;

        assert!(wire.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(!wire.contains("content-length"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn http_10_stream_is_close_delimited() {
        let (sender, body) = Body::channel();
        sender.push_chunk(Bytes::from_static(b"hello")).unwrap();
        sender.push_chunk(Bytes::from_static(b" world")).unwrap();
        sender.push_end().unwrap();
        let head = Response::builder().version(Version::HTTP_10).body(()).unwrap();

        let wire = serialize(head, body, &Method::GET).await;

        assert!(wire.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(!wire.contains("transfer-encoding"));
        assert!(!wire.contains("content-length"));
        assert!(wire.ends_with("\r\n\r\nhello world"));
    }

    #[tokio::test]
    async fn stream_body_is_chunked() {
        let (sender, body) = Body::channel();
        let producer = tokio::spawn(async move {
            sender.push_chunk(Bytes::from_static(b"hello")).unwrap();
            tokio::task::yield_now().await;
            sender.push_chunk(Bytes::from_static(b" world")).unwrap();
            sender.push_end().unwrap();
        });

        let wire = serialize(head(StatusCode::OK), body, &Method::GET).await;
        producer.await.unwrap();

        assert!(wire.contains("transfer-encoding: chunked\r\n"));
        assert!(wire.ends_with("\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn stream_with_only_end_yields_head_and_end() {
        let (sender, body) = Body::channel();
        sender.push_end().unwrap();

        let wire = serialize(head(StatusCode::OK), body, &Method::GET).await;

        assert!(wire.ends_with("transfer-encoding: chunked\r\n\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn stream_error_is_reported_and_message_terminated() {
        let mut sink = MockErrorSink::new();
        sink.expect_report()
            .withf(|error| matches!(error, HttpError::ResponseError { source: SendError::Body { .. } }))
            .times(1)
            .return_const(());

        let (sender, body) = Body::channel();
        sender.push_chunk(Bytes::from_static(b"par")).unwrap();
        sender.push_error(BodyError::aborted("backend gone")).unwrap();

        let wire = serialize_with(Arc::new(sink), head(StatusCode::OK), body, &Method::GET).await;

        assert!(wire.ends_with("\r\n\r\n3\r\npar\r\n0\r\n\r\n"));
    }
}
