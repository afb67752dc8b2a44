//! HTTP response encoder
//!
//! Writes the outbound frame sequence of one response: a head frame, zero or
//! more body frames, and one end-of-message frame. The encoder rejects frames
//! that arrive out of that order.

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, ResponseHeader, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

#[derive(Debug)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<ResponseHeader, D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<ResponseHeader, D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header(header) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let payload_encoder = if header.is_body_omitted() {
                    PayloadEncoder::empty()
                } else if header.is_close_delimited() {
                    PayloadEncoder::until_close()
                } else {
                    PayloadEncoder::from(header.payload_size())
                };
                self.payload_encoder = Some(payload_encoder);
                self.header_encoder.encode(header, dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response head but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);

                if payload_encoder.is_finish() {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PayloadItem, PayloadSize};
    use bytes::Bytes;
    use http::Response;

    type OutboundMessage = Message<ResponseHeader, Bytes>;

    fn head(payload_size: PayloadSize) -> ResponseHeader {
        ResponseHeader::new(Response::builder().body(()).unwrap(), payload_size)
    }

    fn encode_all(messages: Vec<OutboundMessage>) -> String {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        for message in messages {
            encoder.encode(message, &mut dst).unwrap();
        }
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn fixed_length_message() {
        let wire = encode_all(vec![
            Message::Header(head(PayloadSize::Length(5))),
            Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))),
            Message::Payload(PayloadItem::Eof),
        ]);

        assert!(wire.ends_with("content-length: 5\r\n\r\nhello"));
    }

    #[test]
    fn chunked_message() {
        let wire = encode_all(vec![
            Message::Header(head(PayloadSize::Chunked)),
            Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))),
            Message::Payload(PayloadItem::Eof),
        ]);

        assert!(wire.ends_with("transfer-encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n"));
    }

    #[test]
    fn omitted_body_writes_head_only() {
        let wire = encode_all(vec![
            Message::Header(head(PayloadSize::Chunked).omit_body()),
            Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))),
            Message::Payload(PayloadItem::Eof),
        ]);

        assert!(wire.ends_with("transfer-encoding: chunked\r\n\r\n"));
    }

    #[test]
    fn bodiless_status_drops_body() {
        let header = ResponseHeader::new(Response::builder().status(204).body(()).unwrap(), PayloadSize::Length(5));

        let wire = encode_all(vec![
            Message::Header(header),
            Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))),
            Message::Payload(PayloadItem::Eof),
        ]);

        assert!(wire.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
        assert!(!wire.contains("hello"));
    }

    #[test]
    fn close_delimited_body_is_raw() {
        let wire = encode_all(vec![
            Message::Header(head(PayloadSize::Chunked).close_delimited()),
            Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))),
            Message::Payload(PayloadItem::Eof),
        ]);

        assert!(wire.ends_with("\r\n\r\nhello"));
        assert!(!wire.contains("transfer-encoding"));
    }

    #[test]
    fn accept_next_head_after_eof() {
        let wire = encode_all(vec![
            Message::Header(head(PayloadSize::Empty)),
            Message::Payload(PayloadItem::Eof),
            Message::Header(head(PayloadSize::Empty)),
            Message::Payload(PayloadItem::Eof),
        ]);

        assert_eq!(wire.matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[test]
    fn reject_out_of_order_frames() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let result = encoder.encode(OutboundMessage::Payload(PayloadItem::Eof), &mut dst);
        assert!(result.is_err());

        encoder.encode(OutboundMessage::Header(head(PayloadSize::Empty)), &mut dst).unwrap();
        let result = encoder.encode(OutboundMessage::Header(head(PayloadSize::Empty)), &mut dst);
        assert!(result.is_err());
    }
}
