//! Wire codec for HTTP/1.1 messages
//!
//! - [`RequestDecoder`]: decodes inbound bytes into request heads and body
//!   fragments, one head decoder and one payload decoder per request
//! - [`ResponseEncoder`]: encodes response head, body and end-of-message frames
//!
//! Both implement the `tokio_util::codec` traits and are driven through
//! `FramedRead` / `FramedWrite` by the connection.
//!
//! # Example
//!
//! ```
//! use micro_h1::codec::RequestDecoder;
//! use micro_h1::protocol::Message;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET /path HTTP/1.1\r\nHost: localhost\r\n\r\n");
//! let message = decoder.decode(&mut buffer).unwrap();
//! assert!(matches!(message, Some(Message::Header(_))));
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
