//! Body framing on the wire, per [RFC 9112 section 6](https://www.rfc-editor.org/rfc/rfc9112.html#section-6).
//!
//! Inbound, a [`PayloadDecoder`] turns the bytes after a request head into body
//! fragments and one end marker, whether the body is delimited by
//! `Content-Length`, by chunked transfer coding, or absent. Outbound, a
//! [`PayloadEncoder`] frames response body bytes the same three ways.
//!
//! Fragment boundaries follow the reads from the connection, not the chunk
//! boundaries the client sent.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
