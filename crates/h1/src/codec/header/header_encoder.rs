//! HTTP header encoder implementation for serializing HTTP response heads
//!
//! This module encodes a [`ResponseHeader`] into raw bytes: the status line, the
//! framing headers derived from its [`PayloadSize`], and every header the
//! responder set.
//!
//! Framing headers always describe the body the responder produced, even when
//! the body itself is omitted on the wire (responses to `HEAD`). Statuses that
//! never carry a body (`1xx`, `204`, `304`) and close-delimited bodies get no
//! framing headers at all.

use crate::protocol::{PayloadSize, ResponseHeader, SendError, is_bodiless_status};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");
const ZERO: HeaderValue = HeaderValue::from_static("0");

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<ResponseHeader> for HeaderEncoder {
    type Error = SendError;

    /// Encodes the response head into the provided bytes buffer.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - HTTP version is not HTTP/1.0 or HTTP/1.1
    /// - Writing to buffer fails
    fn encode(&mut self, item: ResponseHeader, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let close_delimited = item.is_close_delimited();
        let (mut head, payload_size) = item.into_parts();

        let version = match head.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", version, head.status().as_str(), head.status().canonical_reason().unwrap_or(""))?;

        // Set appropriate content length or transfer encoding header
        let bodiless = is_bodiless_status(head.status());
        let headers = head.headers_mut();
        match payload_size {
            _ if bodiless || close_delimited => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.remove(header::CONTENT_LENGTH);
            }
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, CHUNKED);
            }
            PayloadSize::Empty => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, ZERO);
            }
        }

        // Write all headers
        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Adapts `BytesMut` to `io::Write` for the `write!` status line.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
