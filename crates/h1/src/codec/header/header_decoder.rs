//! Request head decoding.
//!
//! [`HeaderDecoder`] parses the request line and header fields with `httparse`
//! and decides how the request body is framed, following
//! [RFC 9112 section 6.3](https://www.rfc-editor.org/rfc/rfc9112.html#section-6.3).
//!
//! A head may use at most [`MAX_HEADER_NUM`] fields and [`MAX_HEADER_BYTES`]
//! bytes; only HTTP/1.0 and HTTP/1.1 are accepted.

use std::mem::MaybeUninit;

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version, header};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader, is_chunked};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes one request head and the [`PayloadSize`] of the body that follows it.
///
/// Returns `Ok(None)` while the head is incomplete. The head bytes are removed
/// from the buffer once decoded; body bytes stay in place.
#[derive(Debug)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers: [MaybeUninit<httparse::Header<'_>>; MAX_HEADER_NUM] = [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut []);

        let status = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e),
        })?;

        let body_offset = match status {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let header = to_request_header(&req)?;
        src.advance(body_offset);

        let payload_size = parse_payload(&header)?;
        trace!(head_size = body_offset, ?payload_size, "decoded request head");

        Ok(Some((header, payload_size)))
    }
}

fn to_request_header(req: &httparse::Request<'_, '_>) -> Result<RequestHeader, ParseError> {
    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        version => return Err(ParseError::InvalidVersion(version)),
    };

    let method = req.method.and_then(|method| Method::from_bytes(method.as_bytes()).ok()).ok_or(ParseError::InvalidMethod)?;
    let uri = req.path.and_then(|path| Uri::try_from(path).ok()).ok_or(ParseError::InvalidUri)?;

    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for field in req.headers.iter() {
        let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(field.value).map_err(ParseError::invalid_header)?;
        headers.append(name, value);
    }

    let mut request = Request::new(());
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.version_mut() = version;
    *request.headers_mut() = headers;

    Ok(RequestHeader::from(request))
}

/// Decides how the request body is framed.
///
/// Framing comes from the headers alone, whatever the method.
///
/// - no framing header: empty
/// - `Transfer-Encoding` ending with `chunked`: chunked
/// - `Content-Length`: that many bytes
///
/// # Errors
///
/// Returns `ParseError` if both framing headers are present, if
/// `Transfer-Encoding` does not end with `chunked`, or if `Content-Length` is
/// not a number.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let transfer_encoding = header.headers().get(header::TRANSFER_ENCODING);
    let content_length = header.headers().get(header::CONTENT_LENGTH);

    match (transfer_encoding, content_length) {
        (None, None) => Ok(PayloadSize::new_empty()),

        (Some(_), None) if is_chunked(transfer_encoding) => Ok(PayloadSize::new_chunked()),

        (Some(_), None) => Err(ParseError::invalid_header("transfer-encoding of a request must end with chunked")),

        (None, Some(value)) => {
            let length = value
                .to_str()
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok())
                .ok_or_else(|| ParseError::invalid_content_length(format!("{value:?} is not a valid length")))?;

            Ok(PayloadSize::new_length(length))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer-encoding and content-length both present")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn body_bytes_stay_in_buffer() {
        let mut buf = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: 127.0.0.1:8080\r\n\r\n123");

        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_some());
        assert_eq!(&buf[..], b"123");
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);

        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), None);

        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::ACCEPT), Some(&HeaderValue::from_static("*/*")));
        assert_eq!(header.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));
        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("curl/7.79.1")));
    }

    #[test]
    fn query_and_repeated_headers() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Accept-Encoding: gzip
        Accept-Encoding: br

        "##};

        let mut buf = BytesMut::from(str);
        let (header, _) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.uri().path(), "/index/");
        assert_eq!(header.uri().query(), Some("a=1&b=2&a=3"));
        let encodings: Vec<_> = header.headers().get_all(http::header::ACCEPT_ENCODING).iter().collect();
        assert_eq!(encodings, vec![&HeaderValue::from_static("gzip"), &HeaderValue::from_static("br")]);
    }

    #[test]
    fn post_with_content_length() {
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world");

        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(11));
        assert_eq!(&buf[..], b"hello world");
    }

    #[test]
    fn post_with_chunked_encoding() {
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");

        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(header.is_chunked());
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn get_body_is_framed_by_headers() {
        let mut buf = BytesMut::from("GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");

        let (_, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn delete_with_chunked_encoding() {
        let mut buf = BytesMut::from("DELETE /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");

        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.method(), &Method::DELETE);
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn conflicting_framing_headers() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n");

        let result = HeaderDecoder.decode(&mut buf);

        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn non_chunked_transfer_encoding_is_rejected() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");

        assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::InvalidHeader { .. })));
    }

    #[test]
    fn invalid_content_length() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n");

        assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn partial_header_needs_more_data() {
        let mut buf = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: 127.0.0.1");

        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_partial_header() {
        let mut buf = BytesMut::from("GET /index.html HTTP/1.1\r\nX-Filler: ");
        buf.extend_from_slice(&vec![b'a'; MAX_HEADER_BYTES]);

        let result = HeaderDecoder.decode(&mut buf);

        assert!(matches!(result, Err(ParseError::TooLargeHeader { .. })));
    }
}
