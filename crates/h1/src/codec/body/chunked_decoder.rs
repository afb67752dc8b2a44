//! Decoder for request bodies sent with chunked transfer encoding,
//! see [RFC 9112 section 7.1](https://www.rfc-editor.org/rfc/rfc9112.html#section-7.1).
//!
//! Chunk boundaries on the wire are not preserved: each call yields whatever
//! part of the current chunk is buffered, so a fragment may be shorter than the
//! chunk the client sent.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// first hex digit of the chunk size
    Start,
    /// further hex digits of the chunk size
    Size,
    /// whitespace after the size
    SizeLws,
    /// `;name=value` chunk extensions, ignored
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    /// trailer fields after the last chunk, ignored
    Trailer,
    TrailerLf,
    EndCr,
    EndLf,
    End,
}

enum Step {
    Next(State),
    Data(usize),
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Start, remaining: 0 }
    }

    fn step(&mut self, byte: u8) -> Result<State, ParseError> {
        use State::*;

        let next = match (self.state, byte) {
            (Start | Size, b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F') => {
                let digit = u64::from(hex_value(byte));
                self.remaining = self
                    .remaining
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| ParseError::invalid_body("chunk size overflow"))?;
                Size
            }
            (Size | SizeLws, b'\t' | b' ') => SizeLws,
            (Size | SizeLws, b';') => Extension,
            (Size | SizeLws | Extension, b'\r') => SizeLf,
            (Extension, b'\n') => return Err(ParseError::invalid_body("chunk extension contains newline")),
            (Extension, _) => Extension,
            (SizeLf, b'\n') if self.remaining == 0 => EndCr,
            (SizeLf, b'\n') => Data,
            (DataCr, b'\r') => DataLf,
            (DataLf, b'\n') => Start,
            (EndCr, b'\r') => EndLf,
            (EndCr | Trailer, b'\r') => TrailerLf,
            (EndCr | Trailer, _) => Trailer,
            (TrailerLf, b'\n') => EndCr,
            (EndLf, b'\n') => End,
            (state, byte) => {
                return Err(ParseError::invalid_body(format!("unexpected byte {byte:#04x} in chunked body state {state:?}")));
            }
        };

        Ok(next)
    }

    fn advance(&mut self, src: &mut BytesMut) -> Result<Option<Step>, ParseError> {
        if self.state == State::Data {
            if self.remaining == 0 {
                return Ok(Some(Step::Next(State::DataCr)));
            }
            if src.is_empty() {
                return Ok(None);
            }
            let len = usize::try_from(self.remaining).map_or(src.len(), |remaining| remaining.min(src.len()));
            return Ok(Some(Step::Data(len)));
        }

        if !src.has_remaining() {
            return Ok(None);
        }
        let byte = src.get_u8();
        self.step(byte).map(|state| Some(Step::Next(state)))
    }
}

fn hex_value(byte: u8) -> u8 {
    match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        _ => byte - b'A' + 10,
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Returns the next body fragment, `Eof` after the terminating chunk, or
    /// `None` when more bytes are needed.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == State::End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            match self.advance(src)? {
                None => return Ok(None),
                Some(Step::Next(state)) => self.state = state,
                Some(Step::Data(len)) => {
                    self.remaining -= len as u64;
                    let bytes = src.split_to(len).freeze();
                    trace!(len = bytes.len(), "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn drain(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> Vec<PayloadItem> {
        let mut items = Vec::new();
        while let Some(item) = decoder.decode(buffer).unwrap() {
            let eof = item.is_eof();
            items.push(item);
            if eof {
                break;
            }
        }
        items
    }

    #[test]
    fn multiple_chunks() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let items = drain(&mut decoder, &mut buffer);

        assert_eq!(
            items,
            vec![
                PayloadItem::Chunk(Bytes::from_static(b"hello")),
                PayloadItem::Chunk(Bytes::from_static(b", world")),
                PayloadItem::Eof
            ]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn extensions_and_trailers_are_skipped() {
        let mut buffer = BytesMut::from(&b"5;ext=value\r\nhello\r\n0\r\nTrailer: value\r\n\r\nGET"[..]);
        let mut decoder = ChunkedDecoder::new();

        let items = drain(&mut decoder, &mut buffer);

        assert_eq!(items, vec![PayloadItem::Chunk(Bytes::from_static(b"hello")), PayloadItem::Eof]);
        assert_eq!(&buffer[..], b"GET");
    }

    #[test]
    fn partial_chunk_yields_partial_fragment() {
        let mut buffer = BytesMut::from(&b"A\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut buffer).unwrap();
        assert_eq!(item, Some(PayloadItem::Chunk(Bytes::from_static(b"hel"))));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"lo worl");
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Chunk(Bytes::from_static(b"lo worl"))));

        buffer.extend_from_slice(b"\r\n0\r\n\r\n");
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }

    #[test]
    fn byte_by_byte_delivery() {
        let wire = b"3\r\nabc\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut buffer = BytesMut::new();
        let mut body = Vec::new();
        let mut eof = false;

        for byte in wire {
            buffer.extend_from_slice(&[*byte]);
            while let Some(item) = decoder.decode(&mut buffer).unwrap() {
                match item {
                    PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                    PayloadItem::Eof => {
                        eof = true;
                        break;
                    }
                }
            }
        }

        assert!(eof);
        assert_eq!(body, b"abc");
    }

    #[test]
    fn invalid_size() {
        let mut buffer = BytesMut::from(&b"xyz\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }

    #[test]
    fn chunk_size_requires_digits() {
        for wire in [&b"\r\n\r\n"[..], b";ext\r\n", b" 5\r\n", b"5\r\nhello\r\n\r\n"] {
            let mut buffer = BytesMut::from(wire);
            let mut decoder = ChunkedDecoder::new();

            let result = loop {
                match decoder.decode(&mut buffer) {
                    Ok(Some(PayloadItem::Chunk(_))) => {}
                    other => break other,
                }
            };

            assert!(result.is_err(), "{wire:?} accepted as {result:?}");
        }
    }

    #[test]
    fn missing_crlf_after_data() {
        let mut buffer = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Chunk(Bytes::from_static(b"hello"))));
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn size_overflow() {
        let mut buffer = BytesMut::from(&b"fffffffffffffffff\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }
}
