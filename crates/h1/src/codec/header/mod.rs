//! HTTP head processing
//!
//! - [`HeaderDecoder`]: parses request heads from raw bytes, enforcing the
//!   header count and size limits, and decides how the request body is framed
//! - [`HeaderEncoder`]: writes response heads, deriving the `Content-Length` or
//!   `Transfer-Encoding` header from the response body

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
