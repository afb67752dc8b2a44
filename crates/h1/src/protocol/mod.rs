//! Core HTTP protocol types.
//!
//! - **Messages** ([`Message`], [`PayloadItem`], [`PayloadSize`]): the inbound
//!   event sequence `Header → Payload(Chunk)* → Payload(Eof)` and the outbound
//!   frame sequence of the same shape
//! - **Heads** ([`RequestHeader`], [`ResponseHead`], [`ResponseHeader`])
//! - **Bodies** ([`body`]): body representation and the chunked body stream
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`], [`BodyError`])

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub(crate) use request::is_chunked;
pub use request::RequestHeader;

mod response;
pub(crate) use response::is_bodiless_status;
pub use response::ResponseHead;
pub use response::ResponseHeader;

mod error;
pub use error::BodyError;
pub use error::BoxError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
