//! HTTP connection handling module
//!
//! One connection is driven by one task. Inbound wire events flow through the
//! request state machine to the responder, and the response flows back through
//! the serializer:
//!
//! ```text
//! RequestDecoder -> RequestAssembler -> Handler -> ResponseSerializer -> ResponseEncoder
//!                          |                ^
//!                          +-- BodyStream --+   (transfer-chunked request bodies)
//! ```
//!
//! # Components
//!
//! - [`HttpConnection`]: the per-connection event loop
//! - [`RequestAssembler`]: the sans-IO state machine that buffers or streams
//!   request bodies and decides when to dispatch
//! - [`ResponseSerializer`]: writes a response as head, body and end-of-message frames

mod http_connection;
mod serializer;
mod state;

pub use http_connection::HttpConnection;
pub use serializer::ResponseSerializer;
pub use state::{ConnectionState, Dispatch, RequestAssembler};
