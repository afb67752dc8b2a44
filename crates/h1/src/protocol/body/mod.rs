//! Request and response bodies.
//!
//! - [`Body`]: the body representation shared by requests and responses:
//!   empty, a single buffer, a static byte string, or a chunked stream
//! - [`BodySender`] / [`BodyStream`]: the producer and consumer halves of a
//!   chunked body stream, created by [`channel`]
//!
//! A chunked body stream is a single-producer/single-consumer queue of
//! [`StreamItem`]s with at most one outstanding pull. It carries transfer-chunked
//! request bodies from the connection to the responder, and streamed response
//! bodies from the responder to the serializer.

mod repr;
mod stream;

pub use repr::Body;
pub use stream::{BodySender, BodyStream, StreamItem, channel};
