//! The per-connection core of an asynchronous HTTP/1.1 server
//!
//! This crate turns the byte stream of one accepted connection into requests
//! for an application-supplied responder, and writes the responses back with
//! correct HTTP/1.1 framing. It is built on tokio and `tokio_util::codec`.
//!
//! # Features
//!
//! - Request bodies buffered up to a configurable maximum, or streamed to the
//!   responder while they arrive when sent with chunked transfer encoding
//! - Buffered, static or streamed response bodies
//! - `HEAD` responses with framing headers and no body
//! - Cached `Date` header per connection
//! - Keep-alive connections and the expect-continue mechanism
//! - A pluggable error sink receiving every failure that closes a connection
//!
//! # Example
//!
//! ```no_run
//! use http::{Request, Response, StatusCode};
//! use http_body_util::BodyExt;
//! use micro_h1::connection::HttpConnection;
//! use micro_h1::handler::make_handler;
//! use micro_h1::protocol::BoxError;
//! use micro_h1::protocol::body::Body;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             if connection.process(handler).await.is_ok() {
//!                 info!("finished process, connection shutdown");
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request<Body>) -> Result<Response<Body>, BoxError> {
//!     let body = request.into_body().collect().await?.to_bytes();
//!     info!(size = body.len(), "receiving request body");
//!
//!     let response = Response::builder().status(StatusCode::OK).body(Body::from("Hello World!\r\n"))?;
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: decodes inbound bytes into request events, encodes response frames
//! - [`protocol`]: heads, bodies, the chunked body stream and error types
//! - [`connection`]: the request state machine, the response serializer and the
//!   connection loop tying them together
//! - [`handler`]: the responder capability
//! - [`date`], [`sink`], [`config`]: `Date` header cache, failure reporting and
//!   connection settings
//!
//! # Error Handling
//!
//! Every failure is local to its connection. It is reported once to the
//! connection's [`sink::ErrorSink`] and returned from
//! [`connection::HttpConnection::process`] as a [`protocol::HttpError`]; the
//! connection is closed. A body larger than the configured maximum and a
//! failing responder close the connection without writing a response.
//!
//! # Limitations
//!
//! - HTTP/1.x only, one request in flight per connection
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod date;
pub mod handler;
pub mod protocol;
pub mod sink;

mod utils;
pub(crate) use utils::ensure;
