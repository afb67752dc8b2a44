//! The responder capability.
//!
//! A [`Handler`] maps one complete request to a response, asynchronously and
//! failably. The connection awaits it while it keeps feeding a streamed
//! request body, so a handler may consume the body as it arrives.
//!
//! Plain async functions become handlers through [`make_handler`]:
//!
//! ```
//! use http::{Request, Response};
//! use micro_h1::handler::make_handler;
//! use micro_h1::protocol::body::Body;
//! use std::convert::Infallible;
//!
//! async fn hello(_request: Request<Body>) -> Result<Response<&'static str>, Infallible> {
//!     Ok(Response::new("hello"))
//! }
//!
//! let handler = make_handler(hello);
//! ```

use async_trait::async_trait;
use std::future::Future;

use http::{Request, Response};

use crate::protocol::BoxError;
use crate::protocol::body::Body;

#[async_trait]
pub trait Handler: Send + Sync {
    type Error: Into<BoxError>;

    async fn call(&self, req: Request<Body>) -> Result<Response<Body>, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Into<Body>,
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Err: Into<BoxError>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type Error = Err;

    async fn call(&self, req: Request<Body>) -> Result<Response<Body>, Self::Error> {
        (self.f)(req).await.map(|response| response.map(Into::into))
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Into<Body>,
    Err: Into<BoxError>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<Body>) -> Ret,
{
    HandlerFn { f }
}
