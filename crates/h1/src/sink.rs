//! Where connection failures are reported.
//!
//! Every unrecoverable condition of a connection is handed to its
//! [`ErrorSink`] exactly once before the connection closes: responder
//! failures, response stream errors, protocol violations and oversized bodies.

use tracing::error;

use crate::protocol::HttpError;

#[cfg_attr(test, mockall::automock)]
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &HttpError);
}

/// Logs every reported failure at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &HttpError) {
        error!(cause = %error, "connection failure");
    }
}
