//! Cached `Date` header values.
//!
//! Formatting an HTTP-date on every response is wasted work when many
//! responses share the same second. [`DateCache`] keeps the last formatted
//! value together with the whole second it was computed for and formats again
//! only when the second changes.
//!
//! The cache is owned by one connection; no state is shared between connections.

use std::time::{SystemTime, UNIX_EPOCH};

use http::HeaderValue;
use httpdate::fmt_http_date;
use tracing::warn;

#[derive(Debug)]
pub struct DateCache {
    // whole seconds since the unix epoch, `None` until the first call
    tick: Option<u64>,
    value: HeaderValue,
}

impl DateCache {
    pub fn new() -> Self {
        Self { tick: None, value: HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT") }
    }

    /// Returns the HTTP-date of the current second.
    pub fn current_timestamp(&mut self) -> &HeaderValue {
        self.current_timestamp_at(SystemTime::now())
    }

    /// Returns the HTTP-date of the second containing `now`.
    pub fn current_timestamp_at(&mut self, now: SystemTime) -> &HeaderValue {
        let tick = now.duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
        if self.tick != Some(tick) {
            match HeaderValue::try_from(fmt_http_date(now)) {
                Ok(value) => {
                    self.value = value;
                    self.tick = Some(tick);
                }
                Err(e) => warn!(cause = %e, "can't format date header, keep previous value"),
            }
        }
        &self.value
    }
}

impl Default for DateCache {
    fn default() -> Self {
        Self::new()
    }
}
