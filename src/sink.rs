//! The seam between this crate and the host HTTP runtime.
//!
//! The host hands each request a [`ResponseSink`]: the place status, headers
//! and body bytes eventually go. Everything the framework writes is staged in
//! a [`crate::ResponseBuffer`] first and only reaches the sink on flush.

use std::io;

use bytes::BytesMut;
use http::{HeaderMap, StatusCode};

/// Host-provided response writer. Implementations transmit whatever they are
/// given; ordering and one-status-per-request discipline is the caller's job.
pub trait ResponseSink: Send {
    /// The header map that goes out with the status line.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Records the response status. Called exactly once per request by the
    /// buffered pipeline; later calls may be ignored by the implementation.
    fn write_status(&mut self, status: StatusCode);

    /// Appends body bytes.
    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Pushes buffered transport data toward the client, when the runtime
    /// has such a facility. A no-op otherwise.
    fn flush(&mut self) -> io::Result<()>;
}

/// In-memory [`ResponseSink`] that records everything written to it. Stands
/// in for the host runtime in tests and demos.
#[derive(Debug, Default)]
pub struct Recorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    flushes: usize,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first status written, defaulting to 200 like a real runtime.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The recorded body as text, for assertions.
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("<invalid utf-8>")
    }

    /// How often [`ResponseSink::flush`] was invoked.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl ResponseSink for Recorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        // keep the first one, further calls are superfluous
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
