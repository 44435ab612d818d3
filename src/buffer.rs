//! Buffered response writer.
//!
//! All handler output is staged in memory and only reaches the
//! [`ResponseSink`] on flush. That is what lets the serve pipeline discard a
//! half-written response when a handler errors and answer with a clean one:
//! [`ResponseBuffer::reset`] throws away everything staged so far.
//!
//! Buffers are pooled process-wide; an instance returns its allocation to
//! the free list when dropped, on every exit path.

use std::io;
use std::mem;
use std::sync::{Mutex, PoisonError};

use bytes::BytesMut;
use http::{HeaderMap, StatusCode};

use crate::error::BufferFull;
use crate::sink::ResponseSink;

// allocations kept for reuse; beyond this the buffer is simply dropped
const POOL_KEEP: usize = 64;

static POOL: Mutex<Vec<BytesMut>> = Mutex::new(Vec::new());

fn pool_get() -> BytesMut {
    POOL.lock().unwrap_or_else(PoisonError::into_inner).pop().unwrap_or_default()
}

fn pool_put(mut buf: BytesMut) {
    buf.clear();
    let mut pool = POOL.lock().unwrap_or_else(PoisonError::into_inner);
    if pool.len() < POOL_KEEP {
        pool.push(buf);
    }
}

#[cfg(test)]
pub(crate) fn pool_len() -> usize {
    POOL.lock().unwrap_or_else(PoisonError::into_inner).len()
}

/// A response writer that buffers body bytes up to a configurable cap and
/// defers the status line until [`ResponseBuffer::flush_buffer`].
///
/// Headers "latch" on the first body write or explicit status: after that
/// point status changes are ignored and [`ResponseBuffer::headers_mut`]
/// hands out a map that never reaches the wire, emulating how a
/// conventional response writer silently discards late header mutation.
pub struct ResponseBuffer<'a> {
    sink: &'a mut dyn ResponseSink,
    buf: BytesMut,
    limit: Option<usize>,
    status: StatusCode,
    headers_latched: bool,
    body_flushed: bool,
    discard_headers: Option<HeaderMap>,
}

impl<'a> ResponseBuffer<'a> {
    /// Binds a pooled buffer to `sink`. `limit` caps the buffered body in
    /// bytes; `None` disables the check.
    pub fn new(sink: &'a mut dyn ResponseSink, limit: Option<usize>) -> ResponseBuffer<'a> {
        ResponseBuffer {
            sink,
            buf: pool_get(),
            limit,
            status: StatusCode::OK,
            headers_latched: false,
            body_flushed: false,
            discard_headers: None,
        }
    }

    /// The header map sent to the client. Once headers have latched this
    /// returns a side map whose contents are discarded.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        if self.headers_latched {
            self.discard_headers.get_or_insert_with(HeaderMap::new)
        } else {
            self.sink.headers_mut()
        }
    }

    /// Records the response status and latches headers. Ignored once
    /// headers have latched.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.headers_latched {
            return;
        }
        self.status = status;
        self.headers_latched = true;
    }

    /// The status that will be flushed.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The body bytes staged so far.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Appends `chunk` to the buffered body and latches headers. When a cap
    /// is configured and the chunk would push the buffer past it, the write
    /// fails with [`BufferFull`] and nothing is appended.
    pub fn write(&mut self, chunk: &[u8]) -> Result<usize, BufferFull> {
        if let Some(limit) = self.limit {
            if self.buf.len() + chunk.len() > limit {
                return Err(BufferFull);
            }
        }

        self.headers_latched = true;
        self.buf.extend_from_slice(chunk);

        Ok(chunk.len())
    }

    /// Discards everything staged so far: buffered body, pending headers and
    /// status, and the header latch. The next flush starts from a blank 200
    /// response.
    ///
    /// # Panics
    ///
    /// Panics once the body has been flushed; the response is already in
    /// transport and can no longer be replaced.
    pub fn reset(&mut self) {
        if self.body_flushed {
            panic!("micro_mux: response buffer is already flushed");
        }

        self.sink.headers_mut().clear();
        self.headers_latched = false;
        self.status = StatusCode::OK;
        self.buf.clear();
    }

    /// Writes the recorded status and the drained buffered body to the sink
    /// and marks the body as flushed. Headers latch unconditionally.
    pub fn flush_buffer(&mut self) -> io::Result<()> {
        self.headers_latched = true;
        self.sink.write_status(self.status);

        if !self.buf.is_empty() {
            self.sink.write_body(&self.buf)?;
            self.buf.clear();
        }

        self.body_flushed = true;

        Ok(())
    }

    /// [`ResponseBuffer::flush_buffer`], then asks the sink to push the data
    /// toward the client. Lets handlers opt into streaming boundaries.
    pub fn flush_error(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.sink.flush()
    }

    /// The underlying sink, for probing optional host capabilities.
    pub fn sink_mut(&mut self) -> &mut dyn ResponseSink {
        &mut *self.sink
    }

    // the cap protects against unchecked handler output; the serve pipeline
    // lifts it before composing its own error response
    pub(crate) fn lift_limit(&mut self) {
        self.limit = None;
    }
}

impl Drop for ResponseBuffer<'_> {
    fn drop(&mut self) {
        pool_put(mem::take(&mut self.buf));
    }
}

impl io::Write for ResponseBuffer<'_> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        ResponseBuffer::write(self, chunk).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Lets host-native handlers that expect a [`ResponseSink`] write through
/// the buffer: their output stays buffered and middleware can still reset or
/// inspect it before the real flush.
impl ResponseSink for ResponseBuffer<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        ResponseBuffer::headers_mut(self)
    }

    fn write_status(&mut self, status: StatusCode) {
        self.set_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        ResponseBuffer::write(self, chunk).map(|_| ()).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_error()
    }
}
