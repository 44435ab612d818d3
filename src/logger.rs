//! Log sink for the two failure events the serve pipeline cannot surface to
//! anyone else: handler errors that no middleware handled, and flush errors
//! after the handler already returned.

use std::error::Error as StdError;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::error;

/// Receives the serve pipeline's failure events.
pub trait Logger: Send + Sync {
    /// A handler or middleware returned an error that carried no framework
    /// status code; it was answered with a 500.
    fn log_unhandled_serve_error(&self, err: &(dyn StdError + 'static));

    /// Flushing the buffered response to the sink failed after the handler
    /// completed.
    fn log_implicit_flush_error(&self, err: &io::Error);
}

/// Default sink, emitting `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log_unhandled_serve_error(&self, err: &(dyn StdError + 'static)) {
        error!(cause = %err, "error not handled by middleware");
    }

    fn log_implicit_flush_error(&self, err: &io::Error) {
        error!(cause = %err, "error while flushing implicitly");
    }
}

/// Counting sink for assertions in tests.
#[derive(Debug, Default)]
pub struct TestLogger {
    unhandled_serve_errors: AtomicU64,
    implicit_flush_errors: AtomicU64,
}

impl TestLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unhandled_serve_errors(&self) -> u64 {
        self.unhandled_serve_errors.load(Ordering::Relaxed)
    }

    pub fn implicit_flush_errors(&self) -> u64 {
        self.implicit_flush_errors.load(Ordering::Relaxed)
    }
}

impl Logger for TestLogger {
    fn log_unhandled_serve_error(&self, _err: &(dyn StdError + 'static)) {
        self.unhandled_serve_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn log_implicit_flush_error(&self, _err: &io::Error) {
        self.implicit_flush_errors.fetch_add(1, Ordering::Relaxed);
    }
}
