//! Middleware composition over bare handlers.

use crate::handler::BareHandler;

/// Middleware transforms a bare handler into a bare handler.
pub type Middleware = Box<dyn Fn(Box<dyn BareHandler>) -> Box<dyn BareHandler> + Send + Sync>;

/// Wraps `handler` with `middleware`, applied last-to-first: the middleware
/// supplied first becomes the outermost wrapping. It runs first on the way
/// in and last on the way out. An empty slice returns the handler untouched.
pub fn chain(handler: Box<dyn BareHandler>, middleware: &[Middleware]) -> Box<dyn BareHandler> {
    let mut wrapped = handler;
    for mw in middleware.iter().rev() {
        wrapped = mw(wrapped);
    }

    wrapped
}
