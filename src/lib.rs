//! Buffered request serving over a path/method router.
//!
//! `micro_mux` wraps a [`matchit`]-backed router and adds four intertwined
//! pieces:
//!
//! - a buffered response writer ([`ResponseBuffer`]) that defers every byte
//!   and header until the handler finishes, so an error can discard partial
//!   output and answer with a clean response instead
//! - error-returning handlers ([`Handler`], [`BareHandler`]) whose errors
//!   are classified by a status-code taxonomy ([`Code`], [`Error`]) and
//!   mapped to well-formed HTTP responses by the serve pipeline
//! - named routes with URL reversal ([`Reverser`], [`Mux::reverse`])
//! - prefix mounting with automatic path rewriting ([`Mux::mount`])
//!
//! The crate does no HTTP parsing and manages no sockets: the host runtime
//! hands [`Mux::serve`] a [`ResponseSink`] and a request, and receives the
//! finished response through the sink. [`Recorder`] is an in-memory sink
//! for tests and demos.
//!
//! Configuration is a phase of its own: register middleware, then routes,
//! then serve. Once the first route is registered the middleware stack is
//! captured, and once serving starts the mux is read-only and may be shared
//! freely across tasks.

mod buffer;
mod context;
mod error;
mod handler;
mod logger;
mod middleware;
mod mount;
mod mux;
mod pattern;
mod reverser;
mod router;
mod serve;
mod sink;

pub use buffer::ResponseBuffer;
pub use context::Context;
pub use error::{code_of, BoxError, BufferFull, Code, Error};
pub use handler::{
    bare_fn, handler_fn, to_bare, BareAdapter, BareFn, BareHandler, Handler, HandlerFn,
};
pub use logger::{Logger, TestLogger, TracingLogger};
pub use middleware::{chain, Middleware};
pub use mux::{Mux, MuxBuilder};
pub use pattern::{BuildError, Pattern, PatternError, Segment};
pub use reverser::{RegisterError, ReverseError, Reverser};
pub use router::{PathValues, RequestExt, RouteError, Router};
pub use serve::{to_sink, SinkHandler};
pub use sink::{Recorder, ResponseSink};

/// The request type handlers receive: the `http` crate's request with an
/// in-memory body. The framework never reads or decodes the body.
pub type Request = http::Request<bytes::Bytes>;
