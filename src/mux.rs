//! The multiplexer: ties the reverser, the underlying router, the
//! middleware stack and the buffered serve pipeline together behind one
//! registration surface.
//!
//! Configuration is a distinct phase: middleware first, then routes. The
//! first route registration captures the middleware stack; registering
//! middleware afterwards is a programming error and fails loudly, because a
//! stack that only applies to some routes has no predictable ordering.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::buffer::ResponseBuffer;
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{handler_fn, to_bare, BareHandler, Handler};
use crate::logger::{Logger, TracingLogger};
use crate::middleware::{chain, Middleware};
use crate::reverser::{Reverser, ReverseError};
use crate::router::Router;
use crate::serve::{to_sink, SinkBare, SinkHandler};
use crate::sink::ResponseSink;
use crate::Request;

/// Request multiplexer with buffered, error-returning handlers, named
/// routes, prefix mounting and middleware.
///
/// Build one with [`Mux::new`] or [`Mux::builder`], register middleware and
/// routes, then hand requests to [`Mux::serve`]. All registration must
/// happen before serving begins; the mux is read-only afterwards.
pub struct Mux {
    reverser: Reverser,
    router: Router,
    middleware: Vec<Middleware>,
    captured: bool,
    limit: Option<usize>,
    logger: Arc<dyn Logger>,
}

impl Default for Mux {
    fn default() -> Self {
        Mux::builder().build()
    }
}

impl Mux {
    /// A mux with default settings: no buffer cap, `tracing` logging, fresh
    /// router and reverser.
    pub fn new() -> Mux {
        Mux::default()
    }

    pub fn builder() -> MuxBuilder {
        MuxBuilder::new()
    }

    /// Appends middleware to the stack. The middleware supplied first is
    /// the outermost wrapping around every handler registered later.
    ///
    /// # Panics
    ///
    /// Panics when called after any route was registered.
    pub fn use_middleware<M>(&mut self, middleware: M)
    where
        M: Fn(Box<dyn BareHandler>) -> Box<dyn BareHandler> + Send + Sync + 'static,
    {
        if self.captured {
            panic!("micro_mux: cannot register middleware after a route");
        }
        self.middleware.push(Box::new(middleware));
    }

    /// Registers a leaf handler for `pattern`.
    pub fn handle<H: Handler + 'static>(&mut self, pattern: &str, handler: H) {
        self.register(pattern, None, Box::new(to_bare(handler)));
    }

    /// [`Mux::handle`], additionally registering `pattern` under `name` for
    /// [`Mux::reverse`].
    pub fn handle_named<H: Handler + 'static>(&mut self, pattern: &str, handler: H, name: &str) {
        self.register(pattern, Some(name), Box::new(to_bare(handler)));
    }

    /// Convenience for [`Mux::handle`] with a plain function.
    pub fn handle_fn<F>(&mut self, pattern: &str, f: F)
    where
        F: for<'a, 'b> Fn(
                Context,
                &'a mut ResponseBuffer<'b>,
                &'a mut Request,
            ) -> BoxFuture<'a, Result<(), BoxError>>
            + Send
            + Sync
            + 'static,
    {
        self.handle(pattern, handler_fn(f));
    }

    /// Convenience for [`Mux::handle_named`] with a plain function.
    pub fn handle_fn_named<F>(&mut self, pattern: &str, f: F, name: &str)
    where
        F: for<'a, 'b> Fn(
                Context,
                &'a mut ResponseBuffer<'b>,
                &'a mut Request,
            ) -> BoxFuture<'a, Result<(), BoxError>>
            + Send
            + Sync
            + 'static,
    {
        self.handle_named(pattern, handler_fn(f), name);
    }

    /// Registers a bare handler for `pattern`, skipping the leaf-to-bare
    /// conversion.
    pub fn handle_bare<B: BareHandler + 'static>(&mut self, pattern: &str, handler: B) {
        self.register(pattern, None, Box::new(handler));
    }

    pub fn handle_bare_named<B: BareHandler + 'static>(
        &mut self,
        pattern: &str,
        handler: B,
        name: &str,
    ) {
        self.register(pattern, Some(name), Box::new(handler));
    }

    /// Registers a host-native handler. The response is still buffered and
    /// middleware still runs, but the handler owns its own status and body;
    /// there is no error return to map.
    pub fn handle_sink<S: SinkHandler + 'static>(&mut self, pattern: &str, handler: S) {
        self.register(pattern, None, Box::new(SinkBare { inner: handler }));
    }

    pub fn handle_sink_named<S: SinkHandler + 'static>(
        &mut self,
        pattern: &str,
        handler: S,
        name: &str,
    ) {
        self.register(pattern, Some(name), Box::new(SinkBare { inner: handler }));
    }

    /// Builds the URL for the route named `name`, substituting `vals` for
    /// the pattern's placeholders in order.
    pub fn reverse(&self, name: &str, vals: &[&str]) -> Result<String, ReverseError> {
        self.reverser.reverse(name, vals)
    }

    /// Serves one request by delegating to the underlying router.
    pub async fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request) {
        self.router.serve(sink, req).await;
    }

    pub(crate) fn register(
        &mut self,
        pattern: &str,
        name: Option<&str>,
        handler: Box<dyn BareHandler>,
    ) {
        self.captured = true;

        if let Some(name) = name {
            if let Err(err) = self.reverser.register(name, pattern) {
                panic!("micro_mux: cannot name route {pattern:?}: {err}");
            }
        }

        let wrapped = chain(handler, &self.middleware);
        let pipeline = to_sink(wrapped, self.limit, self.logger.clone());

        if let Err(err) = self.router.route(pattern, Arc::from(pipeline)) {
            panic!("micro_mux: cannot register route {pattern:?}: {err}");
        }
    }

    pub(crate) fn wrap_and_sink(&mut self, handler: Box<dyn BareHandler>) -> Arc<dyn SinkHandler> {
        self.captured = true;

        let wrapped = chain(handler, &self.middleware);
        Arc::from(to_sink(wrapped, self.limit, self.logger.clone()))
    }

    pub(crate) fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }
}

/// Configures a [`Mux`]; see the option table in the crate docs.
pub struct MuxBuilder {
    limit: Option<usize>,
    logger: Arc<dyn Logger>,
    router: Router,
    reverser: Reverser,
}

impl MuxBuilder {
    fn new() -> Self {
        Self {
            limit: None,
            logger: Arc::new(TracingLogger),
            router: Router::new(),
            reverser: Reverser::new(),
        }
    }

    /// Caps the buffered body per response at `limit` bytes. The default is
    /// no cap.
    pub fn buffer_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Removes a previously configured cap.
    pub fn unlimited_buffer(mut self) -> Self {
        self.limit = None;
        self
    }

    /// Replaces the log sink.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces the underlying router. Must be fresh and unshared.
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Replaces the reverser. Must be fresh and unshared.
    pub fn reverser(mut self, reverser: Reverser) -> Self {
        self.reverser = reverser;
        self
    }

    pub fn build(self) -> Mux {
        Mux {
            reverser: self.reverser,
            router: self.router,
            middleware: Vec::new(),
            captured: false,
            limit: self.limit,
            logger: self.logger,
        }
    }
}
