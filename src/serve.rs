//! The serve adapter: bridges a [`BareHandler`] to the host-compatible
//! `(sink, request)` shape, adding the buffered writer and the error-to-HTTP
//! mapping. This is the one place handler errors are caught; the host
//! runtime never observes them.

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;

use crate::buffer::ResponseBuffer;
use crate::error::{chain_contains, code_of};
use crate::handler::BareHandler;
use crate::logger::Logger;
use crate::sink::ResponseSink;
use crate::Request;

/// Host-compatible request handler: whatever it writes to the sink is the
/// response. Errors are impossible by construction at this level.
#[async_trait]
pub trait SinkHandler: Send + Sync {
    async fn serve_sink(&self, sink: &mut dyn ResponseSink, req: &mut Request);
}

/// Wraps `handler` for the host. Per request the returned handler acquires
/// a pooled [`ResponseBuffer`] over the sink, invokes the bare handler, maps
/// a returned error to a plain-text HTTP response (discarding partial
/// output), and flushes the buffer.
///
/// Error mapping: a framework [`crate::Error`] anywhere in the chain answers
/// with its status and the error's text; a timeout answers 504; everything
/// else is logged through `logger` and answered with a 500.
pub fn to_sink(
    handler: Box<dyn BareHandler>,
    limit: Option<usize>,
    logger: Arc<dyn Logger>,
) -> Box<dyn SinkHandler> {
    Box::new(Buffered { handler, limit, logger })
}

struct Buffered {
    handler: Box<dyn BareHandler>,
    limit: Option<usize>,
    logger: Arc<dyn Logger>,
}

#[async_trait]
impl SinkHandler for Buffered {
    async fn serve_sink(&self, sink: &mut dyn ResponseSink, req: &mut Request) {
        let mut w = ResponseBuffer::new(sink, self.limit);

        if let Err(err) = self.handler.serve_bare(&mut w, req).await {
            // the body was not flushed on this path, so the partial response
            // can still be discarded wholesale
            w.reset();
            w.lift_limit();
            respond_with_error(&mut w, err.as_ref(), self.logger.as_ref());
        }

        if let Err(err) = w.flush_buffer() {
            self.logger.log_implicit_flush_error(&err);
        }
    }
}

/// Adapts a host-native [`SinkHandler`] to the bare shape: it writes through
/// the buffer (so middleware can still inspect or reset the response before
/// the flush) and owns its own status and body; errors cannot occur.
pub(crate) struct SinkBare<S> {
    pub(crate) inner: S,
}

#[async_trait]
impl<S: SinkHandler> crate::handler::BareHandler for SinkBare<S> {
    async fn serve_bare(
        &self,
        w: &mut ResponseBuffer<'_>,
        req: &mut Request,
    ) -> Result<(), crate::error::BoxError> {
        self.inner.serve_sink(w, req).await;
        Ok(())
    }
}

fn respond_with_error(
    w: &mut ResponseBuffer<'_>,
    err: &(dyn StdError + 'static),
    logger: &dyn Logger,
) {
    if let Some(status) = code_of(err).status() {
        write_plain_error(w, status, &err.to_string());
        return;
    }

    if chain_contains::<tokio::time::error::Elapsed>(err) {
        write_plain_error(w, StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout");
        return;
    }

    logger.log_unhandled_serve_error(err);
    write_plain_error(w, StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
}

/// Writes a plain-text error response the way the host ecosystem's error
/// helper does: `text/plain` with charset, `nosniff`, and a trailing
/// newline. Write failures at this point have nowhere to go and are dropped.
pub(crate) fn write_plain_error(sink: &mut dyn ResponseSink, status: StatusCode, msg: &str) {
    let headers = sink.headers_mut();
    headers.insert(CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref().parse().unwrap());
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );

    sink.write_status(status);
    let _ = sink.write_body(msg.as_bytes());
    let _ = sink.write_body(b"\n");
}
