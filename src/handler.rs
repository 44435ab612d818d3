//! Handler contracts.
//!
//! Two shapes exist. [`Handler`] is what applications author: it receives
//! the [`Context`] as its first argument and returns an error that the serve
//! pipeline maps to an HTTP response. [`BareHandler`] is the middleware
//! facing shape without the explicit context parameter; it reads any context
//! it needs from the request. [`to_bare`] converts the former to the latter.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::buffer::ResponseBuffer;
use crate::context::Context;
use crate::error::BoxError;
use crate::Request;

/// Application-facing handler: context first, buffered writer, request.
/// Returning an error discards any partial output and produces a clean
/// error response.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn serve(
        &self,
        cx: Context,
        w: &mut ResponseBuffer<'_>,
        req: &mut Request,
    ) -> Result<(), BoxError>;
}

/// Middleware-facing handler without an explicit context parameter.
#[async_trait]
pub trait BareHandler: Send + Sync {
    async fn serve_bare(&self, w: &mut ResponseBuffer<'_>, req: &mut Request)
        -> Result<(), BoxError>;
}

/// A [`Handler`] built from a `BoxFuture`-returning function.
pub struct HandlerFn<F> {
    f: F,
}

/// Adapts a function to a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a, 'b> Fn(
            Context,
            &'a mut ResponseBuffer<'b>,
            &'a mut Request,
        ) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync,
{
    HandlerFn { f }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a, 'b> Fn(
            Context,
            &'a mut ResponseBuffer<'b>,
            &'a mut Request,
        ) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync,
{
    async fn serve(
        &self,
        cx: Context,
        w: &mut ResponseBuffer<'_>,
        req: &mut Request,
    ) -> Result<(), BoxError> {
        (self.f)(cx, w, req).await
    }
}

/// A [`BareHandler`] built from a `BoxFuture`-returning function.
pub struct BareFn<F> {
    f: F,
}

/// Adapts a function to a [`BareHandler`].
pub fn bare_fn<F>(f: F) -> BareFn<F>
where
    F: for<'a, 'b> Fn(
            &'a mut ResponseBuffer<'b>,
            &'a mut Request,
        ) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync,
{
    BareFn { f }
}

#[async_trait]
impl<F> BareHandler for BareFn<F>
where
    F: for<'a, 'b> Fn(
            &'a mut ResponseBuffer<'b>,
            &'a mut Request,
        ) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync,
{
    async fn serve_bare(
        &self,
        w: &mut ResponseBuffer<'_>,
        req: &mut Request,
    ) -> Result<(), BoxError> {
        (self.f)(w, req).await
    }
}

/// The [`to_bare`] adapter.
pub struct BareAdapter<H> {
    handler: H,
}

/// Converts a leaf [`Handler`] into a [`BareHandler`] that pulls the
/// [`Context`] out of the request's extensions, defaulting to an empty one.
pub fn to_bare<H: Handler>(handler: H) -> BareAdapter<H> {
    BareAdapter { handler }
}

#[async_trait]
impl<H: Handler> BareHandler for BareAdapter<H> {
    async fn serve_bare(
        &self,
        w: &mut ResponseBuffer<'_>,
        req: &mut Request,
    ) -> Result<(), BoxError> {
        let cx = req.extensions().get::<Context>().cloned().unwrap_or_default();
        self.handler.serve(cx, w, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Recorder;
    use bytes::Bytes;

    fn echo_path<'a>(
        _cx: Context,
        w: &'a mut ResponseBuffer<'_>,
        req: &'a mut Request,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let path = req.uri().path().to_owned();
            w.write(path.as_bytes())?;
            Ok(())
        })
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Who(&'static str);

    fn greet<'a>(
        cx: Context,
        w: &'a mut ResponseBuffer<'_>,
        _req: &'a mut Request,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let who = cx.value::<Who>().cloned().unwrap_or(Who("nobody"));
            w.write(who.0.as_bytes())?;
            Ok(())
        })
    }

    fn request(path: &str) -> Request {
        http::Request::builder().uri(path).body(Bytes::new()).expect("valid request")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn handler_fn_serves() {
        let handler = handler_fn(echo_path);
        let mut rec = Recorder::new();
        let mut req = request("/hello");

        {
            let mut w = ResponseBuffer::new(&mut rec, None);
            handler.serve(Context::new(), &mut w, &mut req).await.unwrap();
            w.flush_buffer().unwrap();
        }

        assert_eq!(rec.body_str(), "/hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn to_bare_reads_context_from_request() {
        let bare = to_bare(handler_fn(greet));
        let mut rec = Recorder::new();

        let mut req = request("/");
        req.extensions_mut().insert(Context::new().with_value(Who("alice")));

        {
            let mut w = ResponseBuffer::new(&mut rec, None);
            bare.serve_bare(&mut w, &mut req).await.unwrap();
            w.flush_buffer().unwrap();
        }

        assert_eq!(rec.body_str(), "alice");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn to_bare_defaults_the_context() {
        let bare = to_bare(handler_fn(greet));
        let mut rec = Recorder::new();
        let mut req = request("/");

        {
            let mut w = ResponseBuffer::new(&mut rec, None);
            bare.serve_bare(&mut w, &mut req).await.unwrap();
            w.flush_buffer().unwrap();
        }

        assert_eq!(rec.body_str(), "nobody");
    }
}
