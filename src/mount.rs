//! Prefix mounting.
//!
//! A mounted handler owns a whole subtree but sees requests as if it were
//! serving from `/`: the mount prefix is stripped from the path it observes.
//! Middleware wraps outside the strip step and therefore sees the original
//! path. The outer request is never aliased; the handler gets a shallow copy
//! carrying a rewritten URI.

use async_trait::async_trait;
use futures::future::BoxFuture;
use http::uri::{PathAndQuery, Uri};

use crate::buffer::ResponseBuffer;
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{handler_fn, to_bare, BareHandler, Handler};
use crate::mux::Mux;
use crate::router::split_method;
use crate::serve::{SinkBare, SinkHandler};
use crate::Request;

impl Mux {
    /// Mounts a leaf handler under `prefix`; see [`Mux::mount_bare`].
    pub fn mount<H: Handler + 'static>(&mut self, prefix: &str, handler: H) {
        self.mount_bare(prefix, to_bare(handler));
    }

    /// Convenience for [`Mux::mount`] with a plain function.
    pub fn mount_fn<F>(&mut self, prefix: &str, f: F)
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
        self.mount(prefix, handler_fn(f));
    }

    /// Mounts a host-native handler under `prefix`. As with
    /// [`Mux::handle_sink`] the handler owns its own status and body.
    pub fn mount_sink<S: SinkHandler + 'static>(&mut self, prefix: &str, handler: S) {
        self.mount_bare(prefix, SinkBare { inner: handler });
    }

    /// Mounts a bare handler under `prefix` (`/api` or `GET /api`). The
    /// handler receives requests with the prefix stripped from the path (an
    /// empty remainder becomes `/`); both the exact prefix and the whole
    /// subtree route to it. Middleware registered via
    /// [`Mux::use_middleware`] runs outside the strip and sees the original
    /// path.
    ///
    /// # Panics
    ///
    /// Panics on an invalid prefix or a conflicting registration, like the
    /// other registration methods.
    pub fn mount_bare<B: BareHandler + 'static>(&mut self, prefix: &str, handler: B) {
        let (method, path) = match split_method(prefix) {
            Ok(split) => split,
            Err(err) => panic!("micro_mux: cannot mount at {prefix:?}: {err}"),
        };
        if !path.starts_with('/') {
            panic!("micro_mux: cannot mount at {prefix:?}: path must start with '/'");
        }

        let stripped = StripPrefix { prefix: path.to_owned(), inner: Box::new(handler) };
        let pipeline = self.wrap_and_sink(Box::new(stripped));

        let method = method.map(|m| format!("{m} ")).unwrap_or_default();
        let exact = format!("{method}{path}");
        let subtree = format!("{method}{path}/");

        if let Err(err) = self.router_mut().route(&exact, pipeline.clone()) {
            panic!("micro_mux: cannot mount at {prefix:?}: {err}");
        }
        if let Err(err) = self.router_mut().route(&subtree, pipeline) {
            panic!("micro_mux: cannot mount at {prefix:?}: {err}");
        }
    }
}

struct StripPrefix {
    prefix: String,
    inner: Box<dyn BareHandler>,
}

#[async_trait]
impl BareHandler for StripPrefix {
    async fn serve_bare(
        &self,
        w: &mut ResponseBuffer<'_>,
        req: &mut Request,
    ) -> Result<(), BoxError> {
        let mut inner_req = strip_request(req, &self.prefix)?;
        self.inner.serve_bare(w, &mut inner_req).await
    }
}

/// Shallow-copies `req` with `prefix` removed from the URI path. The query
/// is preserved; an empty remainder becomes `/`.
fn strip_request(req: &Request, prefix: &str) -> Result<Request, BoxError> {
    let path = req.uri().path();
    let mut stripped = path.strip_prefix(prefix).unwrap_or(path);
    if stripped.is_empty() {
        stripped = "/";
    }

    let path_and_query = match req.uri().query() {
        Some(query) => format!("{stripped}?{query}"),
        None => stripped.to_owned(),
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>()?);
    let uri = Uri::from_parts(parts)?;

    let mut out = Request::new(req.body().clone());
    *out.method_mut() = req.method().clone();
    *out.uri_mut() = uri;
    *out.version_mut() = req.version();
    *out.headers_mut() = req.headers().clone();
    *out.extensions_mut() = req.extensions().clone();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::bare_fn;
    use crate::router::RequestExt;
    use crate::sink::{Recorder, ResponseSink};
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use std::io::Write as _;

    fn request(method: Method, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .expect("valid request")
    }

    fn api_echo<'a>(
        w: &'a mut ResponseBuffer<'_>,
        req: &'a mut Request,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let path = req.uri().path().to_owned();
            write!(w, "path:{path}")?;
            Ok(())
        })
    }

    async fn serve(mux: &Mux, method: Method, path: &str) -> Recorder {
        let mut rec = Recorder::new();
        mux.serve(&mut rec, &mut request(method, path)).await;
        rec
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn strips_the_prefix_from_sub_paths() {
        let mut mux = Mux::new();
        mux.mount_bare("/api", bare_fn(api_echo));

        let rec = serve(&mux, Method::GET, "/api/users").await;
        assert_eq!(rec.status(), StatusCode::OK);
        assert_eq!(rec.body_str(), "path:/users");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn exact_prefix_becomes_root() {
        let mut mux = Mux::new();
        mux.mount_bare("/api", bare_fn(api_echo));

        let rec = serve(&mux, Method::GET, "/api").await;
        assert_eq!(rec.body_str(), "path:/");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn trailing_slash_becomes_root() {
        let mut mux = Mux::new();
        mux.mount_bare("/api", bare_fn(api_echo));

        let rec = serve(&mux, Method::GET, "/api/").await;
        assert_eq!(rec.body_str(), "path:/");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn deeply_nested_paths_are_stripped_once() {
        let mut mux = Mux::new();
        mux.mount_bare("/api", bare_fn(api_echo));

        let rec = serve(&mux, Method::GET, "/api/v1/users/123").await;
        assert_eq!(rec.body_str(), "path:/v1/users/123");
    }

    fn query_echo<'a>(
        w: &'a mut ResponseBuffer<'_>,
        req: &'a mut Request,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            let path = req.uri().path().to_owned();
            let query = req.uri().query().unwrap_or("").to_owned();
            write!(w, "path:{path},query:{query}")?;
            Ok(())
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn the_query_survives_the_strip() {
        let mut mux = Mux::new();
        mux.mount_bare("/api", bare_fn(query_echo));

        let rec = serve(&mux, Method::GET, "/api/items?page=2&sort=asc").await;
        assert_eq!(rec.body_str(), "path:/items,query:page=2&sort=asc");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn middleware_sees_the_original_path() {
        #[derive(Debug, Clone)]
        struct SeenPath(String);

        struct RecordPath {
            next: Box<dyn BareHandler>,
        }

        #[async_trait]
        impl BareHandler for RecordPath {
            async fn serve_bare(
                &self,
                w: &mut ResponseBuffer<'_>,
                req: &mut Request,
            ) -> Result<(), BoxError> {
                let seen = SeenPath(req.uri().path().to_owned());
                let cx = req.context().with_value(seen);
                req.extensions_mut().insert(cx);
                self.next.serve_bare(w, req).await
            }
        }

        fn echo_both<'a>(
            w: &'a mut ResponseBuffer<'_>,
            req: &'a mut Request,
        ) -> BoxFuture<'a, Result<(), BoxError>> {
            Box::pin(async move {
                let outer = req
                    .context()
                    .value::<SeenPath>()
                    .map(|p| p.0.clone())
                    .unwrap_or_default();
                let inner = req.uri().path().to_owned();
                write!(w, "mw:{outer},handler:{inner}")?;
                Ok(())
            })
        }

        let mut mux = Mux::new();
        mux.use_middleware(|next| Box::new(RecordPath { next }) as Box<dyn BareHandler>);
        mux.mount_bare("/api", bare_fn(echo_both));

        let rec = serve(&mux, Method::GET, "/api/users").await;
        assert_eq!(rec.body_str(), "mw:/api/users,handler:/users");
    }

    fn failing<'a>(
        _w: &'a mut ResponseBuffer<'_>,
        _req: &'a mut Request,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async { Err("something broke".into()) })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn mounted_errors_map_like_any_other() {
        let mut mux = Mux::builder().logger(std::sync::Arc::new(crate::logger::TestLogger::new())).build();
        mux.mount_bare("/api", bare_fn(failing));

        let rec = serve(&mux, Method::GET, "/api/fail").await;
        assert_eq!(rec.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rec.body_str(), "Internal Server Error\n");
    }

    #[test]
    #[should_panic(expected = "cannot register middleware after a route")]
    fn middleware_after_mount_panics() {
        let mut mux = Mux::new();
        mux.mount_bare("/api", bare_fn(api_echo));
        mux.use_middleware(|next| next);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn mounts_coexist_with_routes() {
        fn status_ok<'a>(
            _cx: Context,
            w: &'a mut ResponseBuffer<'_>,
            _req: &'a mut Request,
        ) -> BoxFuture<'a, Result<(), BoxError>> {
            Box::pin(async move {
                w.write(b"ok")?;
                Ok(())
            })
        }

        let mut mux = Mux::new();
        mux.mount_bare("/api", bare_fn(api_echo));
        mux.handle_fn("GET /status", status_ok);

        let rec = serve(&mux, Method::GET, "/status").await;
        assert_eq!(rec.body_str(), "ok");

        let rec = serve(&mux, Method::GET, "/api/things").await;
        assert_eq!(rec.body_str(), "path:/things");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn a_method_prefix_restricts_the_mount() {
        let mut mux = Mux::new();
        mux.mount_bare("GET /api", bare_fn(api_echo));

        let rec = serve(&mux, Method::GET, "/api/users").await;
        assert_eq!(rec.body_str(), "path:/users");

        let rec = serve(&mux, Method::POST, "/api/users").await;
        assert_eq!(rec.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn mount_adapts_leaf_handlers() {
        fn leaf<'a>(
            _cx: Context,
            w: &'a mut ResponseBuffer<'_>,
            req: &'a mut Request,
        ) -> BoxFuture<'a, Result<(), BoxError>> {
            Box::pin(async move {
                let path = req.uri().path().to_owned();
                write!(w, "leaf:{path}")?;
                Ok(())
            })
        }

        let mut mux = Mux::new();
        mux.mount_fn("/admin", leaf);

        let rec = serve(&mux, Method::GET, "/admin/panel").await;
        assert_eq!(rec.body_str(), "leaf:/panel");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn mount_sink_strips_like_the_rest() {
        struct Native;

        #[async_trait]
        impl SinkHandler for Native {
            async fn serve_sink(&self, sink: &mut dyn ResponseSink, req: &mut Request) {
                sink.write_status(StatusCode::OK);
                let _ = sink.write_body(format!("native:{}", req.uri().path()).as_bytes());
            }
        }

        let mut mux = Mux::new();
        mux.mount_sink("/debug", Native);

        let rec = serve(&mux, Method::GET, "/debug/vars").await;
        assert_eq!(rec.body_str(), "native:/vars");
    }
}
