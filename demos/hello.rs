//! Getting-started demo: a mux with middleware, named routes and a mount,
//! driven against in-memory sinks.
//!
//! To run this demo:
//! ```bash
//! cargo run --example hello
//! ```

use std::io::Write as _;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use micro_mux::{
    bare_fn, BareHandler, BoxError, Code, Context, Error, Mux, Recorder, Request, RequestExt,
    ResponseBuffer,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn get_item<'a>(
    _cx: Context,
    w: &'a mut ResponseBuffer<'_>,
    req: &'a mut Request,
) -> BoxFuture<'a, Result<(), BoxError>> {
    Box::pin(async move {
        let id = req.path_value("id").unwrap_or_default().to_owned();
        if id == "0" {
            // everything written so far would be discarded
            return Err(Box::new(Error::new(Code::NotFound, "no such item")) as BoxError);
        }

        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        write!(w, "{{\"id\":\"{id}\"}}")?;
        Ok(())
    })
}

fn api_echo<'a>(
    w: &'a mut ResponseBuffer<'_>,
    req: &'a mut Request,
) -> BoxFuture<'a, Result<(), BoxError>> {
    Box::pin(async move {
        let path = req.uri().path().to_owned();
        write!(w, "api sees {path}")?;
        Ok(())
    })
}

struct RequestLog {
    next: Box<dyn BareHandler>,
}

#[async_trait]
impl BareHandler for RequestLog {
    async fn serve_bare(&self, w: &mut ResponseBuffer<'_>, req: &mut Request) -> Result<(), BoxError> {
        info!(method = %req.method(), path = req.uri().path(), "request");
        self.next.serve_bare(w, req).await
    }
}

fn request(method: Method, path: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(path)
        .body(Bytes::new())
        .expect("valid request")
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut mux = Mux::builder().buffer_limit(64 * 1024).build();
    mux.use_middleware(|next| Box::new(RequestLog { next }) as Box<dyn BareHandler>);
    mux.handle_fn_named("GET /items/{id}", get_item, "get-item");
    mux.mount_bare("/api", bare_fn(api_echo));

    for path in ["/items/42", "/items/0", "/api/users", "/missing"] {
        let mut rec = Recorder::new();
        mux.serve(&mut rec, &mut request(Method::GET, path)).await;
        println!("GET {path} -> {} {:?}", rec.status(), rec.body_str());
    }

    let url = mux.reverse("get-item", &["42"]).expect("route is registered");
    println!("reverse(get-item, 42) -> {url}");
}
