//! The underlying path/method router the multiplexer delegates matching to.
//!
//! Registration takes the full `[METHOD ]/path` pattern string. A `{$}`
//! anchor pins the route to an exact match, a trailing slash registers the
//! whole subtree, and multiple methods share one path. Matched placeholder
//! values are copied into the request's extensions as [`PathValues`] before
//! the handler runs.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use http::header::{HeaderValue, ALLOW};
use http::{Method, StatusCode};
use thiserror::Error;

use crate::context::Context;
use crate::serve::{write_plain_error, SinkHandler};
use crate::sink::ResponseSink;
use crate::Request;

// hidden catch-all parameter backing subtree routes; stripped from the
// values handed to handlers
const SUBTREE_PARAM: &str = "subtree_rest_";

/// Path/method router in front of [`matchit::Router`].
#[derive(Default)]
pub struct Router {
    inner: matchit::Router<usize>,
    slots: Vec<Vec<RouteEntry>>,
    index: HashMap<String, usize>,
}

struct RouteEntry {
    method: Option<Method>,
    handler: Arc<dyn SinkHandler>,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route pattern is empty")]
    Empty,

    #[error("invalid method in pattern {0:?}")]
    InvalidMethod(String),

    #[error("path in pattern {0:?} must start with '/'")]
    MissingSlash(String),

    #[error("conflicting route {pattern:?}: {source}")]
    Conflict {
        pattern: String,
        source: matchit::InsertError,
    },

    #[error("duplicate registration for {0:?}")]
    Duplicate(String),
}

/// Splits an optional leading method token off a pattern string.
pub(crate) fn split_method(pattern: &str) -> Result<(Option<Method>, &str), RouteError> {
    match pattern.split_once(' ') {
        Some((m, rest)) if !m.contains('/') => {
            let method =
                Method::from_str(m).map_err(|_| RouteError::InvalidMethod(m.to_owned()))?;
            Ok((Some(method), rest.trim_start_matches(' ')))
        }
        _ => Ok((None, pattern)),
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `pattern`. Registration happens during the
    /// configuration phase only; the router is read-only once serving.
    pub fn route(
        &mut self,
        pattern: &str,
        handler: Arc<dyn SinkHandler>,
    ) -> Result<(), RouteError> {
        if pattern.is_empty() {
            return Err(RouteError::Empty);
        }

        let (method, path) = split_method(pattern)?;
        if !path.starts_with('/') {
            return Err(RouteError::MissingSlash(pattern.to_owned()));
        }

        // translate to the matchit form: anchors pin to an exact route,
        // trailing slashes cover the subtree through a hidden catch-all
        let (exact, subtree) = if let Some(stripped) = path.strip_suffix("/{$}") {
            let exact = if stripped.is_empty() { "/" } else { stripped };
            (exact.to_owned(), None)
        } else if path == "/" {
            ("/".to_owned(), Some(format!("/{{*{SUBTREE_PARAM}}}")))
        } else if path.ends_with('/') {
            (path.to_owned(), Some(format!("{path}{{*{SUBTREE_PARAM}}}")))
        } else {
            (path.to_owned(), None)
        };

        let slot = match self.index.get(path) {
            Some(&slot) => slot,
            None => {
                let slot = self.slots.len();
                self.slots.push(Vec::new());
                self.index.insert(path.to_owned(), slot);

                self.inner.insert(&exact, slot).map_err(|source| RouteError::Conflict {
                    pattern: pattern.to_owned(),
                    source,
                })?;
                if let Some(subtree) = subtree {
                    self.inner.insert(&subtree, slot).map_err(|source| {
                        RouteError::Conflict { pattern: pattern.to_owned(), source }
                    })?;
                }

                slot
            }
        };

        let entries = &mut self.slots[slot];
        if entries.iter().any(|e| e.method == method) {
            return Err(RouteError::Duplicate(pattern.to_owned()));
        }
        entries.push(RouteEntry { method, handler });

        Ok(())
    }

    /// Routes `req` to the registered handler, answering 404 for unmatched
    /// paths and 405 (with `Allow`) for unmatched methods.
    pub async fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request) {
        let path = req.uri().path().to_owned();

        let (slot, values) = match self.inner.at(&path) {
            Ok(matched) => {
                let mut values = PathValues::default();
                for (name, value) in matched.params.iter() {
                    if name != SUBTREE_PARAM {
                        values.insert(name, value);
                    }
                }
                (*matched.value, values)
            }
            Err(_) => {
                write_plain_error(sink, StatusCode::NOT_FOUND, "Not Found");
                return;
            }
        };

        req.extensions_mut().insert(values);

        let method = req.method().clone();
        let entries = &self.slots[slot];
        match pick_entry(entries, &method) {
            Some(entry) => entry.handler.serve_sink(sink, req).await,
            None => {
                if let Some(allow) = allow_header(entries) {
                    sink.headers_mut().insert(ALLOW, allow);
                }
                write_plain_error(sink, StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            }
        }
    }
}

fn method_matches(entry: &Method, req: &Method) -> bool {
    entry == req || (*entry == Method::GET && *req == Method::HEAD)
}

/// Method-specific entries win over method-less ones.
fn pick_entry<'a>(entries: &'a [RouteEntry], method: &Method) -> Option<&'a RouteEntry> {
    entries
        .iter()
        .find(|e| e.method.as_ref().is_some_and(|m| method_matches(m, method)))
        .or_else(|| entries.iter().find(|e| e.method.is_none()))
}

fn allow_header(entries: &[RouteEntry]) -> Option<HeaderValue> {
    let mut methods: Vec<String> =
        entries.iter().filter_map(|e| e.method.as_ref().map(Method::to_string)).collect();
    if methods.is_empty() {
        return None;
    }
    methods.sort();
    methods.dedup();

    HeaderValue::from_str(&methods.join(", ")).ok()
}

/// Placeholder values matched out of the request path, keyed by placeholder
/// name. Stored in the request's extensions by the router.
#[derive(Debug, Clone, Default)]
pub struct PathValues {
    pairs: Vec<(String, String)>,
}

impl PathValues {
    fn insert(&mut self, name: &str, value: &str) {
        self.pairs.push((name.to_owned(), value.to_owned()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Request-side accessors for what the framework stores in extensions.
pub trait RequestExt {
    /// The matched placeholder value named `name`, if the route had one.
    fn path_value(&self, name: &str) -> Option<&str>;

    /// The request's [`Context`], defaulting to an empty one.
    fn context(&self) -> Context;
}

impl RequestExt for Request {
    fn path_value(&self, name: &str) -> Option<&str> {
        self.extensions().get::<PathValues>().and_then(|v| v.get(name))
    }

    fn context(&self) -> Context {
        self.extensions().get::<Context>().cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Recorder;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct Probe(&'static str);

    #[async_trait]
    impl SinkHandler for Probe {
        async fn serve_sink(&self, sink: &mut dyn ResponseSink, req: &mut Request) {
            let id = req.path_value("id").unwrap_or("-").to_owned();
            sink.write_status(StatusCode::OK);
            let _ = sink.write_body(format!("{}:{}:{}", self.0, req.uri().path(), id).as_bytes());
        }
    }

    fn request(method: Method, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .expect("valid request")
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.route("GET /items/{id}", Arc::new(Probe("get"))).unwrap();
        router.route("POST /items/{id}", Arc::new(Probe("post"))).unwrap();
        router.route("/anything/{id}", Arc::new(Probe("any"))).unwrap();
        router.route("/files/", Arc::new(Probe("files"))).unwrap();
        router.route("GET /exact/{$}", Arc::new(Probe("exact"))).unwrap();
        router
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn dispatches_by_path_and_method() {
        let router = router();

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::GET, "/items/42")).await;
        assert_eq!(rec.body_str(), "get:/items/42:42");

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::POST, "/items/42")).await;
        assert_eq!(rec.body_str(), "post:/items/42:42");

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::DELETE, "/anything/7")).await;
        assert_eq!(rec.body_str(), "any:/anything/7:7");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn head_is_served_by_get() {
        let router = router();

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::HEAD, "/items/42")).await;
        assert_eq!(rec.body_str(), "get:/items/42:42");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unknown_path_is_404() {
        let router = router();

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::GET, "/missing")).await;

        assert_eq!(rec.status(), StatusCode::NOT_FOUND);
        assert_eq!(rec.body_str(), "Not Found\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unknown_method_is_405_with_allow() {
        let router = router();

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::DELETE, "/items/42")).await;

        assert_eq!(rec.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(rec.body_str(), "Method Not Allowed\n");
        assert_eq!(rec.headers().get(ALLOW).unwrap(), "GET, POST");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn subtree_matches_nested_paths() {
        let router = router();

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::GET, "/files/a/b/c")).await;
        assert_eq!(rec.body_str(), "files:/files/a/b/c:-");

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::GET, "/files/")).await;
        assert_eq!(rec.body_str(), "files:/files/:-");

        // the prefix itself without the slash is a different route
        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::GET, "/files")).await;
        assert_eq!(rec.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn anchor_pins_to_the_exact_path() {
        let router = router();

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::GET, "/exact")).await;
        assert_eq!(rec.body_str(), "exact:/exact:-");

        let mut rec = Recorder::new();
        router.serve(&mut rec, &mut request(Method::GET, "/exact/nested")).await;
        assert_eq!(rec.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rejects_bad_registrations() {
        let mut router = Router::new();
        assert!(matches!(router.route("", Arc::new(Probe("x"))), Err(RouteError::Empty)));
        assert!(matches!(
            router.route("items", Arc::new(Probe("x"))),
            Err(RouteError::MissingSlash(_))
        ));

        router.route("GET /a", Arc::new(Probe("x"))).unwrap();
        assert!(matches!(
            router.route("GET /a", Arc::new(Probe("y"))),
            Err(RouteError::Duplicate(_))
        ));
    }
}
