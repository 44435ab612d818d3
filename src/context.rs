//! Per-request context.
//!
//! The context is handed to leaf handlers as their first argument instead of
//! being dug out of the request, so middleware can transform it without
//! rewriting the handler's request object. It travels between middleware and
//! handler through the request's extensions.

use http::Extensions;
use tokio_util::sync::CancellationToken;

/// Cloneable request context: a typed value map plus a cancellation token.
///
/// The framework never consults the token itself; handlers that run long
/// operations are expected to honor it. Cloning is cheap, values are shared.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Extensions,
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that is cancelled when `token` is.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { values: Extensions::new(), cancel: token }
    }

    /// The value of type `T` carried by this context, if any.
    pub fn value<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    /// Returns a context that additionally carries `value`, keyed by its
    /// type. An existing value of the same type is replaced.
    pub fn with_value<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.insert(value);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TraceId(&'static str);

    #[test]
    fn carries_typed_values() {
        let cx = Context::new();
        assert!(cx.value::<TraceId>().is_none());

        let cx = cx.with_value(TraceId("abc"));
        assert_eq!(cx.value::<TraceId>(), Some(&TraceId("abc")));

        // clones share the value
        let clone = cx.clone();
        assert_eq!(clone.value::<TraceId>(), Some(&TraceId("abc")));
    }

    #[test]
    fn cancellation_is_observable() {
        let token = CancellationToken::new();
        let cx = Context::with_cancellation(token.clone());

        assert!(!cx.is_cancelled());
        token.cancel();
        assert!(cx.is_cancelled());
    }
}
