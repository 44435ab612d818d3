//! Error taxonomy for the buffered serving pipeline.
//!
//! Handlers return [`BoxError`]; a handler that wants to control the HTTP
//! status wraps its cause in an [`Error`] built from a [`Code`]. The serve
//! adapter recovers the code from arbitrarily wrapped chains with
//! [`code_of`] and maps everything else to a 500.

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use thiserror::Error as ThisError;

/// Boxed error type used at every handler boundary.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Returned by [`crate::ResponseBuffer::write`] when appending would push the
/// buffered body past the configured cap. The write is rejected whole; no
/// bytes are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("buffer is full")]
pub struct BufferFull;

/// Status code carried by an [`Error`]. Mirrors the HTTP client-error and
/// server-error status numbers, with [`Code::Unknown`] standing in for "no
/// code attached".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Code {
    Unknown = 0,

    BadRequest = 400,
    Unauthorized = 401,
    PaymentRequired = 402,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    NotAcceptable = 406,
    ProxyAuthRequired = 407,
    RequestTimeout = 408,
    Conflict = 409,
    Gone = 410,
    LengthRequired = 411,
    PreconditionFailed = 412,
    PayloadTooLarge = 413,
    UriTooLong = 414,
    UnsupportedMediaType = 415,
    RangeNotSatisfiable = 416,
    ExpectationFailed = 417,
    ImATeapot = 418,
    MisdirectedRequest = 421,
    UnprocessableEntity = 422,
    Locked = 423,
    FailedDependency = 424,
    TooEarly = 425,
    UpgradeRequired = 426,
    PreconditionRequired = 428,
    TooManyRequests = 429,
    RequestHeaderFieldsTooLarge = 431,
    UnavailableForLegalReasons = 451,

    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
    HttpVersionNotSupported = 505,
    VariantAlsoNegotiates = 506,
    InsufficientStorage = 507,
    LoopDetected = 508,
    NotExtended = 510,
    NetworkAuthenticationRequired = 511,
}

impl Code {
    /// The numeric status, 0 for [`Code::Unknown`].
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Looks a code up by its numeric status.
    pub fn from_u16(value: u16) -> Option<Code> {
        use Code::*;

        Some(match value {
            0 => Unknown,
            400 => BadRequest,
            401 => Unauthorized,
            402 => PaymentRequired,
            403 => Forbidden,
            404 => NotFound,
            405 => MethodNotAllowed,
            406 => NotAcceptable,
            407 => ProxyAuthRequired,
            408 => RequestTimeout,
            409 => Conflict,
            410 => Gone,
            411 => LengthRequired,
            412 => PreconditionFailed,
            413 => PayloadTooLarge,
            414 => UriTooLong,
            415 => UnsupportedMediaType,
            416 => RangeNotSatisfiable,
            417 => ExpectationFailed,
            418 => ImATeapot,
            421 => MisdirectedRequest,
            422 => UnprocessableEntity,
            423 => Locked,
            424 => FailedDependency,
            425 => TooEarly,
            426 => UpgradeRequired,
            428 => PreconditionRequired,
            429 => TooManyRequests,
            431 => RequestHeaderFieldsTooLarge,
            451 => UnavailableForLegalReasons,
            500 => InternalServerError,
            501 => NotImplemented,
            502 => BadGateway,
            503 => ServiceUnavailable,
            504 => GatewayTimeout,
            505 => HttpVersionNotSupported,
            506 => VariantAlsoNegotiates,
            507 => InsufficientStorage,
            508 => LoopDetected,
            510 => NotExtended,
            511 => NetworkAuthenticationRequired,
            _ => return None,
        })
    }

    /// The `http::StatusCode` equivalent, `None` for [`Code::Unknown`].
    pub fn status(self) -> Option<StatusCode> {
        StatusCode::from_u16(self.as_u16()).ok()
    }

    /// Canonical status text, "Unknown" when there is none.
    pub fn text(self) -> &'static str {
        self.status().and_then(|s| s.canonical_reason()).unwrap_or("Unknown")
    }
}

/// An error that pairs a [`Code`] with the cause it wraps. The serve adapter
/// turns it into a plain-text response of that status; anything in between
/// may wrap it further without losing the code.
#[derive(Debug)]
pub struct Error {
    code: Code,
    cause: BoxError,
}

impl Error {
    /// Pairs `code` with the wrapped `cause`.
    pub fn new(code: Code, cause: impl Into<BoxError>) -> Self {
        Self { code, cause: cause.into() }
    }

    pub fn code(&self) -> Code {
        self.code
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.text(), self.cause)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Walks the `source()` chain of `err` looking for a framework [`Error`] and
/// returns its code, or [`Code::Unknown`] when the chain holds none.
pub fn code_of(err: &(dyn StdError + 'static)) -> Code {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if let Some(framework) = e.downcast_ref::<Error>() {
            return framework.code();
        }
        cur = e.source();
    }

    Code::Unknown
}

/// True when the chain of `err` contains a `T`.
pub(crate) fn chain_contains<T: StdError + 'static>(err: &(dyn StdError + 'static)) -> bool {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if e.downcast_ref::<T>().is_some() {
            return true;
        }
        cur = e.source();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, ThisError)]
    #[error("wrapped: {source}")]
    struct Wrapped {
        source: Error,
    }

    #[test]
    fn code_roundtrip() {
        assert_eq!(Code::BadRequest.as_u16(), 400);
        assert_eq!(Code::from_u16(400), Some(Code::BadRequest));
        assert_eq!(Code::from_u16(511), Some(Code::NetworkAuthenticationRequired));
        assert_eq!(Code::from_u16(0), Some(Code::Unknown));
        assert_eq!(Code::from_u16(399), None);
        assert_eq!(Code::from_u16(900), None);
    }

    #[test]
    fn display_uses_status_text() {
        let err = Error::new(Code::BadRequest, "foo");
        assert_eq!(err.code(), Code::BadRequest);
        assert_eq!(err.to_string(), "Bad Request: foo");

        let err = Error::new(Code::Unknown, "rab");
        assert_eq!(err.to_string(), "Unknown: rab");
    }

    #[test]
    fn code_of_finds_code_through_wrapping() {
        let inner = Error::new(Code::Forbidden, "nope");
        let outer = Wrapped { source: inner };
        assert_eq!(code_of(&outer), Code::Forbidden);
    }

    #[test]
    fn code_of_is_unknown_without_framework_error() {
        let plain = std::io::Error::other("bar");
        assert_eq!(code_of(&plain), Code::Unknown);
    }

    #[test]
    fn buffer_full_is_matchable() {
        let err: BoxError = Box::new(BufferFull);
        assert!(chain_contains::<BufferFull>(err.as_ref()));
        assert_eq!(err.to_string(), "buffer is full");
    }
}
