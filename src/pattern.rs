//! Route pattern parsing.
//!
//! A pattern is `[METHOD ]/segment(/segment)*` where a segment is literal
//! text, a `{name}` placeholder, or the terminal `{$}` anchor that pins the
//! pattern to an exact match. Parsed patterns feed the reverser; the grammar
//! is the one the underlying router matches on.

use std::fmt;
use std::str::FromStr;

use http::Method;
use thiserror::Error;

/// One path segment of a parsed [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, matched verbatim.
    Literal(String),
    /// A named placeholder, `{name}`.
    Param(String),
    /// The `{$}` anchor; only valid as the last segment.
    Anchor,
}

/// A parsed route pattern: an optional method and an ordered segment list.
/// Immutable once parsed; placeholder names are unique within a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    method: Option<Method>,
    segments: Vec<Segment>,
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("path must start with '/'")]
    MissingSlash,

    #[error("pattern has an empty segment")]
    EmptySegment,

    #[error("invalid literal segment {0:?}")]
    InvalidLiteral(String),

    #[error("invalid placeholder name {0:?}")]
    InvalidParamName(String),

    #[error("duplicate placeholder name {0:?}")]
    DuplicateParam(String),

    #[error("{{$}} must be the last segment")]
    AnchorNotLast,
}

/// Raised by [`Pattern::build`] when the supplied values do not line up with
/// the pattern's placeholders.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("not enough values, pattern has more placeholders")]
    NotEnoughValues,

    #[error("too many values, pattern has fewer placeholders")]
    TooManyValues,
}

fn is_literal(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'%' | b'-'))
}

fn is_ident(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl Pattern {
    /// Parses a pattern string. See the module docs for the grammar.
    pub fn parse(s: &str) -> Result<Pattern, PatternError> {
        if s.is_empty() {
            return Err(PatternError::Empty);
        }

        let (method, path) = match s.split_once(' ') {
            Some((m, rest)) => {
                let method =
                    Method::from_str(m).map_err(|_| PatternError::InvalidMethod(m.to_owned()))?;
                (Some(method), rest.trim_start_matches(' '))
            }
            None => (None, s),
        };

        let Some(rest) = path.strip_prefix('/') else {
            return Err(PatternError::MissingSlash);
        };

        let mut segments = Vec::new();
        if rest.is_empty() {
            // the bare "/" pattern
            return Ok(Pattern { method, segments });
        }

        let mut names: Vec<&str> = Vec::new();
        for seg in rest.split('/') {
            if segments.last() == Some(&Segment::Anchor) {
                return Err(PatternError::AnchorNotLast);
            }

            match seg {
                "" => return Err(PatternError::EmptySegment),
                "{$}" => segments.push(Segment::Anchor),
                s if s.starts_with('{') && s.ends_with('}') => {
                    let name = &s[1..s.len() - 1];
                    if !is_ident(name) {
                        return Err(PatternError::InvalidParamName(name.to_owned()));
                    }
                    if names.contains(&name) {
                        return Err(PatternError::DuplicateParam(name.to_owned()));
                    }
                    names.push(name);
                    segments.push(Segment::Param(name.to_owned()));
                }
                s => {
                    if !is_literal(s) {
                        return Err(PatternError::InvalidLiteral(s.to_owned()));
                    }
                    segments.push(Segment::Literal(s.to_owned()));
                }
            }
        }

        Ok(Pattern { method, segments })
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The number of placeholder segments, which is the number of values
    /// [`Pattern::build`] consumes.
    pub fn param_count(&self) -> usize {
        self.segments.iter().filter(|s| matches!(s, Segment::Param(_))).count()
    }

    /// Assembles a URL path from the pattern, consuming one value per
    /// placeholder in appearance order. Values are emitted verbatim; callers
    /// URL-encode if they need to. The anchor emits a trailing `/`.
    pub fn build(&self, vals: &[&str]) -> Result<String, BuildError> {
        let mut out = String::new();
        let mut vals = vals.iter();

        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => {
                    out.push('/');
                    out.push_str(s);
                }
                Segment::Param(_) => {
                    let val = vals.next().ok_or(BuildError::NotEnoughValues)?;
                    out.push('/');
                    out.push_str(val);
                }
                Segment::Anchor => out.push('/'),
            }
        }

        if vals.next().is_some() {
            return Err(BuildError::TooManyValues);
        }
        if out.is_empty() {
            out.push('/');
        }

        Ok(out)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(method) = &self.method {
            write!(f, "{method} ")?;
        }
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => write!(f, "/{s}")?,
                Segment::Param(name) => write!(f, "/{{{name}}}")?,
                Segment::Anchor => f.write_str("/{$}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::parse(s)
    }
}
