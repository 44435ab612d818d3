//! Named-route registry and URL reversal.

use std::collections::HashMap;

use thiserror::Error;

use crate::pattern::{BuildError, Pattern, PatternError};

/// Maps route names to parsed patterns so URLs can be generated from a name
/// and positional parameter values instead of hardcoded path strings.
///
/// Entries are only added, never replaced; reversal is purely lexical and
/// performs no URL-encoding.
#[derive(Debug, Default)]
pub struct Reverser {
    patterns: HashMap<String, Pattern>,
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("pattern with name {0:?} already exists")]
    DuplicateName(String),

    #[error("name must not be empty")]
    EmptyName,

    #[error("failed to parse pattern: {0}")]
    Parse(#[from] PatternError),
}

#[derive(Debug, Error)]
pub enum ReverseError {
    #[error("no pattern named {0:?}")]
    UnknownName(String),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl Reverser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `pattern` and stores it under `name`.
    pub fn register(&mut self, name: &str, pattern: &str) -> Result<(), RegisterError> {
        if name.is_empty() {
            return Err(RegisterError::EmptyName);
        }
        if self.patterns.contains_key(name) {
            return Err(RegisterError::DuplicateName(name.to_owned()));
        }

        let parsed = Pattern::parse(pattern)?;
        self.patterns.insert(name.to_owned(), parsed);

        Ok(())
    }

    /// Builds the URL path for the route registered under `name`, consuming
    /// one value per placeholder in appearance order.
    pub fn reverse(&self, name: &str, vals: &[&str]) -> Result<String, ReverseError> {
        let pattern = self
            .patterns
            .get(name)
            .ok_or_else(|| ReverseError::UnknownName(name.to_owned()))?;

        Ok(pattern.build(vals)?)
    }

    /// The pattern registered under `name`, if any.
    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }
}
