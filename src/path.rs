//! Hierarchical functor paths.
//!
//! A path names the predicate of a literal, e.g. `second/sub`. Paths are
//! cheap to clone and compare, they are used as belief base and rule keys.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Separator between path segments.
pub const SEPARATOR: char = '/';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("functor path must not be empty")]
    Empty,
}

/// A non-empty, `/`-separated functor path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Arc<str>);

impl Path {
    /// Parse a path, trimming leading and trailing separators.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim_matches(SEPARATOR);
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Path(trimmed.into()))
    }

    /// Create a path from a known-good string.
    ///
    /// # Panics
    ///
    /// Panics if the path is empty after trimming. Use [`Path::parse`] for
    /// untrusted input.
    pub fn new(path: &str) -> Self {
        match Path::parse(path) {
            Ok(p) => p,
            Err(e) => panic!("{}: {:?}", e, path),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the segments.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.parts().count()
    }

    /// Paths are never empty; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::new(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::new(&s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
