//! Ordered, case-insensitive header collection.
//!
//! # Responsibilities
//! - Preserve header order and duplicates exactly as the proxy reported them
//! - Match names case-insensitively as HTTP requires
//! - Render "Name: Value" lines for display
//!
//! # Design Decisions
//! - Backed by a Vec, not a map: repeated headers are legal and order matters
//! - Names are stored as received; only comparisons fold case

use serde::{Deserialize, Serialize};

/// A single header name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns true if this header's name matches `name`, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered collection of headers for one message side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderSet {
    headers: Vec<Header>,
}

impl HeaderSet {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header at the end, keeping any existing headers of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(Header::new(name, value));
    }

    /// Append every header from `other`, in `other`'s order.
    pub fn merge(&mut self, other: HeaderSet) {
        self.headers.extend(other.headers);
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.is(name))
            .map(|h| h.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.headers.iter()
    }

    /// Lazily render each header as a "Name: Value" line.
    pub fn render(&self) -> impl Iterator<Item = String> + '_ {
        self.headers
            .iter()
            .map(|h| format!("{}: {}", h.name, h.value))
    }
}

impl<N, V> FromIterator<(N, V)> for HeaderSet
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            headers: iter
                .into_iter()
                .map(|(name, value)| Header::new(name, value))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}
