//! URL classification
//!
//! Sorts a candidate navigation URL into one of three cases before any rule
//! is consulted. The sentinel check always runs first so the blocked page can
//! never redirect to itself.

use crate::parser::redirector;

/// The local "blocked" page that diverted navigations land on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel {
    url: String,
}

impl Sentinel {
    /// Create a sentinel for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The sentinel URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check whether a URL is already at (or under) the sentinel
    pub fn is_at(&self, url: &str) -> bool {
        url.starts_with(&self.url)
    }
}

/// How a candidate URL should be treated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Already at the sentinel; nothing else runs
    AtSentinel,

    /// A redirector link; the destination if one could be extracted
    WrappedRedirect(Option<String>),

    /// Anything else, tested directly against the rules
    Plain,
}

impl Classification {
    /// Destination to test for a wrapped redirect, if resolvable and not the sentinel
    pub fn destination<'a>(&'a self, sentinel: &Sentinel) -> Option<&'a str> {
        match self {
            Classification::WrappedRedirect(Some(dest)) if !sentinel.is_at(dest) => Some(dest),
            _ => None,
        }
    }
}

/// Classify a URL for request interception
pub fn classify(url: &str, sentinel: &Sentinel) -> Classification {
    if sentinel.is_at(url) {
        return Classification::AtSentinel;
    }

    match redirector::unwrap_redirect(url) {
        Some(destination) => Classification::WrappedRedirect(destination),
        None => Classification::Plain,
    }
}
