//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile route patterns once, at registration
//! - Match request paths against a compiled pattern
//!
//! # Design Decisions
//! - Patterns are regular expressions anchored at both ends: `/a.*` matches
//!   `/about` but `/a` never matches `/about`
//! - No capture extraction; a pattern only answers "does this path match"
//! - Path matching is case-sensitive

use std::fmt;

use regex::Regex;

/// A compiled, fully anchored path pattern.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile `pattern`. The pattern text is wrapped so it must match the whole path.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns true if the whole of `path` matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern as registered, without the anchors.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
