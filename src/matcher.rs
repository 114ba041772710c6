//! Link recognition.
//!
//! [`PatternRegistry`] holds `(keyword, pattern)` pairs in registration
//! order and finds the first registered pattern that matches anywhere in a
//! chat message. Precedence is registration order, not position in the text.

use regex::{Regex, RegexSet};
use tracing::warn;

/// A registered `(keyword, pattern)` pair.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    pub keyword: String,
    pub regex: Regex,
}

/// A detected link: which keyword matched, the matched text and its groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    keyword: String,
    /// Index 0 is the full match.
    groups: Vec<Option<String>>,
}

impl SearchResult {
    fn from_captures(keyword: &str, caps: &regex::Captures<'_>) -> Self {
        Self {
            keyword: keyword.to_string(),
            groups: caps
                .iter()
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Full matched text. Also the result cache key.
    pub fn matched(&self) -> &str {
        self.groups
            .first()
            .and_then(Option::as_deref)
            .unwrap_or_default()
    }

    /// Capture group `index`, if it participated in the match.
    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(Option::as_deref)
    }
}

/// Ordered set of link patterns with a combined matcher.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    entries: Vec<PatternEntry>,
    set: RegexSet,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Register `pattern` under `keyword`.
    ///
    /// Returns `Ok(false)` without changing anything when the keyword is
    /// already registered; the first registration wins.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn register(&mut self, keyword: &str, pattern: &str) -> Result<bool, regex::Error> {
        if self.entries.iter().any(|e| e.keyword == keyword) {
            warn!(keyword, "duplicate keyword ignored, first registration wins");
            return Ok(false);
        }

        let regex = Regex::new(pattern)?;
        let set = RegexSet::new(
            self.entries
                .iter()
                .map(|e| e.regex.as_str())
                .chain(std::iter::once(pattern)),
        )?;

        self.entries.push(PatternEntry {
            keyword: keyword.to_string(),
            regex,
        });
        self.set = set;
        Ok(true)
    }

    /// First registered pattern matching anywhere in `text`.
    pub fn find_link(&self, text: &str) -> Option<SearchResult> {
        // RegexSet yields matching indices in ascending (registration) order.
        let index = self.set.matches(text).into_iter().next()?;
        let entry = &self.entries[index];
        let caps = entry.regex.captures(text)?;
        Some(SearchResult::from_captures(&entry.keyword, &caps))
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.keyword.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}
