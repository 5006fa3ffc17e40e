//! Glob patterns for redirect URI and CORS origin allow-lists.
//!
//! `/` is treated as a separator: `*` and `?` never cross it, `**` spans any
//! number of path segments.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    compiled: Regex,
}

impl Pattern {
    /// Compiles a glob pattern.
    ///
    /// Supports `*`, `**`, `?` and bracket classes (`[abc]`, `[a-z]`,
    /// `[!abc]`). Every other character matches itself.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPattern`] if a bracket class is not closed
    /// or is empty.
    pub fn new(source: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidPattern {
            pattern: source.to_string(),
            reason: reason.to_string(),
        };

        let expr = translate(source).map_err(invalid)?;
        let compiled = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    /// Returns `true` if `value` matches this pattern.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.compiled.is_match(value)
    }

    /// The pattern as written in configuration.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Turns a glob into an anchored regular expression.
fn translate(glob: &str) -> Result<String, &'static str> {
    let mut expr = String::with_capacity(glob.len() * 2 + 2);
    expr.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                expr.push_str(".*");
            }
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if !closed {
                    return Err("unclosed character class");
                }
                let (negated, body) = match class.strip_prefix('!') {
                    Some(body) => (true, body),
                    None => (false, class.as_str()),
                };
                if body.is_empty() {
                    return Err("empty character class");
                }

                expr.push_str(if negated { "[^/" } else { "[" });
                for c in body.chars() {
                    if c != '-' && c.is_ascii_punctuation() {
                        expr.push('\\');
                    }
                    expr.push(c);
                }
                expr.push(']');
            }
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    expr.push('$');
    Ok(expr)
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Any-of collection of [`Pattern`]s.
#[derive(Debug, Clone, Default)]
pub struct PatternSet(Vec<Pattern>);

impl PatternSet {
    /// Compiles every source string.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn new<S: AsRef<str>>(sources: &[S]) -> CoreResult<Self> {
        sources
            .iter()
            .map(|s| Pattern::new(s.as_ref()))
            .collect::<CoreResult<Vec<_>>>()
            .map(Self)
    }

    /// Returns `true` if any pattern matches `value`.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.0.iter().any(|p| p.matches(value))
    }

    /// Returns `true` if the set holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the patterns in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.0.iter()
    }
}

impl Serialize for PatternSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(Pattern::as_str))
    }
}

impl<'de> Deserialize<'de> for PatternSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sources = Vec::<String>::deserialize(deserializer)?;
        Self::new(&sources).map_err(serde::de::Error::custom)
    }
}
