//! Space-delimited token sets.
//!
//! OAuth carries `scope`, `response_type` and `prompt` as whitespace separated
//! lists where order is irrelevant and duplicates are meaningless. [`StringSet`]
//! keeps first-seen order for display in forms, compares as a set, and renders
//! a canonical sorted form for tokens.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An element that is not part of an allowed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("\"{0}\" is not supported")]
pub struct UnknownElement(pub String);

/// Ordered, de-duplicated list of tokens.
#[derive(Debug, Clone, Default)]
pub struct StringSet(Vec<String>);

impl StringSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Parses a whitespace-delimited list, dropping duplicates.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        s.split_whitespace().collect()
    }

    /// Adds `value` if it is not already present. Returns whether it was added.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.is_empty() || self.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    /// Returns `true` if `value` is a member.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates members in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns `true` if the set equals exactly the given members.
    #[must_use]
    pub fn is_exactly(&self, members: &[&str]) -> bool {
        self.len() == members.len() && members.iter().all(|m| self.contains(m))
    }

    /// Returns a new set holding the members of both, `self` first.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for v in other.iter() {
            out.insert(v);
        }
        out
    }

    /// Checks every member against `allowed`.
    ///
    /// # Errors
    ///
    /// Returns the first member, in first-seen order, that is not allowed.
    pub fn validate(&self, allowed: &[&str]) -> Result<(), UnknownElement> {
        match self.iter().find(|v| !allowed.contains(v)) {
            Some(bad) => Err(UnknownElement(bad.to_string())),
            None => Ok(()),
        }
    }

    /// Canonical form: members sorted lexicographically, joined by a space.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.0
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Members joined by a space in first-seen order.
    #[must_use]
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

impl PartialEq for StringSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && other.iter().all(|v| self.contains(v))
    }
}

impl Eq for StringSet {}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl FromStr for StringSet {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for StringSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl Serialize for StringSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for StringSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
