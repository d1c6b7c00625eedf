//! Label sets and series identities
//!
//! A series is identified by a counter name plus an ordered list of labels,
//! rendered as `name{k1="v1",k2="v2"}`. Label order is significant: the same
//! labels attached in a different order produce a different series.

use std::fmt;

/// A single key/value pair attached to a series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    key: String,
    value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are quoted with escapes so that quotes and newlines inside
        // a value cannot break the exposition line.
        write!(f, "{}={:?}", self.key, self.value)
    }
}

/// Ordered, immutable sequence of labels
///
/// Labels are never deduplicated or reordered. [`Labels::with`] returns an
/// extended copy, so one set can be fanned out into several sibling sets
/// without the siblings observing each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Create an empty label set
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this set with one more label appended
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut labels = Vec::with_capacity(self.0.len() + 1);
        labels.extend(self.0.iter().cloned());
        labels.push(Label::new(key, value));
        Self(labels)
    }

    /// Render the series identity for a counter carrying these labels
    ///
    /// An empty set renders as `name{}`.
    pub fn identity(&self, name: &str) -> String {
        format!("{name}{{{self}}}")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Labels {
    /// Comma separated `key="value"` pairs, without braces
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{label}")?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| Label::new(k, v)).collect())
    }
}
