//! Alias character rules, normalization, and the immutable alias table.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

pub const ALIAS_DELIMITER: char = ':';

/// Raw or normalized alias mapping as read from and written to disk.
///
/// A `BTreeMap` keeps keys sorted so saved files are stable.
pub type AliasMap = BTreeMap<String, String>;

/// Characters that may appear in a trigger on their own.
pub fn is_allowed_alias_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_')
}

/// A trigger is valid when it is non-empty and every character is allowed,
/// except colons, which must come in `::` pairs.
pub fn is_valid_alias(alias: &str) -> bool {
    if alias.is_empty() {
        return false;
    }

    let mut chars = alias.chars();
    while let Some(c) = chars.next() {
        if is_allowed_alias_char(c) {
            continue;
        }

        if c == ALIAS_DELIMITER && chars.next() == Some(ALIAS_DELIMITER) {
            continue;
        }

        return false;
    }

    true
}

/// Trim and lower-case keys, trim values, and drop anything empty or invalid.
pub fn normalize_aliases<I, K, V>(raw: I) -> AliasMap
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut normalized = AliasMap::new();

    for (key, value) in raw {
        let alias = key.as_ref().trim().to_lowercase();
        let replacement = value.as_ref().trim();

        if alias.is_empty() || replacement.is_empty() {
            continue;
        }

        if !is_valid_alias(&alias) {
            debug!(alias = %alias, "dropping alias with invalid characters");
            continue;
        }

        normalized.insert(alias, replacement.to_string());
    }

    normalized
}

/// Immutable trigger → replacement snapshot used for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Merge bundled defaults with user overrides. User entries win.
    pub fn merged(bundled: AliasMap, custom: AliasMap) -> Self {
        let mut entries: HashMap<String, String> = bundled.into_iter().collect();
        entries.extend(custom);
        Self { entries }
    }

    /// Build a normalized table from arbitrary pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            entries: normalize_aliases(pairs).into_iter().collect(),
        }
    }

    pub fn get(&self, trigger: &str) -> Option<&str> {
        self.entries.get(trigger).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in trigger order.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}
