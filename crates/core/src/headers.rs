// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Case-insensitive, key-sorted header map with RFC 9110 coalescing.
//!
//! Keys compare and sort by their ASCII-lowercased form; the spelling of
//! the first insertion is preserved. Duplicate inserts through
//! [`HeaderMap::insert_or_append`] join values with `", "` per the RFC 9110
//! field-order rule. Iteration is sorted by folded key so golden
//! comparisons are deterministic.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A header key ordered by its ASCII-lowercased bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
struct FoldedKey(String);

impl FoldedKey {
    fn folded_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl Ord for FoldedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded_bytes().cmp(other.folded_bytes())
    }
}

impl PartialOrd for FoldedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Case-insensitive, insertion-coalescing header collection.
#[derive(Debug, Clone, Default, Eq)]
pub struct HeaderMap {
    entries: BTreeMap<FoldedKey, String>,
}

impl PartialEq for HeaderMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&FoldedKey(key.to_string())).map(String::as_str)
    }

    /// Inserts the pair, coalescing with `", "` when the key already exists
    /// (RFC 9110 field order). The first-seen key spelling is kept.
    pub fn insert_or_append(&mut self, key: &str, value: &str) {
        self.entries
            .entry(FoldedKey(key.to_string()))
            .and_modify(|existing| {
                if existing.is_empty() {
                    value.clone_into(existing);
                } else {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
            })
            .or_insert_with(|| value.to_string());
    }

    /// Unconditional overwrite.
    pub fn replace(&mut self, key: &str, value: &str) {
        self.entries.insert(FoldedKey(key.to_string()), value.to_string());
    }

    /// Deletes all entries for the key. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(&FoldedKey(key.to_string())).is_some()
    }

    /// Ordered iteration, sorted by lowercased key.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.0.as_str(), v.as_str()))
    }

    /// Clears the map and bulk-adds the given pairs; coalescing applies
    /// within the bulk input.
    pub fn set_pairs<K, V, I>(&mut self, pairs: I)
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.entries.clear();
        for (key, value) in pairs {
            self.insert_or_append(key.as_ref(), value.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_insert_coalesces() {
        let mut map = HeaderMap::new();
        map.insert_or_append("Message", "foo");
        map.insert_or_append("Message", "hello");
        assert_eq!(map.get("Message"), Some("foo, hello"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert_or_append("Content-Type", "text/html");
        assert_eq!(map.get("content-type"), Some("text/html"));
        assert_eq!(map.get("CONTENT-TYPE"), Some("text/html"));
        map.insert_or_append("CONTENT-type", "gzip");
        assert_eq!(map.get("content-type"), Some("text/html, gzip"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_then_get_is_not_found() {
        let mut map = HeaderMap::new();
        map.insert_or_append("a", "1");
        map.insert_or_append("B", "2");
        assert_eq!(map.len(), 2);
        assert!(map.remove("b"));
        assert_eq!(map.get("B"), None);
        assert_eq!(map.len(), 1);
        assert!(!map.remove("b"));
    }

    #[test]
    fn test_replace_overwrites() {
        let mut map = HeaderMap::new();
        map.insert_or_append("k", "old");
        map.replace("K", "new");
        assert_eq!(map.get("k"), Some("new"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_iteration_sorted_by_folded_key() {
        let mut map = HeaderMap::new();
        map.insert_or_append("zeta", "1");
        map.insert_or_append("Alpha", "2");
        map.insert_or_append(":status", "200");
        let keys: Vec<&str> = map.pairs().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![":status", "Alpha", "zeta"]);
    }

    #[test]
    fn test_set_pairs_clears_and_coalesces() {
        let mut map = HeaderMap::new();
        map.insert_or_append("stale", "x");
        map.set_pairs(vec![("a", "1"), ("A", "2"), ("b", "3")]);
        assert_eq!(map.get("stale"), None);
        assert_eq!(map.get("a"), Some("1, 2"));
        assert_eq!(map.get("b"), Some("3"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_empty_keys_and_values_accepted() {
        let mut map = HeaderMap::new();
        map.insert_or_append("", "");
        assert_eq!(map.get(""), Some(""));
        map.insert_or_append("", "v");
        assert_eq!(map.get(""), Some("v"));
    }
}
