// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Compiled string matchers.
//!
//! Regex matchers are fully anchored and operate over bytes, so body and
//! log contents need not be valid UTF-8. File matchers load once and
//! behave as exact text. A matcher is satisfied by a list when any
//! element matches; inverted matchers are satisfied when none does.

use std::path::Path;

use filtercheck_core::{FilterCheckError, Result};
use regex::bytes::{Regex, RegexBuilder};

use crate::suite::StringMatcher;

/// Compiles a pattern with full-match anchoring and byte (non-Unicode)
/// semantics, so matchers apply to opaque body and log data.
pub(crate) fn compile_anchored(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .unicode(false)
        .build()
        .map_err(|err| FilterCheckError::Schema(format!("bad regex '{pattern}': {err}")))
}

enum MatcherKind {
    Exact(Vec<u8>),
    Regex(Regex),
}

pub struct CompiledMatcher {
    kind: MatcherKind,
    invert: bool,
    summary: String,
}

impl CompiledMatcher {
    /// Compiles a schema matcher. Relative file paths resolve against
    /// `base_dir` (the suite document's directory).
    ///
    /// # Errors
    ///
    /// Returns a schema error for an invalid matcher shape or regex, and
    /// an I/O error when a file matcher's contents cannot be read.
    pub fn compile(matcher: &StringMatcher, base_dir: &Path) -> Result<Self> {
        let (kind, summary) = match (&matcher.exact, &matcher.regex, &matcher.file) {
            (Some(text), None, None) => {
                (MatcherKind::Exact(text.clone().into_bytes()), format!("exact '{text}'"))
            }
            (None, Some(pattern), None) => {
                (MatcherKind::Regex(compile_anchored(pattern)?), format!("regex '{pattern}'"))
            }
            (None, None, Some(path)) => {
                let resolved = if Path::new(path).is_absolute() {
                    Path::new(path).to_path_buf()
                } else {
                    base_dir.join(path)
                };
                let contents = std::fs::read(&resolved).map_err(|err| {
                    FilterCheckError::Io(std::io::Error::new(
                        err.kind(),
                        format!("matcher file {}: {err}", resolved.display()),
                    ))
                })?;
                (MatcherKind::Exact(contents), format!("file '{path}'"))
            }
            _ => {
                return Err(FilterCheckError::Schema(
                    "StringMatcher must set exactly one of exact|regex|file".to_string(),
                ))
            }
        };
        Ok(Self { kind, invert: matcher.invert, summary })
    }

    /// Whether this matcher is satisfied by the list.
    pub fn matches_any<I, B>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for item in items {
            let hit = match &self.kind {
                MatcherKind::Exact(expected) => item.as_ref() == expected.as_slice(),
                MatcherKind::Regex(regex) => regex.is_match(item.as_ref()),
            };
            if hit {
                return !self.invert;
            }
        }
        self.invert
    }

    #[must_use]
    pub const fn invert(&self) -> bool {
        self.invert
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(text: &str, invert: bool) -> CompiledMatcher {
        let matcher = StringMatcher { exact: Some(text.to_string()), invert, ..Default::default() };
        CompiledMatcher::compile(&matcher, Path::new("."))
            .unwrap_or_else(|e| panic!("compile failed: {e}"))
    }

    fn regex(pattern: &str, invert: bool) -> CompiledMatcher {
        let matcher =
            StringMatcher { regex: Some(pattern.to_string()), invert, ..Default::default() };
        CompiledMatcher::compile(&matcher, Path::new("."))
            .unwrap_or_else(|e| panic!("compile failed: {e}"))
    }

    #[test]
    fn test_exact_any_element() {
        let m = exact("b", false);
        assert!(m.matches_any(["a", "b", "c"]));
        assert!(!m.matches_any(["a", "c"]));
        assert!(!m.matches_any(Vec::<&str>::new()));
    }

    #[test]
    fn test_inverted_requires_no_match() {
        let m = exact("b", true);
        assert!(!m.matches_any(["a", "b"]));
        assert!(m.matches_any(["a", "c"]));
        assert!(m.matches_any(Vec::<&str>::new()));
    }

    #[test]
    fn test_regex_is_fully_anchored() {
        let m = regex("h.*o", false);
        assert!(m.matches_any(["hello"]));
        assert!(!m.matches_any(["say hello"]));
        assert!(!m.matches_any(["hello!"]));
    }

    #[test]
    fn test_regex_matches_arbitrary_bytes() {
        let m = regex("payload: .*", false);
        let item: &[u8] = b"payload: \xff\xfe";
        assert!(m.matches_any([item]));
    }

    #[test]
    fn test_bad_regex_fails_compile() {
        let matcher = StringMatcher { regex: Some("(".to_string()), ..Default::default() };
        assert!(CompiledMatcher::compile(&matcher, Path::new(".")).is_err());
    }

    #[test]
    fn test_file_matcher_reads_contents() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        std::fs::write(dir.path().join("expected.txt"), "golden body")
            .unwrap_or_else(|e| panic!("write: {e}"));
        let matcher =
            StringMatcher { file: Some("expected.txt".to_string()), ..Default::default() };
        let m = CompiledMatcher::compile(&matcher, dir.path())
            .unwrap_or_else(|e| panic!("compile failed: {e}"));
        assert!(m.matches_any(["golden body"]));
        assert!(!m.matches_any(["other"]));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let matcher = StringMatcher { file: Some("nope.txt".to_string()), ..Default::default() };
        assert!(CompiledMatcher::compile(&matcher, Path::new("/nonexistent")).is_err());
    }
}
