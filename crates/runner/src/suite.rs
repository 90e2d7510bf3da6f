// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The test-suite schema shared by the YAML and textproto loaders.
//!
//! Structural invariants (a `StringMatcher` names exactly one of
//! exact/regex/file, an `Input` uses one source, regexes compile) are
//! enforced by [`TestSuite::validate`] at load time, not at match time.

use std::fmt;
use std::str::FromStr;

use filtercheck_core::{FilterCheckError, LogLevel, Result};
use serde::Deserialize;

/// Suite-level log threshold. `Undefined` defers to the runner default
/// (INFO); benchmarks force `Critical` regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfigLogLevel {
    #[default]
    Undefined,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl ConfigLogLevel {
    /// The host threshold this level maps to, defaulting to INFO.
    #[must_use]
    pub const fn effective(self) -> LogLevel {
        match self {
            Self::Undefined | Self::Info => LogLevel::Info,
            Self::Trace => LogLevel::Trace,
            Self::Debug => LogLevel::Debug,
            Self::Warn => LogLevel::Warn,
            Self::Error => LogLevel::Error,
            Self::Critical => LogLevel::Critical,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ConfigLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigLogLevel {
    type Err = FilterCheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UNDEFINED" => Ok(Self::Undefined),
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(FilterCheckError::Schema(format!("unknown log level '{other}'"))),
        }
    }
}

/// Paths and knobs shared by every test in the suite.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Env {
    /// Path of the suite document itself; relative input/matcher paths
    /// resolve against its directory. Filled in by the loader.
    pub test_path: String,
    pub wasm_path: String,
    pub config_path: String,
    pub log_path: String,
    pub log_level: ConfigLogLevel,
    /// Fixed clock, in whole seconds since the epoch. Zero keeps the
    /// host default (epoch + 1ms).
    pub time_secs: u64,
    /// Extra live streams maintained during benchmarks.
    pub num_additional_streams: u64,
    /// How many extra streams advance one phase per benchmark iteration.
    pub additional_stream_advance_rate: u64,
}

/// A `{key, value}` header literal used by inputs and expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderPair {
    pub key: String,
    pub value: String,
}

/// Exact-string, anchored-regex, or file-contents matcher with an
/// inversion flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StringMatcher {
    pub exact: Option<String>,
    pub regex: Option<String>,
    pub file: Option<String>,
    pub invert: bool,
}

impl StringMatcher {
    fn validate(&self, at: &str) -> Result<()> {
        let sources =
            usize::from(self.exact.is_some()) + usize::from(self.regex.is_some())
                + usize::from(self.file.is_some());
        if sources != 1 {
            return Err(FilterCheckError::Schema(format!(
                "{at}: StringMatcher must set exactly one of exact|regex|file"
            )));
        }
        if let Some(pattern) = &self.regex {
            crate::matcher::compile_anchored(pattern)
                .map_err(|err| FilterCheckError::Schema(format!("{at}: {err}")))?;
        }
        Ok(())
    }
}

/// Expected immediate-response subfields; unset subfields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImmediateExpectation {
    pub http_status: Option<u32>,
    pub grpc_status: Option<u32>,
    pub details: Option<String>,
}

/// Declarative checks applied to a phase result or a lifecycle phase's
/// captured logs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectation {
    pub has_header: Vec<HeaderPair>,
    pub no_header: Vec<HeaderPair>,
    pub headers: Vec<StringMatcher>,
    pub body: Vec<StringMatcher>,
    pub immediate: Option<ImmediateExpectation>,
    pub log: Vec<StringMatcher>,
}

impl Expectation {
    fn validate(&self, at: &str) -> Result<()> {
        for (i, matcher) in self.headers.iter().enumerate() {
            matcher.validate(&format!("{at}.headers[{i}]"))?;
        }
        for (i, matcher) in self.body.iter().enumerate() {
            matcher.validate(&format!("{at}.body[{i}]"))?;
        }
        for (i, matcher) in self.log.iter().enumerate() {
            matcher.validate(&format!("{at}.log[{i}]"))?;
        }
        Ok(())
    }
}

/// Input for a phase invocation: an HTTP/1 block from a file, an inline
/// block, or explicit header pairs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Input {
    pub file: String,
    pub content: String,
    pub header: Vec<HeaderPair>,
}

impl Input {
    fn validate(&self, at: &str) -> Result<()> {
        let sources = usize::from(!self.file.is_empty())
            + usize::from(!self.content.is_empty())
            + usize::from(!self.header.is_empty());
        if sources > 1 {
            return Err(FilterCheckError::Schema(format!(
                "{at}: Input must use only one of file|content|header"
            )));
        }
        Ok(())
    }
}

/// One phase invocation: what to feed the plugin, what to expect back.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Invocation {
    pub input: Input,
    pub result: Expectation,
}

impl Invocation {
    fn validate(&self, at: &str) -> Result<()> {
        self.input.validate(&format!("{at}.input"))?;
        self.result.validate(&format!("{at}.result"))
    }
}

/// One named test: optional per-phase invocations plus lifecycle-phase
/// expectations, and a benchmark opt-in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Test {
    pub name: String,
    pub benchmark: bool,
    pub request_headers: Option<Invocation>,
    pub request_body: Vec<Invocation>,
    pub response_headers: Option<Invocation>,
    pub response_body: Vec<Invocation>,
    pub plugin_init: Expectation,
    pub stream_init: Expectation,
    pub stream_destroy: Expectation,
}

impl Test {
    fn validate(&self, at: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(FilterCheckError::Schema(format!("{at}: test name must not be empty")));
        }
        if let Some(invocation) = &self.request_headers {
            invocation.validate(&format!("{at}.request_headers"))?;
        }
        for (i, invocation) in self.request_body.iter().enumerate() {
            invocation.validate(&format!("{at}.request_body[{i}]"))?;
        }
        if let Some(invocation) = &self.response_headers {
            invocation.validate(&format!("{at}.response_headers"))?;
        }
        for (i, invocation) in self.response_body.iter().enumerate() {
            invocation.validate(&format!("{at}.response_body[{i}]"))?;
        }
        self.plugin_init.validate(&format!("{at}.plugin_init"))?;
        self.stream_init.validate(&format!("{at}.stream_init"))?;
        self.stream_destroy.validate(&format!("{at}.stream_destroy"))
    }
}

/// Root of a suite document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestSuite {
    pub env: Env,
    #[serde(rename = "test")]
    pub tests: Vec<Test>,
}

impl TestSuite {
    /// Enforces the cross-field invariants the loaders share.
    ///
    /// # Errors
    ///
    /// Returns a schema error naming the offending field path.
    pub fn validate(&self) -> Result<()> {
        for (i, test) in self.tests.iter().enumerate() {
            test.validate(&format!("test[{i}]"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_suite_parses() {
        let suite: TestSuite = serde_saphyr::from_str(
            r#"
env:
  wasm_path: "plugin.wasm"
  log_level: TRACE
  time_secs: 5
test:
  - name: basic
    benchmark: true
    request_headers:
      input:
        header:
          - { key: ":path", value: "/index.html" }
      result:
        has_header:
          - { key: "Message", value: "hello" }
        headers:
          - regex: "message: h.*"
        log:
          - exact: "B"
            invert: true
    plugin_init:
      log:
        - exact: "A"
"#,
        )
        .unwrap_or_else(|e| panic!("yaml parse failed: {e}"));
        assert_eq!(suite.env.log_level, ConfigLogLevel::Trace);
        assert_eq!(suite.env.time_secs, 5);
        assert_eq!(suite.tests.len(), 1);
        let test = &suite.tests[0];
        assert!(test.benchmark);
        let invocation = test.request_headers.as_ref().unwrap_or_else(|| panic!("missing"));
        assert_eq!(invocation.input.header[0].key, ":path");
        assert_eq!(invocation.result.has_header[0].value, "hello");
        assert!(invocation.result.log[0].invert);
        suite.validate().unwrap_or_else(|e| panic!("validate failed: {e}"));
    }

    #[test]
    fn test_matcher_must_pick_one_source() {
        let suite: TestSuite = serde_saphyr::from_str(
            r#"
test:
  - name: bad
    request_headers:
      result:
        headers:
          - exact: "a"
            regex: "b"
"#,
        )
        .unwrap_or_else(|e| panic!("yaml parse failed: {e}"));
        let err = suite.validate().map(|()| String::new()).unwrap_err();
        assert!(err.to_string().contains("exactly one of"));
        assert!(err.to_string().contains("test[0].request_headers.result.headers[0]"));
    }

    #[test]
    fn test_bad_regex_is_a_schema_error() {
        let suite: TestSuite = serde_saphyr::from_str(
            r#"
test:
  - name: bad
    stream_init:
      log:
        - regex: "("
"#,
        )
        .unwrap_or_else(|e| panic!("yaml parse failed: {e}"));
        let err = suite.validate().map(|()| String::new()).unwrap_err();
        assert!(err.to_string().contains("bad regex"));
    }

    #[test]
    fn test_input_sources_are_exclusive() {
        let suite: TestSuite = serde_saphyr::from_str(
            r#"
test:
  - name: bad
    request_headers:
      input:
        file: "a.txt"
        content: "GET / HTTP/1.1"
"#,
        )
        .unwrap_or_else(|e| panic!("yaml parse failed: {e}"));
        let err = suite.validate().map(|()| String::new()).unwrap_err();
        assert!(err.to_string().contains("only one of"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let parsed: std::result::Result<TestSuite, _> =
            serde_saphyr::from_str("bogus_field: 1\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_log_level_round_trip() {
        for level in ["UNDEFINED", "TRACE", "DEBUG", "INFO", "WARN", "ERROR", "CRITICAL"] {
            let parsed: ConfigLogLevel =
                level.parse().unwrap_or_else(|e| panic!("parse failed: {e}"));
            assert_eq!(parsed.to_string(), level);
        }
        assert!("VERBOSE".parse::<ConfigLogLevel>().is_err());
        assert_eq!(ConfigLogLevel::Undefined.effective(), LogLevel::Info);
        assert_eq!(ConfigLogLevel::Trace.effective(), LogLevel::Trace);
    }
}
