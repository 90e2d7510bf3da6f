// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The expectation engine.
//!
//! Runs the declared checks against a captured phase result (headers,
//! body, immediate response, filter status) and against a context's log
//! stream. All mismatches within a phase are reported, each prefixed with
//! the phase name.

use std::path::Path;

use filtercheck_core::{HeaderMap, Phase, PhaseResult};

use crate::matcher::CompiledMatcher;
use crate::suite::{Expectation, StringMatcher};

/// Checks lifecycle-phase side effects (currently: captured logs).
pub fn check_side_effects(
    phase: &str,
    expect: &Expectation,
    logs: &[String],
    base_dir: &Path,
    failures: &mut Vec<String>,
) {
    let items: Vec<Vec<u8>> = logs.iter().map(|line| line.clone().into_bytes()).collect();
    for matcher in &expect.log {
        find_match(phase, "log", matcher, &items, base_dir, failures);
    }
}

/// Checks a phase result against its expectation.
///
/// When the result carries an immediate response, the header and body
/// checks apply to the local response the proxy would deliver; otherwise
/// they apply to the mutated message.
pub fn check_phase_results(
    phase: &str,
    stream_phase: Phase,
    expect: &Expectation,
    result: &PhaseResult,
    base_dir: &Path,
    failures: &mut Vec<String>,
) {
    let (headers, body): (&HeaderMap, &[u8]) = match &result.immediate {
        Some(immediate) => (&immediate.headers, &immediate.body),
        None => (&result.headers, &result.body),
    };

    for pair in &expect.has_header {
        match headers.get(&pair.key) {
            None => failures.push(format!("[{phase}] Missing header '{}'", pair.key)),
            Some(value) if value != pair.value => failures.push(format!(
                "[{phase}] Header '{}' value is '{value}', expected '{}'",
                pair.key, pair.value
            )),
            Some(_) => {}
        }
    }
    for pair in &expect.no_header {
        if let Some(value) = headers.get(&pair.key) {
            failures.push(format!(
                "[{phase}] Header '{}' value is '{value}', expected removed",
                pair.key
            ));
        }
    }

    if !expect.headers.is_empty() {
        let serialized: Vec<Vec<u8>> = headers
            .pairs()
            .map(|(key, value)| format!("{}: {value}", key.to_ascii_lowercase()).into_bytes())
            .collect();
        for matcher in &expect.headers {
            find_match(phase, "header", matcher, &serialized, base_dir, failures);
        }
    }

    if !expect.body.is_empty() {
        let items = vec![body.to_vec()];
        for matcher in &expect.body {
            find_match(phase, "body", matcher, &items, base_dir, failures);
        }
    }

    check_immediate(phase, stream_phase, expect, result, failures);

    let logs: Vec<Vec<u8>> = result.logs.iter().map(|line| line.clone().into_bytes()).collect();
    for matcher in &expect.log {
        find_match(phase, "log", matcher, &logs, base_dir, failures);
    }
}

fn check_immediate(
    phase: &str,
    stream_phase: Phase,
    expect: &Expectation,
    result: &PhaseResult,
    failures: &mut Vec<String>,
) {
    let is_continue = result.status_is_continue(stream_phase);
    if expect.immediate.is_some() == is_continue {
        failures.push(format!(
            "[{phase}] Expected {}, filter status disagrees",
            if expect.immediate.is_some() {
                "immediate reply (stop filters status)"
            } else {
                "no immediate reply (continue status)"
            },
        ));
    }
    if expect.immediate.is_some() != result.immediate.is_some() {
        failures.push(format!(
            "[{phase}] Expected {}, got {}",
            if expect.immediate.is_some() { "an immediate response" } else { "no immediate response" },
            if result.immediate.is_some() { "one" } else { "none" },
        ));
    }
    let (Some(want), Some(got)) = (&expect.immediate, &result.immediate) else {
        return;
    };
    if let Some(http_status) = want.http_status {
        if http_status != got.http_status {
            failures.push(format!(
                "[{phase}] HTTP status is {}, expected {http_status}",
                got.http_status
            ));
        }
    }
    if let Some(grpc_status) = want.grpc_status {
        if grpc_status != got.grpc_status {
            failures.push(format!(
                "[{phase}] gRPC status is {}, expected {grpc_status}",
                got.grpc_status
            ));
        }
    }
    if let Some(details) = &want.details {
        if details != &got.details {
            failures.push(format!(
                "[{phase}] gRPC detail is '{}', expected '{details}'",
                got.details
            ));
        }
    }
}

/// Evaluates one matcher against a list, recording a readable diagnostic
/// on mismatch.
fn find_match(
    phase: &str,
    what: &str,
    matcher: &StringMatcher,
    items: &[Vec<u8>],
    base_dir: &Path,
    failures: &mut Vec<String>,
) {
    let compiled = match CompiledMatcher::compile(matcher, base_dir) {
        Ok(compiled) => compiled,
        Err(err) => {
            failures.push(format!("[{phase}] {err}"));
            return;
        }
    };
    if !compiled.matches_any(items) {
        let actual = items
            .iter()
            .map(|item| String::from_utf8_lossy(item).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        failures.push(format!(
            "[{phase}] expected {} of {} {what}, actual:\n{actual}",
            if compiled.invert() { "absence" } else { "presence" },
            compiled.summary(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filtercheck_core::{FilterHeadersStatus, ImmediateResponse};
    use crate::suite::{HeaderPair, ImmediateExpectation};

    fn base() -> &'static Path {
        Path::new(".")
    }

    fn header_result(pairs: &[(&str, &str)]) -> PhaseResult {
        let mut result = PhaseResult::default();
        for (key, value) in pairs {
            result.headers.insert_or_append(key, value);
        }
        result
    }

    #[test]
    fn test_has_header_and_no_header() {
        let result = header_result(&[("Message", "hello"), ("other", "x")]);
        let expect = Expectation {
            has_header: vec![
                HeaderPair { key: "message".to_string(), value: "hello".to_string() },
                HeaderPair { key: "gone".to_string(), value: "y".to_string() },
            ],
            no_header: vec![HeaderPair { key: "other".to_string(), value: String::new() }],
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_phase_results("request_headers", Phase::RequestHeaders, &expect, &result, base(), &mut failures);
        assert_eq!(failures.len(), 2, "{failures:?}");
        assert!(failures[0].contains("Missing header 'gone'"));
        assert!(failures[1].contains("expected removed"));
    }

    #[test]
    fn test_serialized_header_matchers_use_lowercase() {
        let result = header_result(&[("Message", "hello")]);
        let expect = Expectation {
            headers: vec![StringMatcher {
                regex: Some("message: h.*".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_phase_results("request_headers", Phase::RequestHeaders, &expect, &result, base(), &mut failures);
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn test_body_matcher_against_singleton() {
        let result = PhaseResult { body: b"abcfoo".to_vec(), ..Default::default() };
        let expect = Expectation {
            body: vec![StringMatcher { exact: Some("abcfoo".to_string()), ..Default::default() }],
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_phase_results("request_body", Phase::RequestBody, &expect, &result, base(), &mut failures);
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn test_missing_immediate_when_expected() {
        let result = PhaseResult::default();
        let expect = Expectation {
            immediate: Some(ImmediateExpectation::default()),
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_phase_results("request_headers", Phase::RequestHeaders, &expect, &result, base(), &mut failures);
        assert_eq!(failures.len(), 2, "{failures:?}");
    }

    #[test]
    fn test_immediate_checks_headers_and_fields() {
        let mut immediate = ImmediateResponse { http_status: 301, ..Default::default() };
        immediate.headers.insert_or_append("Location", "http://x/");
        let result = PhaseResult {
            header_status: FilterHeadersStatus::StopIteration,
            immediate: Some(immediate),
            ..Default::default()
        };
        let expect = Expectation {
            has_header: vec![HeaderPair {
                key: "location".to_string(),
                value: "http://x/".to_string(),
            }],
            immediate: Some(ImmediateExpectation {
                http_status: Some(301),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_phase_results("request_headers", Phase::RequestHeaders, &expect, &result, base(), &mut failures);
        assert!(failures.is_empty(), "{failures:?}");

        // Wrong status code is reported.
        let expect_wrong = Expectation {
            immediate: Some(ImmediateExpectation {
                http_status: Some(302),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_phase_results("request_headers", Phase::RequestHeaders, &expect_wrong, &result, base(), &mut failures);
        assert_eq!(failures.len(), 1, "{failures:?}");
        assert!(failures[0].contains("HTTP status is 301"));
    }

    #[test]
    fn test_unexpected_immediate_is_reported() {
        let result = PhaseResult {
            header_status: FilterHeadersStatus::StopIteration,
            immediate: Some(ImmediateResponse::default()),
            ..Default::default()
        };
        let expect = Expectation::default();
        let mut failures = Vec::new();
        check_phase_results("request_headers", Phase::RequestHeaders, &expect, &result, base(), &mut failures);
        assert_eq!(failures.len(), 2, "{failures:?}");
    }

    #[test]
    fn test_side_effect_log_matching() {
        let logs = vec!["A".to_string(), "other".to_string()];
        let expect = Expectation {
            log: vec![
                StringMatcher { exact: Some("A".to_string()), ..Default::default() },
                StringMatcher { exact: Some("B".to_string()), invert: true, ..Default::default() },
            ],
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_side_effects("plugin_init", &expect, &logs, base(), &mut failures);
        assert!(failures.is_empty(), "{failures:?}");

        let expect_missing = Expectation {
            log: vec![StringMatcher { exact: Some("B".to_string()), ..Default::default() }],
            ..Default::default()
        };
        let mut failures = Vec::new();
        check_side_effects("plugin_init", &expect_missing, &logs, base(), &mut failures);
        assert_eq!(failures.len(), 1, "{failures:?}");
        assert!(failures[0].contains("presence"));
        assert!(failures[0].contains("plugin_init"));
    }
}
