// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end runs: suite documents on disk, WAT plugin fixtures, the
//! full driver and expectation engine.

use std::path::{Path, PathBuf};

use filtercheck_runner::{bench, load_suite, run_suite};

struct SuiteDir {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl SuiteDir {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, contents).unwrap_or_else(|e| panic!("write {name}: {e}"));
        path
    }

    fn fixture(&self, name: &str, wat: &str) -> PathBuf {
        self.write(name, wat)
    }
}

fn load(path: &Path) -> filtercheck_runner::TestSuite {
    load_suite(path, None).unwrap_or_else(|e| panic!("suite load failed: {e}"))
}

#[test]
fn test_yaml_suite_end_to_end_passes() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("add_header.wat", include_str!("fixtures/add_header.wat"));
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
test:
  - name: adds_message_header
    request_headers:
      input:
        header:
          - {{ key: "Message", value: "foo" }}
      result:
        has_header:
          - {{ key: "message", value: "foo, hello" }}
        headers:
          - regex: "message: foo.*"
        no_header:
          - {{ key: "absent" }}
"#,
            plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert!(report.passed(), "{:?}", report.reports);
}

#[test]
fn test_expectation_mismatches_are_all_reported() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("add_header.wat", include_str!("fixtures/add_header.wat"));
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
test:
  - name: wrong_expectations
    request_headers:
      input: {{}}
      result:
        has_header:
          - {{ key: "missing-one", value: "x" }}
          - {{ key: "missing-two", value: "y" }}
"#,
            plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert_eq!(report.failed_count(), 1);
    let failures = &report.reports[0].failures;
    assert_eq!(failures.len(), 2, "{failures:?}");
    assert!(failures[0].contains("[request_headers]"));
}

#[test]
fn test_textproto_suite_with_http1_file_input() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("add_header.wat", include_str!("fixtures/add_header.wat"));
    dir.write("request.txt", "GET http://example.com/foo?q=1 HTTP/1.1\r\nHost: ignored\r\n\r\n");
    let suite_path = dir.write(
        "suite.textproto",
        &format!(
            r#"
env {{ wasm_path: "{}" }}
test {{
  name: "absolute_uri"
  request_headers {{
    input {{ file: "request.txt" }}
    result {{
      has_header {{ key: ":method" value: "GET" }}
      has_header {{ key: ":scheme" value: "http" }}
      has_header {{ key: ":authority" value: "example.com" }}
      has_header {{ key: ":path" value: "/foo?q=1" }}
      no_header {{ key: "host" }}
      has_header {{ key: "Message" value: "hello" }}
    }}
  }}
}}
"#,
            plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert!(report.passed(), "{:?}", report.reports);
}

#[test]
fn test_immediate_redirect_suite() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("immediate.wat", include_str!("fixtures/immediate.wat"));
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
test:
  - name: redirect
    request_headers:
      input:
        header:
          - {{ key: ":path", value: "/index.php" }}
      result:
        immediate:
          http_status: 301
        has_header:
          - {{ key: "Location", value: "http://x/" }}
    request_body:
      - input:
          content: "never delivered"
        result: {{}}
"#,
            plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert!(report.passed(), "{:?}", report.reports);
}

#[test]
fn test_body_append_and_phase_logs() {
    let dir = SuiteDir::new();
    let body_plugin = dir.fixture("body_append.wat", include_str!("fixtures/body_append.wat"));
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
test:
  - name: splice_appends
    request_body:
      - input:
          content: "abc"
        result:
          body:
            - exact: "abcfoo"
"#,
            body_plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert!(report.passed(), "{:?}", report.reports);
}

#[test]
fn test_phase_scoped_log_expectations() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("logger.wat", include_str!("fixtures/logger.wat"));
    let config = dir.write("plugin.cfg", "cfg!");
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
  config_path: "{}"
test:
  - name: logs_are_phase_scoped
    plugin_init:
      log:
        - exact: "A"
        - exact: "B"
          invert: true
    request_headers:
      input: {{}}
      result:
        log:
          - exact: "B"
          - exact: "A"
            invert: true
    stream_destroy:
      log:
        - exact: "L"
"#,
            plugin.display(),
            config.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert!(report.passed(), "{:?}", report.reports);
}

#[test]
fn test_rejected_configuration_policy() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("reject_config.wat", include_str!("fixtures/reject_config.wat"));
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
test:
  - name: config_rejected
    plugin_init:
      log:
        - exact: "bad config"
    request_headers:
      input: {{}}
      result: {{}}
"#,
            plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    // plugin_init log expectation passes, but the rejection itself is a
    // failure and the stream phases never run (the fixture would trap).
    assert_eq!(report.failed_count(), 1);
    let failures = &report.reports[0].failures;
    assert_eq!(failures.len(), 1, "{failures:?}");
    assert!(failures[0].contains("rejected configuration"));
}

#[test]
fn test_missing_plugin_reports_load_failure() {
    let dir = SuiteDir::new();
    let suite_path = dir.write(
        "suite.yaml",
        r#"
env:
  wasm_path: "no/such/plugin.wasm"
test:
  - name: load_fails
"#,
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert_eq!(report.failed_count(), 1);
    assert!(report.reports[0].failures[0].contains("[load]"));
}

#[test]
fn test_log_file_banners_and_lines() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("logger.wat", include_str!("fixtures/logger.wat"));
    let config = dir.write("plugin.cfg", "cfg!");
    let log_path = dir.root.join("plugin.log");
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
  config_path: "{}"
  log_path: "{}"
test:
  - name: banner_test
    request_headers:
      input: {{}}
      result: {{}}
"#,
            plugin.display(),
            config.display(),
            log_path.display()
        ),
    );
    let suite = load(&suite_path);
    let report = run_suite(&suite);
    assert!(report.passed(), "{:?}", report.reports);

    let log = std::fs::read_to_string(&log_path).unwrap_or_else(|e| panic!("read log: {e}"));
    assert!(log.contains("--- Starting test: banner_test ---"), "{log}");
    assert!(log.contains("--- Finished test: banner_test ---"), "{log}");
    assert!(log.contains("A\n"), "{log}");
    assert!(log.contains("B\n"), "{log}");
}

#[test]
fn test_deterministic_reruns() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("add_header.wat", include_str!("fixtures/add_header.wat"));
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
  time_secs: 42
test:
  - name: deterministic
    request_headers:
      input:
        header:
          - {{ key: "Message", value: "foo" }}
      result:
        has_header:
          - {{ key: "Message", value: "foo, hello" }}
"#,
            plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let first = run_suite(&suite);
    let second = run_suite(&suite);
    assert!(first.passed() && second.passed());
    assert_eq!(format!("{:?}", first.reports), format!("{:?}", second.reports));
}

#[test]
fn test_benchmarks_run_for_opted_in_tests() {
    let dir = SuiteDir::new();
    let plugin = dir.fixture("add_header.wat", include_str!("fixtures/add_header.wat"));
    let suite_path = dir.write(
        "suite.yaml",
        &format!(
            r#"
env:
  wasm_path: "{}"
  num_additional_streams: 2
  additional_stream_advance_rate: 1
test:
  - name: benched
    benchmark: true
    request_headers:
      input:
        header:
          - {{ key: "Message", value: "foo" }}
      result: {{}}
  - name: not_benched
"#,
            plugin.display()
        ),
    );
    let suite = load(&suite_path);
    let stats = bench::run_benchmarks(&suite).unwrap_or_else(|e| panic!("bench failed: {e}"));
    let names: Vec<&str> = stats.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["PluginLifecycle", "StreamLifecycle", "HttpHandlers/benched"]);
    for stat in &stats {
        assert!(stat.iterations > 0);
        assert!(stat.total >= stat.min);
    }
}
