// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The lifecycle driver.
//!
//! Steps each test's plugin through VM create → root start → root
//! configure → stream create → header/body phases → stream destroy →
//! plugin shutdown, checking VM health after every step and handing each
//! captured result to the expectation engine. Teardown runs even when
//! expectations fail; only a failed VM skips the remaining callbacks.

use std::io::Write;

use filtercheck_core::{FilterCheckError, HeaderMap, LogLevel, Phase, Result};
use filtercheck_host::{HostOptions, PluginHandle, DEFAULT_CLOCK_NANOS};

use crate::expect::{check_phase_results, check_side_effects};
use crate::http1;
use crate::loader::{base_dir, resolve_path};
use crate::suite::{Env, Input, Test, TestSuite};

/// Outcome of one test: empty `failures` means it passed.
#[derive(Debug)]
pub struct TestReport {
    pub name: String,
    pub failures: Vec<String>,
}

impl TestReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a whole suite run.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub reports: Vec<TestReport>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.reports.iter().all(TestReport::passed)
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|report| !report.passed()).count()
    }
}

/// Runs every test in the suite, in order.
#[must_use]
pub fn run_suite(suite: &TestSuite) -> SuiteReport {
    let reports = suite.tests.iter().map(|test| run_test(&suite.env, test)).collect();
    SuiteReport { reports }
}

/// Builds a plugin handle for this environment. Benchmarks force the
/// CRITICAL log threshold and never write a log file.
pub(crate) fn load_plugin(env: &Env, benchmark: bool) -> Result<PluginHandle> {
    let log_level =
        if benchmark { LogLevel::Critical } else { env.log_level.effective() };
    let wasm = std::fs::read(&env.wasm_path).map_err(|err| {
        FilterCheckError::Load(format!("failed to read plugin {}: {err}", env.wasm_path))
    })?;
    let config = if env.config_path.is_empty() {
        Vec::new()
    } else {
        std::fs::read(&env.config_path).map_err(|err| {
            FilterCheckError::Load(format!(
                "failed to read plugin config {}: {err}",
                env.config_path
            ))
        })?
    };
    let log_sink: Option<Box<dyn Write + Send>> = if benchmark || env.log_path.is_empty() {
        None
    } else if env.log_path == "-" {
        Some(Box::new(std::io::stdout()))
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&env.log_path)
            .map_err(FilterCheckError::Io)?;
        Some(Box::new(file))
    };
    let clock_nanos = if env.time_secs > 0 {
        env.time_secs.saturating_mul(1_000_000_000)
    } else {
        DEFAULT_CLOCK_NANOS
    };
    PluginHandle::load(&wasm, config, HostOptions { log_level, clock_nanos, log_sink })
}

/// Builds the header map fed into a headers phase.
pub(crate) fn build_headers(env: &Env, input: &Input, is_request: bool) -> Result<HeaderMap> {
    let parse = |content: &str| {
        if is_request {
            http1::parse_request(content)
        } else {
            http1::parse_response(content)
        }
    };
    if !input.file.is_empty() {
        let path = resolve_path(env, &input.file);
        let content = std::fs::read_to_string(&path).map_err(|err| {
            FilterCheckError::InvalidInput(format!("input file {}: {err}", path.display()))
        })?;
        return parse(&content);
    }
    if !input.content.is_empty() {
        return parse(&input.content);
    }
    let mut map = HeaderMap::new();
    for pair in &input.header {
        map.insert_or_append(&pair.key, &pair.value);
    }
    Ok(map)
}

/// Body phases feed the inline content verbatim.
pub(crate) fn build_body(input: &Input) -> Vec<u8> {
    input.content.clone().into_bytes()
}

/// Checks the VM health after a lifecycle step. On failure, records a
/// diagnostic including the phase name and the logs captured so far.
fn vm_ok(phase: &str, handle: &PluginHandle, logs: &[String], failures: &mut Vec<String>) -> bool {
    match handle.failure() {
        None => true,
        Some(msg) => {
            failures.push(format!(
                "[{phase}] Wasm VM failed: {msg}\nlogs:\n{}",
                logs.join("\n")
            ));
            false
        }
    }
}

/// Runs a single test end to end.
#[must_use]
pub fn run_test(env: &Env, test: &Test) -> TestReport {
    let mut failures = Vec::new();
    match load_plugin(env, false) {
        Err(err) => failures.push(format!("[load] {err}")),
        Ok(mut handle) => {
            handle.write_log_line(&format!("--- Starting test: {} ---", test.name));
            run_test_phases(env, test, &mut handle, &mut failures);
            handle.write_log_line(&format!("--- Finished test: {} ---", test.name));
        }
    }
    if failures.is_empty() {
        tracing::info!(test = %test.name, "test passed");
    } else {
        tracing::warn!(test = %test.name, failures = failures.len(), "test failed");
    }
    TestReport { name: test.name.clone(), failures }
}

#[allow(clippy::cognitive_complexity, clippy::too_many_lines)]
fn run_test_phases(
    env: &Env,
    test: &Test,
    handle: &mut PluginHandle,
    failures: &mut Vec<String>,
) {
    tracing::debug!(test = %test.name, plugin = %env.wasm_path, "running test");
    let base = base_dir(env);

    // Plugin initialization: VM start, root context, configure.
    if let Err(err) = handle.start() {
        failures.push(format!("[plugin_init] {err}"));
        return;
    }
    let accepted = match handle.configure() {
        Ok(accepted) => accepted,
        Err(err) => {
            failures.push(format!(
                "[plugin_init] {err}\nlogs:\n{}",
                handle.root_logs().join("\n")
            ));
            return;
        }
    };
    check_side_effects("plugin_init", &test.plugin_init, handle.root_logs(), &base, failures);
    if !accepted {
        // Rejected configuration counts as a plugin_init failure; stream
        // phases are skipped but the expectations above already ran.
        failures.push("[plugin_init] plugin rejected configuration".to_string());
        return;
    }

    // Stream initialization.
    let stream = match handle.create_stream() {
        Ok(stream) => stream,
        Err(err) => {
            failures.push(format!("[stream_init] {err}"));
            return;
        }
    };
    if !vm_ok("stream_init", handle, handle.stream_logs(stream), failures) {
        return;
    }
    check_side_effects("stream_init", &test.stream_init, handle.stream_logs(stream), &base, failures);

    // Phase invocations, in fixed order.
    if let Some(invocation) = &test.request_headers {
        match build_headers(env, &invocation.input, true) {
            Err(err) => {
                failures.push(format!("[request_headers] {err}"));
                return;
            }
            Ok(headers) => {
                let result = handle.send_request_headers(stream, headers);
                if !vm_ok("request_headers", handle, &result.logs, failures) {
                    return;
                }
                check_phase_results(
                    "request_headers",
                    Phase::RequestHeaders,
                    &invocation.result,
                    &result,
                    &base,
                    failures,
                );
            }
        }
    }
    for invocation in &test.request_body {
        let result = handle.send_request_body(stream, build_body(&invocation.input));
        if !vm_ok("request_body", handle, &result.logs, failures) {
            return;
        }
        check_phase_results(
            "request_body",
            Phase::RequestBody,
            &invocation.result,
            &result,
            &base,
            failures,
        );
    }
    if let Some(invocation) = &test.response_headers {
        match build_headers(env, &invocation.input, false) {
            Err(err) => {
                failures.push(format!("[response_headers] {err}"));
                return;
            }
            Ok(headers) => {
                let result = handle.send_response_headers(stream, headers);
                if !vm_ok("response_headers", handle, &result.logs, failures) {
                    return;
                }
                check_phase_results(
                    "response_headers",
                    Phase::ResponseHeaders,
                    &invocation.result,
                    &result,
                    &base,
                    failures,
                );
            }
        }
    }
    for invocation in &test.response_body {
        let result = handle.send_response_body(stream, build_body(&invocation.input));
        if !vm_ok("response_body", handle, &result.logs, failures) {
            return;
        }
        check_phase_results(
            "response_body",
            Phase::ResponseBody,
            &invocation.result,
            &result,
            &base,
            failures,
        );
    }

    // Stream teardown and plugin shutdown.
    handle.teardown_stream(stream);
    if !vm_ok("stream_destroy", handle, handle.stream_logs(stream), failures) {
        return;
    }
    check_side_effects(
        "stream_destroy",
        &test.stream_destroy,
        handle.stream_logs(stream),
        &base,
        failures,
    );

    handle.shutdown();
    if let Some(msg) = handle.failure() {
        failures.push(format!("[plugin_destroy] Wasm VM failed: {msg}"));
    }
}
