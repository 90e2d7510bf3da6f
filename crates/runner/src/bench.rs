// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The benchmark driver.
//!
//! Three loops over the lifecycle driver: `PluginLifecycle` (root
//! configure + shutdown), `StreamLifecycle` (stream create + destroy),
//! and `HttpHandlers` (full phase replay per opted-in test). Logging is
//! forced to CRITICAL so its cost stays out of the numbers, and the
//! `HttpHandlers` timings exclude per-iteration setup (stream creation
//! and body-chunk copies).

use std::fmt;
use std::time::{Duration, Instant};

use filtercheck_core::{FilterCheckError, HeaderMap, Result};
use filtercheck_host::PluginHandle;

use crate::driver::{build_body, build_headers, load_plugin};
use crate::suite::{Env, Test, TestSuite};

const WARMUP_ITERATIONS: u64 = 8;
const MIN_MEASURE_ITERATIONS: u64 = 32;
const MAX_MEASURE_ITERATIONS: u64 = 10_000;
const TARGET_MEASURE_TIME: Duration = Duration::from_millis(200);

/// Wall-clock statistics for one benchmark.
#[derive(Debug)]
pub struct BenchStats {
    pub name: String,
    pub iterations: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl BenchStats {
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.iterations == 0 {
            Duration::ZERO
        } else {
            self.total / u32::try_from(self.iterations).unwrap_or(u32::MAX)
        }
    }
}

impl fmt::Display for BenchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<40} {:>8} iters  mean {:>10?}  min {:>10?}  max {:>10?}",
            self.name,
            self.iterations,
            self.mean(),
            self.min,
            self.max,
        )
    }
}

fn measure(
    name: &str,
    mut iteration: impl FnMut() -> Result<Duration>,
) -> Result<BenchStats> {
    for _ in 0..WARMUP_ITERATIONS {
        iteration()?;
    }
    let mut iterations = 0;
    let mut total = Duration::ZERO;
    let mut min = Duration::MAX;
    let mut max = Duration::ZERO;
    loop {
        let elapsed = iteration()?;
        iterations += 1;
        total += elapsed;
        min = min.min(elapsed);
        max = max.max(elapsed);
        if iterations >= MAX_MEASURE_ITERATIONS
            || (iterations >= MIN_MEASURE_ITERATIONS && total >= TARGET_MEASURE_TIME)
        {
            break;
        }
    }
    Ok(BenchStats { name: name.to_string(), iterations, total, min, max })
}

fn vm_guard(handle: &PluginHandle) -> Result<()> {
    match handle.failure() {
        None => Ok(()),
        Some(msg) => Err(FilterCheckError::VmFailed(msg.to_string())),
    }
}

/// Runs every benchmark requested by the suite: the two lifecycle
/// benchmarks once (when any test opts in), then `HttpHandlers` per
/// opted-in test.
///
/// # Errors
///
/// Fails on plugin load problems or a VM failure mid-benchmark.
pub fn run_benchmarks(suite: &TestSuite) -> Result<Vec<BenchStats>> {
    let mut stats = Vec::new();
    let mut lifecycle_done = false;
    for test in &suite.tests {
        if !test.benchmark {
            continue;
        }
        if !lifecycle_done {
            lifecycle_done = true;
            stats.push(bench_plugin_lifecycle(&suite.env)?);
            stats.push(bench_stream_lifecycle(&suite.env)?);
        }
        stats.push(bench_http_handlers(&suite.env, test)?);
    }
    Ok(stats)
}

/// Repeatedly configures and shuts down a root context on one VM.
fn bench_plugin_lifecycle(env: &Env) -> Result<BenchStats> {
    let mut handle = load_plugin(env, true)?;
    handle.start()?;
    measure("PluginLifecycle", || {
        let started = Instant::now();
        handle.configure()?;
        handle.shutdown();
        vm_guard(&handle)?;
        Ok(started.elapsed())
    })
}

/// Repeatedly creates and destroys stream contexts on one configured
/// plugin.
fn bench_stream_lifecycle(env: &Env) -> Result<BenchStats> {
    let mut handle = configured_handle(env)?;
    measure("StreamLifecycle", || {
        let started = Instant::now();
        let stream = handle.create_stream()?;
        handle.teardown_stream(stream);
        vm_guard(&handle)?;
        Ok(started.elapsed())
    })
}

fn configured_handle(env: &Env) -> Result<PluginHandle> {
    let mut handle = load_plugin(env, true)?;
    handle.start()?;
    if !handle.configure()? {
        return Err(FilterCheckError::Load("plugin rejected configuration".to_string()));
    }
    Ok(handle)
}

/// One step of the phase sequence, with its (pre-built) input.
#[derive(Clone)]
enum PhaseStep {
    RequestHeaders(HeaderMap),
    RequestBody(Vec<u8>),
    ResponseHeaders(HeaderMap),
    ResponseBody(Vec<u8>),
}

impl PhaseStep {
    fn send(self, handle: &mut PluginHandle, stream: u32) {
        match self {
            Self::RequestHeaders(headers) => {
                handle.send_request_headers(stream, headers);
            }
            Self::RequestBody(body) => {
                handle.send_request_body(stream, body);
            }
            Self::ResponseHeaders(headers) => {
                handle.send_response_headers(stream, headers);
            }
            Self::ResponseBody(body) => {
                handle.send_response_body(stream, body);
            }
        }
    }
}

fn phase_plan(env: &Env, test: &Test) -> Result<Vec<PhaseStep>> {
    let mut plan = Vec::new();
    if let Some(invocation) = &test.request_headers {
        plan.push(PhaseStep::RequestHeaders(build_headers(env, &invocation.input, true)?));
    }
    for invocation in &test.request_body {
        plan.push(PhaseStep::RequestBody(build_body(&invocation.input)));
    }
    if let Some(invocation) = &test.response_headers {
        plan.push(PhaseStep::ResponseHeaders(build_headers(env, &invocation.input, false)?));
    }
    for invocation in &test.response_body {
        plan.push(PhaseStep::ResponseBody(build_body(&invocation.input)));
    }
    Ok(plan)
}

/// A long-lived extra stream cycling through the phase plan to put
/// concurrent-stream load on the plugin during `HttpHandlers`.
struct StreamCursor {
    stream: u32,
    step: usize,
}

impl StreamCursor {
    fn advance(&mut self, handle: &mut PluginHandle, plan: &[PhaseStep]) -> Result<()> {
        if self.step >= plan.len() {
            handle.teardown_stream(self.stream);
            self.stream = handle.create_stream()?;
            self.step = 0;
        }
        if let Some(step) = plan.get(self.step) {
            step.clone().send(handle, self.stream);
        }
        self.step += 1;
        Ok(())
    }
}

/// Replays the test's full phase sequence per iteration; timing covers
/// only the handler invocations.
fn bench_http_handlers(env: &Env, test: &Test) -> Result<BenchStats> {
    let mut handle = configured_handle(env)?;
    let plan = phase_plan(env, test)?;

    let mut extra: Vec<StreamCursor> = Vec::new();
    for _ in 0..env.num_additional_streams {
        extra.push(StreamCursor { stream: handle.create_stream()?, step: 0 });
    }
    let advance_rate = if plan.is_empty() { 0 } else { env.additional_stream_advance_rate };
    let mut next_extra = 0usize;

    let name = format!("HttpHandlers/{}", test.name);
    measure(&name, || {
        // Per-iteration setup (stream creation, input copies) stays
        // outside the timed region.
        let stream = handle.create_stream()?;
        let steps = plan.clone();

        let mut elapsed = Duration::ZERO;
        for step in steps {
            let started = Instant::now();
            step.send(&mut handle, stream);
            elapsed += started.elapsed();
            vm_guard(&handle)?;
        }
        if !extra.is_empty() {
            for _ in 0..advance_rate {
                let cursor_index = next_extra;
                next_extra = (next_extra + 1) % extra.len();
                let started = Instant::now();
                extra[cursor_index].advance(&mut handle, &plan)?;
                elapsed += started.elapsed();
                vm_guard(&handle)?;
            }
        }

        handle.teardown_stream(stream);
        vm_guard(&handle)?;
        Ok(elapsed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_mean() {
        let stats = BenchStats {
            name: "x".to_string(),
            iterations: 4,
            total: Duration::from_nanos(400),
            min: Duration::from_nanos(50),
            max: Duration::from_nanos(200),
        };
        assert_eq!(stats.mean(), Duration::from_nanos(100));
    }

    #[test]
    fn test_measure_counts_iterations() {
        let mut calls = 0u64;
        let stats = measure("unit", || {
            calls += 1;
            Ok(Duration::from_millis(10))
        })
        .unwrap_or_else(|e| panic!("measure failed: {e}"));
        assert_eq!(stats.iterations + WARMUP_ITERATIONS, calls);
        assert!(stats.iterations >= MIN_MEASURE_ITERATIONS);
        assert_eq!(stats.min, Duration::from_millis(10));
    }

    #[test]
    fn test_measure_propagates_errors() {
        let result = measure("unit", || Err(FilterCheckError::Load("boom".to_string())));
        assert!(result.is_err());
    }
}
