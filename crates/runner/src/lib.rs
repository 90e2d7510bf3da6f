// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Suite loading, lifecycle driving, and expectation checking.
//!
//! The runner consumes a declarative suite document (YAML or textproto)
//! describing a plugin binary, its configuration, and a sequence of phase
//! invocations with expected outputs. For each test it builds a plugin
//! handle via `filtercheck-host`, steps through the configured phases, and
//! records every expectation mismatch. Opted-in tests can additionally be
//! replayed under the benchmark driver.

pub mod bench;
pub mod driver;
pub mod expect;
pub mod http1;
pub mod loader;
pub mod matcher;
pub mod suite;
pub mod textproto;

pub use driver::{run_suite, run_test, SuiteReport, TestReport};
pub use loader::{apply_overrides, load_suite, Overrides, SuiteFormat};
pub use suite::{ConfigLogLevel, Env, Test, TestSuite};
