// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wasmtime-backed Proxy-Wasm host for FilterCheck.
//!
//! This crate is the in-memory stand-in for a Proxy-Wasm-capable proxy: it
//! loads a plugin module, installs the `proxy_*` host import table, and
//! drives the plugin through the VM / root / stream lifecycle while
//! capturing every observable side effect (header and body mutations,
//! immediate responses, logs, clock reads).
//!
//! The layering is:
//! - [`engine`]: the engine adapter hiding wasmtime behind load /
//!   instantiate / invoke with a trap latch,
//! - [`context`]: the VM, root, and stream context state reachable from
//!   host callbacks through the embedder-state registry,
//! - [`imports`]: the host import table and guest-memory marshalling,
//! - [`handle`]: the plugin handle exposing lifecycle operations to the
//!   test driver.

pub mod context;
pub mod engine;
pub mod handle;
mod imports;

pub use context::{HostOptions, DEFAULT_CLOCK_NANOS};
pub use engine::EngineAdapter;
pub use handle::PluginHandle;
