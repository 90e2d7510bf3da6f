// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Core data model for FilterCheck.
//!
//! This crate holds the engine-agnostic pieces of the Proxy-Wasm test
//! runner: the ABI status and kind enums, the case-insensitive header map,
//! the spliceable body buffer, the per-phase result accumulator, and the
//! shared error type. Everything here is pure data; the wasmtime-backed
//! host lives in `filtercheck-host`.

pub mod abi;
pub mod buffer;
pub mod error;
pub mod headers;
pub mod phase;
pub mod result;

pub use abi::{
    BufferKind, FilterDataStatus, FilterHeadersStatus, HeaderMapKind, LogLevel, WasmResult,
};
pub use buffer::Buffer;
pub use error::{FilterCheckError, Result};
pub use headers::HeaderMap;
pub use phase::Phase;
pub use result::{ImmediateResponse, PhaseResult};
