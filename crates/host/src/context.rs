// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Context state reachable from host callbacks.
//!
//! One [`VmContext`] per plugin, one [`RootContext`] per configured plugin,
//! and zero or more [`StreamContext`]s strictly nested inside the root's
//! lifetime. The three concrete types share the [`ContextView`] capability
//! surface; host imports resolve the active context id through the
//! [`HostState`] registry and dispatch through that surface.

use std::collections::HashMap;
use std::io::Write;

use filtercheck_core::{Buffer, BufferKind, HeaderMap, LogLevel, Phase, PhaseResult};
use wasmtime_wasi::p1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

/// Clock value handed to plugins when the suite does not pin one.
/// Unix epoch + 1ms; Go plugins require a non-zero clock at init.
pub const DEFAULT_CLOCK_NANOS: u64 = 1_000_000;

/// Parameters customizing host behavior for one plugin handle.
pub struct HostOptions {
    /// Minimum severity a plugin log line must have to be captured.
    pub log_level: LogLevel,
    /// Fixed timestamp returned for both current and monotonic time.
    pub clock_nanos: u64,
    /// Optional sink receiving every captured log line.
    pub log_sink: Option<Box<dyn Write + Send>>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self { log_level: LogLevel::Info, clock_nanos: DEFAULT_CLOCK_NANOS, log_sink: None }
    }
}

/// Capability surface shared by the three context flavors.
pub(crate) trait ContextView {
    fn id(&self) -> u32;
    fn logs(&self) -> &[String];
    fn push_log(&mut self, line: String);
}

/// Per-VM context; exists from instantiation to handle teardown.
pub(crate) struct VmContext {
    pub id: u32,
    pub logs: Vec<String>,
}

/// Per-plugin context; owns the plugin configuration buffer.
pub(crate) struct RootContext {
    pub id: u32,
    pub logs: Vec<String>,
    pub config: Buffer,
    pub closed: bool,
}

/// Per-HTTP-stream context; owns the phase state, the body buffer, and the
/// result accumulator serviced by the header/body/local-response callbacks.
pub(crate) struct StreamContext {
    pub id: u32,
    pub root_id: u32,
    pub config: Buffer,
    pub phase: Phase,
    pub result: PhaseResult,
    pub body: Buffer,
    pub immediate_seen: bool,
    pub torn_down: bool,
    pub logs: Vec<String>,
}

macro_rules! impl_context_view {
    ($ty:ty) => {
        impl ContextView for $ty {
            fn id(&self) -> u32 {
                self.id
            }
            fn logs(&self) -> &[String] {
                &self.logs
            }
            fn push_log(&mut self, line: String) {
                self.logs.push(line);
            }
        }
    };
}

impl_context_view!(VmContext);
impl_context_view!(RootContext);
impl_context_view!(StreamContext);

impl StreamContext {
    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.result.headers
    }
}

/// Registry slot; the id → slot map lets callbacks find the context the
/// engine-state active id points at.
pub(crate) enum ContextSlot {
    Vm(VmContext),
    Root(RootContext),
    Stream(StreamContext),
}

impl ContextSlot {
    pub(crate) fn view_mut(&mut self) -> &mut dyn ContextView {
        match self {
            Self::Vm(ctx) => ctx,
            Self::Root(ctx) => ctx,
            Self::Stream(ctx) => ctx,
        }
    }

    pub(crate) fn view(&self) -> &dyn ContextView {
        match self {
            Self::Vm(ctx) => ctx,
            Self::Root(ctx) => ctx,
            Self::Stream(ctx) => ctx,
        }
    }
}

/// Write access classification for `proxy_set_buffer_bytes`.
pub(crate) enum BufferAccess<'a> {
    /// No such buffer in the current scope/phase.
    Missing,
    /// Visible but not writable (plugin configuration).
    ReadOnly,
    Writable(&'a mut Buffer),
}

/// Embedder state stored in the wasmtime store; host imports reach all
/// mutable test state through it.
pub struct HostState {
    pub(crate) wasi: WasiP1Ctx,
    pub(crate) contexts: HashMap<u32, ContextSlot>,
    pub(crate) active: u32,
    pub(crate) options: HostOptions,
    pub(crate) properties: HashMap<String, Vec<u8>>,
}

impl HostState {
    pub(crate) fn new(options: HostOptions) -> Self {
        let wasi = WasiCtxBuilder::new().inherit_stdout().inherit_stderr().build_p1();
        let mut properties = HashMap::new();
        properties.insert("plugin_name".to_string(), b"test".to_vec());
        properties.insert("plugin_root_id".to_string(), Vec::new());
        properties.insert("plugin_vm_id".to_string(), Vec::new());
        Self { wasi, contexts: HashMap::new(), active: 0, options, properties }
    }

    pub(crate) fn active_view(&mut self) -> Option<&mut dyn ContextView> {
        self.contexts.get_mut(&self.active).map(ContextSlot::view_mut)
    }

    pub(crate) fn active_stream(&mut self) -> Option<&mut StreamContext> {
        match self.contexts.get_mut(&self.active) {
            Some(ContextSlot::Stream(ctx)) => Some(ctx),
            _ => None,
        }
    }

    pub(crate) fn stream_mut(&mut self, id: u32) -> Option<&mut StreamContext> {
        match self.contexts.get_mut(&id) {
            Some(ContextSlot::Stream(ctx)) => Some(ctx),
            _ => None,
        }
    }

    pub(crate) fn root_mut(&mut self, id: u32) -> Option<&mut RootContext> {
        match self.contexts.get_mut(&id) {
            Some(ContextSlot::Root(ctx)) => Some(ctx),
            _ => None,
        }
    }

    /// Fixed wall clock.
    pub(crate) const fn current_time_nanos(&self) -> u64 {
        self.options.clock_nanos
    }

    /// Fixed monotonic clock; identical to the wall clock so replays are
    /// reproducible.
    pub(crate) const fn monotonic_time_nanos(&self) -> u64 {
        self.options.clock_nanos
    }

    /// Buffer readable in the current scope, honoring phase restrictions.
    pub(crate) fn readable_buffer(&mut self, kind: BufferKind) -> Option<&Buffer> {
        match kind {
            BufferKind::PluginConfiguration => match self.contexts.get(&self.active) {
                Some(ContextSlot::Root(ctx)) => Some(&ctx.config),
                Some(ContextSlot::Stream(ctx)) => Some(&ctx.config),
                _ => None,
            },
            BufferKind::HttpRequestBody | BufferKind::HttpResponseBody => {
                let stream = self.active_stream()?;
                if stream.phase.body_buffer_kind() == Some(kind) {
                    Some(&stream.body)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Buffer writable in the current scope. Plugin configuration is
    /// visible but read-only to the plugin.
    pub(crate) fn writable_buffer(&mut self, kind: BufferKind) -> BufferAccess<'_> {
        match kind {
            BufferKind::PluginConfiguration => match self.contexts.get(&self.active) {
                Some(ContextSlot::Root(_) | ContextSlot::Stream(_)) => BufferAccess::ReadOnly,
                _ => BufferAccess::Missing,
            },
            BufferKind::HttpRequestBody | BufferKind::HttpResponseBody => {
                match self.active_stream() {
                    Some(stream) if stream.phase.body_buffer_kind() == Some(kind) => {
                        BufferAccess::Writable(&mut stream.body)
                    }
                    _ => BufferAccess::Missing,
                }
            }
            _ => BufferAccess::Missing,
        }
    }

    /// Captures a plugin log line into the active context when it clears
    /// the configured threshold; echoes at trace for host debugging.
    pub(crate) fn capture_log(&mut self, level: LogLevel, message: &str) {
        let captured = level >= self.options.log_level;
        if let Some(view) = self.active_view() {
            tracing::trace!(context = view.id(), level = level.as_str(), "[plugin] {message}");
            if captured {
                view.push_log(message.to_string());
            }
        }
        if captured {
            self.write_log_line(message);
        }
    }

    /// Appends a line to the configured log sink, if any.
    pub(crate) fn write_log_line(&mut self, line: &str) {
        if let Some(sink) = self.options.log_sink.as_mut() {
            if let Err(err) = writeln!(sink, "{line}") {
                tracing::warn!(error = %err, "failed to write plugin log line");
            }
        }
    }
}
