// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Plugin handle: ownership root for one loaded plugin.
//!
//! The handle owns the engine instance and the plugin configuration, and
//! exposes the lifecycle operations the test driver steps through: VM
//! start, root configure, stream creation, the four phase sends, stream
//! teardown, and plugin shutdown. Context ids are assigned from a
//! per-handle counter (VM first, then root, then streams).

use filtercheck_core::{
    Buffer, FilterCheckError, FilterDataStatus, FilterHeadersStatus, HeaderMap, Phase, PhaseResult,
    Result,
};

use crate::context::{ContextSlot, HostOptions, HostState, RootContext, StreamContext, VmContext};
use crate::engine::{EngineAdapter, InstanceHandle};

pub struct PluginHandle {
    inst: InstanceHandle,
    plugin_config: Vec<u8>,
    next_context_id: u32,
    vm_id: Option<u32>,
    root_id: Option<u32>,
}

impl PluginHandle {
    /// Compiles and instantiates the plugin. The returned handle has not
    /// run any lifecycle callback yet; call [`Self::start`] next.
    ///
    /// # Errors
    ///
    /// Returns a load error when the module does not compile, its imports
    /// cannot be satisfied, or its start function traps.
    pub fn load(wasm_bytes: &[u8], plugin_config: Vec<u8>, options: HostOptions) -> Result<Self> {
        let adapter = EngineAdapter::load(wasm_bytes, false)?;
        let inst = adapter.instantiate(HostState::new(options))?;
        Ok(Self { inst, plugin_config, next_context_id: 1, vm_id: None, root_id: None })
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_context_id;
        self.next_context_id += 1;
        id
    }

    fn vm_failed(&self) -> FilterCheckError {
        FilterCheckError::VmFailed(self.failure().unwrap_or("unknown trap").to_string())
    }

    /// Creates the VM context and runs `proxy_on_vm_start`.
    ///
    /// # Errors
    ///
    /// Returns a load error when the plugin rejects VM start, or a VM
    /// failure when it traps.
    pub fn start(&mut self) -> Result<()> {
        if self.vm_id.is_some() {
            return Ok(());
        }
        let id = self.next_id();
        let state = self.inst.state_mut();
        state.contexts.insert(id, ContextSlot::Vm(VmContext { id, logs: Vec::new() }));
        state.active = id;
        self.vm_id = Some(id);

        self.inst.on_context_create(id, 0);
        let accepted = self.inst.on_vm_start(id, 0).ok_or_else(|| self.vm_failed())?;
        if accepted {
            Ok(())
        } else {
            Err(FilterCheckError::Load("plugin rejected VM start".to_string()))
        }
    }

    /// Creates the root context and runs `proxy_on_configure` with the
    /// plugin configuration length. Returns whether the plugin accepted
    /// the configuration.
    ///
    /// # Errors
    ///
    /// Returns a VM failure when the plugin traps.
    pub fn configure(&mut self) -> Result<bool> {
        let id = self.next_id();
        let config = Buffer::new(self.plugin_config.clone());
        let state = self.inst.state_mut();
        state
            .contexts
            .insert(id, ContextSlot::Root(RootContext { id, logs: Vec::new(), config, closed: false }));
        state.active = id;
        self.root_id = Some(id);

        self.inst.on_context_create(id, 0);
        let config_len = u32::try_from(self.plugin_config.len())
            .map_err(|_| FilterCheckError::InvalidInput("plugin config too large".to_string()))?;
        self.inst.on_configure(id, config_len).ok_or_else(|| self.vm_failed())
    }

    /// Creates a stream context nested in the root and runs
    /// `proxy_on_context_create` for it. Returns the stream id.
    ///
    /// # Errors
    ///
    /// Fails when the plugin has not been configured yet.
    pub fn create_stream(&mut self) -> Result<u32> {
        let root_id = self
            .root_id
            .ok_or_else(|| FilterCheckError::InvalidInput("plugin is not configured".to_string()))?;
        let id = self.next_id();
        let config = Buffer::new(self.plugin_config.clone());
        let state = self.inst.state_mut();
        state.contexts.insert(
            id,
            ContextSlot::Stream(StreamContext {
                id,
                root_id,
                config,
                phase: Phase::None,
                result: PhaseResult::default(),
                body: Buffer::default(),
                immediate_seen: false,
                torn_down: false,
                logs: Vec::new(),
            }),
        );
        state.active = id;
        self.inst.on_context_create(id, root_id);
        Ok(id)
    }

    /// Installs `headers` as the current request headers and invokes
    /// `proxy_on_request_headers`.
    pub fn send_request_headers(&mut self, stream: u32, headers: HeaderMap) -> PhaseResult {
        let count = u32::try_from(headers.len()).unwrap_or(u32::MAX);
        {
            let state = self.inst.state_mut();
            state.active = stream;
            let Some(ctx) = state.stream_mut(stream) else {
                return PhaseResult::default();
            };
            if ctx.torn_down {
                return PhaseResult::default();
            }
            ctx.logs.clear();
            ctx.result = PhaseResult { headers, ..PhaseResult::default() };
            ctx.phase = Phase::RequestHeaders;
        }
        let status = self.inst.on_request_headers(stream, count, false);
        self.finish_headers_phase(stream, status)
    }

    /// Invokes `proxy_on_response_headers`, unless an immediate response
    /// has already latched on this stream.
    pub fn send_response_headers(&mut self, stream: u32, headers: HeaderMap) -> PhaseResult {
        let count = u32::try_from(headers.len()).unwrap_or(u32::MAX);
        {
            let state = self.inst.state_mut();
            state.active = stream;
            let Some(ctx) = state.stream_mut(stream) else {
                return PhaseResult::default();
            };
            if ctx.torn_down || ctx.immediate_seen {
                return PhaseResult::default();
            }
            ctx.logs.clear();
            ctx.result = PhaseResult { headers, ..PhaseResult::default() };
            ctx.phase = Phase::ResponseHeaders;
        }
        let status = self.inst.on_response_headers(stream, count, false);
        self.finish_headers_phase(stream, status)
    }

    fn finish_headers_phase(&mut self, stream: u32, status: Option<u32>) -> PhaseResult {
        let state = self.inst.state_mut();
        let Some(ctx) = state.stream_mut(stream) else {
            return PhaseResult::default();
        };
        ctx.phase = Phase::None;
        ctx.result.header_status = FilterHeadersStatus::from_abi(status.unwrap_or(0));
        ctx.result.logs.clone_from(&ctx.logs);
        std::mem::take(&mut ctx.result)
    }

    /// Installs `body` as the request body chunk and invokes
    /// `proxy_on_request_body`, unless an immediate response has latched.
    pub fn send_request_body(&mut self, stream: u32, body: Vec<u8>) -> PhaseResult {
        self.send_body(stream, body, Phase::RequestBody)
    }

    /// Response-side counterpart of [`Self::send_request_body`].
    pub fn send_response_body(&mut self, stream: u32, body: Vec<u8>) -> PhaseResult {
        self.send_body(stream, body, Phase::ResponseBody)
    }

    fn send_body(&mut self, stream: u32, body: Vec<u8>, phase: Phase) -> PhaseResult {
        let size = u32::try_from(body.len()).unwrap_or(u32::MAX);
        {
            let state = self.inst.state_mut();
            state.active = stream;
            let Some(ctx) = state.stream_mut(stream) else {
                return PhaseResult::default();
            };
            if ctx.torn_down || ctx.immediate_seen {
                return PhaseResult::default();
            }
            ctx.logs.clear();
            ctx.result = PhaseResult::default();
            ctx.body.set(body);
            ctx.phase = phase;
        }
        let status = if phase == Phase::RequestBody {
            self.inst.on_request_body(stream, size, false)
        } else {
            self.inst.on_response_body(stream, size, false)
        };
        let state = self.inst.state_mut();
        let Some(ctx) = state.stream_mut(stream) else {
            return PhaseResult::default();
        };
        ctx.phase = Phase::None;
        ctx.result.body_status = FilterDataStatus::from_abi(status.unwrap_or(0));
        ctx.result.body = ctx.body.take();
        ctx.result.logs.clone_from(&ctx.logs);
        std::mem::take(&mut ctx.result)
    }

    /// Runs the stream teardown callbacks (`on_log`, `on_done`,
    /// `on_delete`, in that order) once. Skipped entirely on a failed VM;
    /// calling it again is a no-op.
    pub fn teardown_stream(&mut self, stream: u32) {
        let root_id = {
            let state = self.inst.state_mut();
            let Some(ctx) = state.stream_mut(stream) else {
                return;
            };
            if ctx.torn_down {
                return;
            }
            ctx.torn_down = true;
            ctx.logs.clear();
            let root_id = ctx.root_id;
            state.active = stream;
            root_id
        };
        if !self.inst.is_failed() {
            self.inst.on_log(stream);
            self.inst.on_done(stream);
            self.inst.on_delete(stream);
        }
        // Callbacks after the stream's death dispatch to its parent.
        self.inst.state_mut().active = root_id;
    }

    /// Initiates plugin shutdown: tears down the root context.
    pub fn shutdown(&mut self) {
        let Some(root_id) = self.root_id else {
            return;
        };
        {
            let state = self.inst.state_mut();
            let Some(root) = state.root_mut(root_id) else {
                return;
            };
            if root.closed {
                return;
            }
            root.closed = true;
            state.active = root_id;
        }
        if !self.inst.is_failed() {
            self.inst.on_done(root_id);
            self.inst.on_delete(root_id);
        }
    }

    /// The trap diagnostic, when the VM has failed.
    pub fn failure(&self) -> Option<&str> {
        self.inst.failure()
    }

    pub fn is_failed(&self) -> bool {
        self.inst.is_failed()
    }

    /// Logs accumulated on the root context since configure.
    pub fn root_logs(&self) -> &[String] {
        self.root_id
            .and_then(|id| self.inst.state().contexts.get(&id))
            .map_or(&[], |slot| slot.view().logs())
    }

    /// Logs captured on a stream context during its most recent phase
    /// (or teardown).
    pub fn stream_logs(&self, stream: u32) -> &[String] {
        match self.inst.state().contexts.get(&stream) {
            Some(ContextSlot::Stream(ctx)) => &ctx.logs,
            _ => &[],
        }
    }

    /// Appends a raw line (e.g. a per-test banner) to the log sink.
    pub fn write_log_line(&mut self, line: &str) {
        self.inst.state_mut().write_log_line(line);
    }
}
