// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Engine adapter hiding wasmtime behind load / instantiate / invoke.
//!
//! The rest of the runner only sees this surface, so the lifecycle driver
//! is engine-agnostic. A trap during any invocation latches the instance
//! into a failed state and every later invocation becomes a no-op.

use filtercheck_core::{FilterCheckError, Result};
use wasmtime::{Engine, Instance, Linker, Module, Store, TypedFunc};

use crate::context::HostState;
use crate::imports;

/// A compiled plugin module, ready to instantiate.
pub struct EngineAdapter {
    engine: Engine,
    module: Module,
}

impl EngineAdapter {
    /// Compiles `wasm_bytes` (binary or text form).
    ///
    /// # Errors
    ///
    /// Returns a load error when the bytes do not compile or when
    /// `allow_precompiled` is requested (deserializing precompiled modules
    /// is not supported by this host).
    pub fn load(wasm_bytes: &[u8], allow_precompiled: bool) -> Result<Self> {
        if allow_precompiled {
            return Err(FilterCheckError::Load(
                "precompiled modules are not supported".to_string(),
            ));
        }
        let engine = Engine::default();
        let module = Module::new(&engine, wasm_bytes)
            .map_err(|e| FilterCheckError::Load(format!("failed to compile Wasm module: {e:#}")))?;
        Ok(Self { engine, module })
    }

    /// Instantiates the module with the host import table and the given
    /// embedder state, then runs the module's start function.
    ///
    /// # Errors
    ///
    /// Returns a load error when imports cannot be satisfied or the start
    /// function traps.
    pub(crate) fn instantiate(&self, state: HostState) -> Result<InstanceHandle> {
        InstanceHandle::new(self, state)
    }
}

/// Lifecycle exports resolved once at instantiation. Absent exports are
/// tolerated; invoking one is a no-op with the ABI's default result.
struct ExportTable {
    on_context_create: Option<TypedFunc<(u32, u32), ()>>,
    on_vm_start: Option<TypedFunc<(u32, u32), u32>>,
    on_configure: Option<TypedFunc<(u32, u32), u32>>,
    // Header callbacks carry an end-of-stream flag from ABI 0.2 on; both
    // arities are probed so 0.1 plugins keep working.
    on_request_headers3: Option<TypedFunc<(u32, u32, u32), u32>>,
    on_request_headers2: Option<TypedFunc<(u32, u32), u32>>,
    on_response_headers3: Option<TypedFunc<(u32, u32, u32), u32>>,
    on_response_headers2: Option<TypedFunc<(u32, u32), u32>>,
    on_request_body: Option<TypedFunc<(u32, u32, u32), u32>>,
    on_response_body: Option<TypedFunc<(u32, u32, u32), u32>>,
    on_log: Option<TypedFunc<u32, ()>>,
    on_done: Option<TypedFunc<u32, u32>>,
    on_delete: Option<TypedFunc<u32, ()>>,
}

impl ExportTable {
    fn resolve(instance: &Instance, store: &mut Store<HostState>) -> Self {
        Self {
            on_context_create: instance.get_typed_func(&mut *store, "proxy_on_context_create").ok(),
            on_vm_start: instance.get_typed_func(&mut *store, "proxy_on_vm_start").ok(),
            on_configure: instance.get_typed_func(&mut *store, "proxy_on_configure").ok(),
            on_request_headers3: instance
                .get_typed_func(&mut *store, "proxy_on_request_headers")
                .ok(),
            on_request_headers2: instance
                .get_typed_func(&mut *store, "proxy_on_request_headers")
                .ok(),
            on_response_headers3: instance
                .get_typed_func(&mut *store, "proxy_on_response_headers")
                .ok(),
            on_response_headers2: instance
                .get_typed_func(&mut *store, "proxy_on_response_headers")
                .ok(),
            on_request_body: instance.get_typed_func(&mut *store, "proxy_on_request_body").ok(),
            on_response_body: instance.get_typed_func(&mut *store, "proxy_on_response_body").ok(),
            on_log: instance.get_typed_func(&mut *store, "proxy_on_log").ok(),
            on_done: instance.get_typed_func(&mut *store, "proxy_on_done").ok(),
            on_delete: instance.get_typed_func(&mut *store, "proxy_on_delete").ok(),
        }
    }
}

/// One live plugin instance: store, instance, resolved exports, and the
/// failure latch.
pub(crate) struct InstanceHandle {
    store: Store<HostState>,
    instance: Instance,
    exports: ExportTable,
    failure: Option<String>,
}

impl InstanceHandle {
    fn new(adapter: &EngineAdapter, state: HostState) -> Result<Self> {
        let mut store = Store::new(&adapter.engine, state);
        let mut linker: Linker<HostState> = Linker::new(&adapter.engine);
        wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |state: &mut HostState| {
            &mut state.wasi
        })
        .map_err(|e| FilterCheckError::Load(format!("failed to link WASI: {e:#}")))?;
        imports::register(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &adapter.module)
            .map_err(|e| FilterCheckError::Load(format!("failed to instantiate module: {e:#}")))?;

        let exports = ExportTable::resolve(&instance, &mut store);
        let mut handle = Self { store, instance, exports, failure: None };
        handle.run_module_start()?;
        Ok(handle)
    }

    /// Runs `_initialize` (reactor) or `_start` (command) when exported.
    /// A clean `proc_exit(0)` from `_start` counts as success.
    fn run_module_start(&mut self) -> Result<()> {
        if let Ok(init) = self.instance.get_typed_func::<(), ()>(&mut self.store, "_initialize") {
            return init.call(&mut self.store, ()).map_err(|e| {
                FilterCheckError::Load(format!("module _initialize trapped: {e:#}"))
            });
        }
        if let Ok(start) = self.instance.get_typed_func::<(), ()>(&mut self.store, "_start") {
            if let Err(err) = start.call(&mut self.store, ()) {
                let clean_exit = err
                    .downcast_ref::<wasmtime_wasi::I32Exit>()
                    .is_some_and(|exit| exit.0 == 0);
                if !clean_exit {
                    return Err(FilterCheckError::Load(format!("module _start trapped: {err:#}")));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub(crate) fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub(crate) fn state(&self) -> &HostState {
        self.store.data()
    }

    pub(crate) fn state_mut(&mut self) -> &mut HostState {
        self.store.data_mut()
    }

    fn record_trap(&mut self, callback: &str, err: &wasmtime::Error) {
        tracing::error!(callback, error = %format!("{err:#}"), "Wasm VM trapped");
        self.failure = Some(format!("{callback}: {err:#}"));
    }

    pub(crate) fn on_context_create(&mut self, id: u32, parent: u32) {
        if self.failure.is_some() {
            return;
        }
        if let Some(func) = self.exports.on_context_create.clone() {
            if let Err(err) = func.call(&mut self.store, (id, parent)) {
                self.record_trap("proxy_on_context_create", &err);
            }
        }
    }

    pub(crate) fn on_vm_start(&mut self, id: u32, vm_config_size: u32) -> Option<bool> {
        if self.failure.is_some() {
            return None;
        }
        let Some(func) = self.exports.on_vm_start.clone() else {
            return Some(true);
        };
        match func.call(&mut self.store, (id, vm_config_size)) {
            Ok(accepted) => Some(accepted != 0),
            Err(err) => {
                self.record_trap("proxy_on_vm_start", &err);
                None
            }
        }
    }

    pub(crate) fn on_configure(&mut self, id: u32, config_size: u32) -> Option<bool> {
        if self.failure.is_some() {
            return None;
        }
        let Some(func) = self.exports.on_configure.clone() else {
            return Some(true);
        };
        match func.call(&mut self.store, (id, config_size)) {
            Ok(accepted) => Some(accepted != 0),
            Err(err) => {
                self.record_trap("proxy_on_configure", &err);
                None
            }
        }
    }

    fn call_headers(
        &mut self,
        callback: &'static str,
        func3: Option<TypedFunc<(u32, u32, u32), u32>>,
        func2: Option<TypedFunc<(u32, u32), u32>>,
        id: u32,
        num_headers: u32,
        end_of_stream: bool,
    ) -> Option<u32> {
        if self.failure.is_some() {
            return None;
        }
        let result = if let Some(func) = func3 {
            func.call(&mut self.store, (id, num_headers, u32::from(end_of_stream)))
        } else if let Some(func) = func2 {
            func.call(&mut self.store, (id, num_headers))
        } else {
            return Some(0);
        };
        match result {
            Ok(status) => Some(status),
            Err(err) => {
                self.record_trap(callback, &err);
                None
            }
        }
    }

    pub(crate) fn on_request_headers(
        &mut self,
        id: u32,
        num_headers: u32,
        end_of_stream: bool,
    ) -> Option<u32> {
        let (func3, func2) = (self.exports.on_request_headers3.clone(), self.exports.on_request_headers2.clone());
        self.call_headers("proxy_on_request_headers", func3, func2, id, num_headers, end_of_stream)
    }

    pub(crate) fn on_response_headers(
        &mut self,
        id: u32,
        num_headers: u32,
        end_of_stream: bool,
    ) -> Option<u32> {
        let (func3, func2) = (self.exports.on_response_headers3.clone(), self.exports.on_response_headers2.clone());
        self.call_headers("proxy_on_response_headers", func3, func2, id, num_headers, end_of_stream)
    }

    fn call_body(
        &mut self,
        callback: &'static str,
        func: Option<TypedFunc<(u32, u32, u32), u32>>,
        id: u32,
        body_size: u32,
        end_of_stream: bool,
    ) -> Option<u32> {
        if self.failure.is_some() {
            return None;
        }
        let Some(func) = func else {
            return Some(0);
        };
        match func.call(&mut self.store, (id, body_size, u32::from(end_of_stream))) {
            Ok(status) => Some(status),
            Err(err) => {
                self.record_trap(callback, &err);
                None
            }
        }
    }

    pub(crate) fn on_request_body(
        &mut self,
        id: u32,
        body_size: u32,
        end_of_stream: bool,
    ) -> Option<u32> {
        let func = self.exports.on_request_body.clone();
        self.call_body("proxy_on_request_body", func, id, body_size, end_of_stream)
    }

    pub(crate) fn on_response_body(
        &mut self,
        id: u32,
        body_size: u32,
        end_of_stream: bool,
    ) -> Option<u32> {
        let func = self.exports.on_response_body.clone();
        self.call_body("proxy_on_response_body", func, id, body_size, end_of_stream)
    }

    pub(crate) fn on_log(&mut self, id: u32) {
        if self.failure.is_some() {
            return;
        }
        if let Some(func) = self.exports.on_log.clone() {
            if let Err(err) = func.call(&mut self.store, id) {
                self.record_trap("proxy_on_log", &err);
            }
        }
    }

    pub(crate) fn on_done(&mut self, id: u32) -> Option<bool> {
        if self.failure.is_some() {
            return None;
        }
        let Some(func) = self.exports.on_done.clone() else {
            return Some(true);
        };
        match func.call(&mut self.store, id) {
            Ok(done) => Some(done != 0),
            Err(err) => {
                self.record_trap("proxy_on_done", &err);
                None
            }
        }
    }

    pub(crate) fn on_delete(&mut self, id: u32) {
        if self.failure.is_some() {
            return;
        }
        if let Some(func) = self.exports.on_delete.clone() {
            if let Err(err) = func.call(&mut self.store, id) {
                self.record_trap("proxy_on_delete", &err);
            }
        }
    }
}
