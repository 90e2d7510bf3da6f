// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Proxy-Wasm host import table.
//!
//! Every function here is installed under the `env` module and dispatches
//! on the active context id stored in [`HostState`]. Data returned to the
//! plugin travels through guest memory allocated with the plugin's
//! exported `proxy_on_memory_allocate`.

use filtercheck_core::{
    BufferKind, FilterCheckError, HeaderMap, HeaderMapKind, ImmediateResponse, LogLevel, Phase,
    Result, WasmResult,
};
use wasmtime::{Caller, Extern, Linker, Memory};

use crate::context::{BufferAccess, HostState};

const ENV: &str = "env";

const OK: u32 = WasmResult::Ok.as_u32();
const NOT_FOUND: u32 = WasmResult::NotFound.as_u32();
const BAD_ARGUMENT: u32 = WasmResult::BadArgument.as_u32();
const PARSE_FAILURE: u32 = WasmResult::ParseFailure.as_u32();
const INVALID_MEMORY_ACCESS: u32 = WasmResult::InvalidMemoryAccess.as_u32();
const UNIMPLEMENTED: u32 = WasmResult::Unimplemented.as_u32();

fn link_err(err: &wasmtime::Error) -> FilterCheckError {
    FilterCheckError::Load(format!("failed to register host import: {err:#}"))
}

/// Installs the full import table on the linker.
pub(crate) fn register(linker: &mut Linker<HostState>) -> Result<()> {
    linker.func_wrap(ENV, "proxy_log", proxy_log).map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_current_time_nanoseconds", proxy_get_current_time_nanoseconds)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(
            ENV,
            "proxy_get_monotonic_time_nanoseconds",
            proxy_get_monotonic_time_nanoseconds,
        )
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_header_map_size", proxy_get_header_map_size)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_header_map_value", proxy_get_header_map_value)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_add_header_map_value", proxy_add_header_map_value)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_replace_header_map_value", proxy_replace_header_map_value)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_remove_header_map_value", proxy_remove_header_map_value)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_header_map_pairs", proxy_get_header_map_pairs)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_set_header_map_pairs", proxy_set_header_map_pairs)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_buffer_bytes", proxy_get_buffer_bytes)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_set_buffer_bytes", proxy_set_buffer_bytes)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_send_local_response", proxy_send_local_response)
        .map_err(|e| link_err(&e))?;
    linker.func_wrap(ENV, "proxy_get_property", proxy_get_property).map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_set_effective_context", proxy_set_effective_context)
        .map_err(|e| link_err(&e))?;
    linker.func_wrap(ENV, "proxy_done", || OK).map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_set_tick_period_milliseconds", |_period: u32| OK)
        .map_err(|e| link_err(&e))?;
    register_stubs(linker)
}

/// Imports the runner never services. Registered so modules declaring them
/// still instantiate; each reports Unimplemented back to the plugin.
#[allow(clippy::too_many_lines)]
fn register_stubs(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(ENV, "proxy_get_log_level", |_: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_status", |_: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_configuration", |_: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_set_property", |_: u32, _: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_continue_request", || UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_continue_response", || UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_continue_stream", |_: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_close_stream", |_: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_clear_route_cache", || UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_shared_data", |_: u32, _: u32, _: u32, _: u32, _: u32| {
            UNIMPLEMENTED
        })
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_set_shared_data", |_: u32, _: u32, _: u32, _: u32, _: u32| {
            UNIMPLEMENTED
        })
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_register_shared_queue", |_: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_resolve_shared_queue", |_: u32, _: u32, _: u32, _: u32, _: u32| {
            UNIMPLEMENTED
        })
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_dequeue_shared_queue", |_: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_enqueue_shared_queue", |_: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_buffer_status", |_: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(
            ENV,
            "proxy_http_call",
            |_: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32| {
                UNIMPLEMENTED
            },
        )
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(
            ENV,
            "proxy_grpc_call",
            |_: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32,
             _: u32| UNIMPLEMENTED,
        )
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(
            ENV,
            "proxy_grpc_stream",
            |_: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32| UNIMPLEMENTED,
        )
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_grpc_send", |_: u32, _: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker.func_wrap(ENV, "proxy_grpc_cancel", |_: u32| UNIMPLEMENTED).map_err(|e| link_err(&e))?;
    linker.func_wrap(ENV, "proxy_grpc_close", |_: u32| UNIMPLEMENTED).map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_define_metric", |_: u32, _: u32, _: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_increment_metric", |_: u32, _: i64| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_record_metric", |_: u32, _: u64| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(ENV, "proxy_get_metric", |_: u32, _: u32| UNIMPLEMENTED)
        .map_err(|e| link_err(&e))?;
    linker
        .func_wrap(
            ENV,
            "proxy_call_foreign_function",
            |_: u32, _: u32, _: u32, _: u32, _: u32, _: u32| UNIMPLEMENTED,
        )
        .map_err(|e| link_err(&e))?;
    Ok(())
}

// --- guest memory helpers ---

fn memory_of(caller: &mut Caller<'_, HostState>) -> Option<Memory> {
    caller.get_export("memory").and_then(Extern::into_memory)
}

fn read_bytes(caller: &mut Caller<'_, HostState>, ptr: u32, len: u32) -> Option<Vec<u8>> {
    let memory = memory_of(caller)?;
    let data = memory.data(&*caller);
    let start = ptr as usize;
    let end = start.checked_add(len as usize)?;
    data.get(start..end).map(<[u8]>::to_vec)
}

fn read_string(caller: &mut Caller<'_, HostState>, ptr: u32, len: u32) -> Option<String> {
    read_bytes(caller, ptr, len).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Allocates guest memory through the plugin's exported allocator.
fn guest_alloc(caller: &mut Caller<'_, HostState>, size: usize) -> Option<u32> {
    let export =
        caller.get_export("proxy_on_memory_allocate").or_else(|| caller.get_export("malloc"))?;
    let func = export.into_func()?;
    let func = func.typed::<u32, u32>(&*caller).ok()?;
    let size = u32::try_from(size).ok()?;
    func.call(&mut *caller, size).ok()
}

fn write_u32(caller: &mut Caller<'_, HostState>, memory: Memory, ptr: u32, value: u32) -> bool {
    memory.write(&mut *caller, ptr as usize, &value.to_le_bytes()).is_ok()
}

/// Copies `data` into freshly allocated guest memory and stores the
/// resulting pointer and length at the two out-parameters.
fn write_guest_bytes(
    caller: &mut Caller<'_, HostState>,
    data: &[u8],
    out_ptr_ptr: u32,
    out_size_ptr: u32,
) -> u32 {
    let Some(memory) = memory_of(caller) else {
        return INVALID_MEMORY_ACCESS;
    };
    let guest_ptr = if data.is_empty() {
        0
    } else {
        let Some(ptr) = guest_alloc(caller, data.len()) else {
            return INVALID_MEMORY_ACCESS;
        };
        if memory.write(&mut *caller, ptr as usize, data).is_err() {
            return INVALID_MEMORY_ACCESS;
        }
        ptr
    };
    let Ok(len) = u32::try_from(data.len()) else {
        return INVALID_MEMORY_ACCESS;
    };
    if !write_u32(caller, memory, out_ptr_ptr, guest_ptr) {
        return INVALID_MEMORY_ACCESS;
    }
    if !write_u32(caller, memory, out_size_ptr, len) {
        return INVALID_MEMORY_ACCESS;
    }
    OK
}

// --- Proxy-Wasm pairs codec ---
//
// Serialized form: u32 pair count, then u32 key/value lengths for each
// pair, then NUL-terminated key and value bytes for each pair.

pub(crate) fn encode_pairs(pairs: &[(String, String)]) -> Vec<u8> {
    let mut out = Vec::new();
    let count = u32::try_from(pairs.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&count.to_le_bytes());
    for (key, value) in pairs {
        let key_len = u32::try_from(key.len()).unwrap_or(u32::MAX);
        let value_len = u32::try_from(value.len()).unwrap_or(u32::MAX);
        out.extend_from_slice(&key_len.to_le_bytes());
        out.extend_from_slice(&value_len.to_le_bytes());
    }
    for (key, value) in pairs {
        out.extend_from_slice(key.as_bytes());
        out.push(0);
        out.extend_from_slice(value.as_bytes());
        out.push(0);
    }
    out
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, n: usize) -> Option<&'a [u8]> {
    let end = cursor.checked_add(n)?;
    let slice = data.get(*cursor..end)?;
    *cursor = end;
    Some(slice)
}

fn take_u32(data: &[u8], cursor: &mut usize) -> Option<usize> {
    let bytes = take(data, cursor, 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?) as usize)
}

pub(crate) fn decode_pairs(data: &[u8]) -> Option<Vec<(String, String)>> {
    if data.is_empty() {
        return Some(Vec::new());
    }
    let mut cursor = 0usize;
    let count = take_u32(data, &mut cursor)?;
    let mut sizes = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let key_len = take_u32(data, &mut cursor)?;
        let value_len = take_u32(data, &mut cursor)?;
        sizes.push((key_len, value_len));
    }
    let mut pairs = Vec::with_capacity(sizes.len());
    for (key_len, value_len) in sizes {
        let key = String::from_utf8_lossy(take(data, &mut cursor, key_len)?).into_owned();
        take(data, &mut cursor, 1)?;
        let value = String::from_utf8_lossy(take(data, &mut cursor, value_len)?).into_owned();
        take(data, &mut cursor, 1)?;
        pairs.push((key, value));
    }
    Some(pairs)
}

// --- header map callbacks ---

/// Resolves the header map addressed by `kind_raw`, enforcing that it
/// matches the active stream's current phase.
fn with_phase_headers<R>(
    state: &mut HostState,
    kind_raw: u32,
    f: impl FnOnce(&mut HeaderMap) -> R,
) -> std::result::Result<R, u32> {
    let Some(kind) = HeaderMapKind::from_abi(kind_raw) else {
        return Err(BAD_ARGUMENT);
    };
    let Some(stream) = state.active_stream() else {
        return Err(BAD_ARGUMENT);
    };
    if stream.phase.header_map_kind() != Some(kind) {
        return Err(BAD_ARGUMENT);
    }
    Ok(f(stream.headers_mut()))
}

fn proxy_get_header_map_size(
    mut caller: Caller<'_, HostState>,
    kind: u32,
    out_size_ptr: u32,
) -> u32 {
    let size = match with_phase_headers(caller.data_mut(), kind, |headers| headers.len()) {
        Ok(size) => size,
        Err(code) => return code,
    };
    let Some(memory) = memory_of(&mut caller) else {
        return INVALID_MEMORY_ACCESS;
    };
    let Ok(size) = u32::try_from(size) else {
        return INVALID_MEMORY_ACCESS;
    };
    if write_u32(&mut caller, memory, out_size_ptr, size) {
        OK
    } else {
        INVALID_MEMORY_ACCESS
    }
}

fn proxy_get_header_map_value(
    mut caller: Caller<'_, HostState>,
    kind: u32,
    key_ptr: u32,
    key_size: u32,
    out_ptr_ptr: u32,
    out_size_ptr: u32,
) -> u32 {
    let Some(key) = read_string(&mut caller, key_ptr, key_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let value =
        match with_phase_headers(caller.data_mut(), kind, |headers| {
            headers.get(&key).map(str::to_owned)
        }) {
            Ok(value) => value,
            Err(code) => return code,
        };
    let Some(value) = value else {
        return NOT_FOUND;
    };
    write_guest_bytes(&mut caller, value.as_bytes(), out_ptr_ptr, out_size_ptr)
}

fn proxy_add_header_map_value(
    mut caller: Caller<'_, HostState>,
    kind: u32,
    key_ptr: u32,
    key_size: u32,
    value_ptr: u32,
    value_size: u32,
) -> u32 {
    let Some(key) = read_string(&mut caller, key_ptr, key_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let Some(value) = read_string(&mut caller, value_ptr, value_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    match with_phase_headers(caller.data_mut(), kind, |headers| {
        headers.insert_or_append(&key, &value);
    }) {
        Ok(()) => OK,
        Err(code) => code,
    }
}

fn proxy_replace_header_map_value(
    mut caller: Caller<'_, HostState>,
    kind: u32,
    key_ptr: u32,
    key_size: u32,
    value_ptr: u32,
    value_size: u32,
) -> u32 {
    let Some(key) = read_string(&mut caller, key_ptr, key_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let Some(value) = read_string(&mut caller, value_ptr, value_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    match with_phase_headers(caller.data_mut(), kind, |headers| headers.replace(&key, &value)) {
        Ok(()) => OK,
        Err(code) => code,
    }
}

fn proxy_remove_header_map_value(
    mut caller: Caller<'_, HostState>,
    kind: u32,
    key_ptr: u32,
    key_size: u32,
) -> u32 {
    let Some(key) = read_string(&mut caller, key_ptr, key_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    match with_phase_headers(caller.data_mut(), kind, |headers| headers.remove(&key)) {
        Ok(_) => OK,
        Err(code) => code,
    }
}

fn proxy_get_header_map_pairs(
    mut caller: Caller<'_, HostState>,
    kind: u32,
    out_ptr_ptr: u32,
    out_size_ptr: u32,
) -> u32 {
    let pairs = match with_phase_headers(caller.data_mut(), kind, |headers| {
        headers.pairs().map(|(k, v)| (k.to_string(), v.to_string())).collect::<Vec<_>>()
    }) {
        Ok(pairs) => pairs,
        Err(code) => return code,
    };
    let encoded = encode_pairs(&pairs);
    write_guest_bytes(&mut caller, &encoded, out_ptr_ptr, out_size_ptr)
}

fn proxy_set_header_map_pairs(
    mut caller: Caller<'_, HostState>,
    kind: u32,
    pairs_ptr: u32,
    pairs_size: u32,
) -> u32 {
    let Some(raw) = read_bytes(&mut caller, pairs_ptr, pairs_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let Some(pairs) = decode_pairs(&raw) else {
        return PARSE_FAILURE;
    };
    match with_phase_headers(caller.data_mut(), kind, |headers| headers.set_pairs(pairs)) {
        Ok(()) => OK,
        Err(code) => code,
    }
}

// --- buffer callbacks ---

fn proxy_get_buffer_bytes(
    mut caller: Caller<'_, HostState>,
    kind_raw: u32,
    start: u32,
    length: u32,
    out_ptr_ptr: u32,
    out_size_ptr: u32,
) -> u32 {
    let data = {
        let state = caller.data_mut();
        let Some(kind) = BufferKind::from_abi(kind_raw) else {
            return BAD_ARGUMENT;
        };
        let Some(buffer) = state.readable_buffer(kind) else {
            return NOT_FOUND;
        };
        match buffer.view(start as usize, length as usize) {
            Some(slice) => slice.to_vec(),
            None => return INVALID_MEMORY_ACCESS,
        }
    };
    write_guest_bytes(&mut caller, &data, out_ptr_ptr, out_size_ptr)
}

fn proxy_set_buffer_bytes(
    mut caller: Caller<'_, HostState>,
    kind_raw: u32,
    start: u32,
    length: u32,
    data_ptr: u32,
    data_size: u32,
) -> u32 {
    let Some(data) = read_bytes(&mut caller, data_ptr, data_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let state = caller.data_mut();
    let Some(kind) = BufferKind::from_abi(kind_raw) else {
        return BAD_ARGUMENT;
    };
    match state.writable_buffer(kind) {
        BufferAccess::Missing => NOT_FOUND,
        BufferAccess::ReadOnly => BAD_ARGUMENT,
        BufferAccess::Writable(buffer) => {
            buffer.splice(start as usize, length as usize, &data);
            OK
        }
    }
}

// --- remaining callbacks ---

fn proxy_log(mut caller: Caller<'_, HostState>, level: u32, msg_ptr: u32, msg_size: u32) -> u32 {
    let Some(message) = read_string(&mut caller, msg_ptr, msg_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    caller.data_mut().capture_log(LogLevel::from_abi(level), &message);
    OK
}

fn write_nanos(mut caller: Caller<'_, HostState>, out_ptr: u32, nanos: u64) -> u32 {
    let Some(memory) = memory_of(&mut caller) else {
        return INVALID_MEMORY_ACCESS;
    };
    if memory.write(&mut caller, out_ptr as usize, &nanos.to_le_bytes()).is_ok() {
        OK
    } else {
        INVALID_MEMORY_ACCESS
    }
}

fn proxy_get_current_time_nanoseconds(caller: Caller<'_, HostState>, out_ptr: u32) -> u32 {
    let nanos = caller.data().current_time_nanos();
    write_nanos(caller, out_ptr, nanos)
}

fn proxy_get_monotonic_time_nanoseconds(caller: Caller<'_, HostState>, out_ptr: u32) -> u32 {
    let nanos = caller.data().monotonic_time_nanos();
    write_nanos(caller, out_ptr, nanos)
}

#[allow(clippy::too_many_arguments)]
fn proxy_send_local_response(
    mut caller: Caller<'_, HostState>,
    response_code: u32,
    details_ptr: u32,
    details_size: u32,
    body_ptr: u32,
    body_size: u32,
    headers_ptr: u32,
    headers_size: u32,
    grpc_status: i32,
) -> u32 {
    let Some(details) = read_string(&mut caller, details_ptr, details_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let Some(body) = read_bytes(&mut caller, body_ptr, body_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let Some(raw_headers) = read_bytes(&mut caller, headers_ptr, headers_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    let Some(pairs) = decode_pairs(&raw_headers) else {
        return PARSE_FAILURE;
    };

    let state = caller.data_mut();
    let Some(stream) = state.active_stream() else {
        return BAD_ARGUMENT;
    };
    if stream.phase == Phase::None {
        return BAD_ARGUMENT;
    }
    let mut headers = HeaderMap::new();
    for (key, value) in pairs {
        headers.insert_or_append(&key, &value);
    }
    stream.result.immediate = Some(ImmediateResponse {
        http_status: response_code,
        grpc_status: u32::try_from(grpc_status).unwrap_or(0),
        body,
        details,
        headers,
    });
    stream.immediate_seen = true;
    OK
}

fn proxy_get_property(
    mut caller: Caller<'_, HostState>,
    path_ptr: u32,
    path_size: u32,
    out_ptr_ptr: u32,
    out_size_ptr: u32,
) -> u32 {
    let Some(raw) = read_bytes(&mut caller, path_ptr, path_size) else {
        return INVALID_MEMORY_ACCESS;
    };
    // Property paths arrive as NUL-separated segments.
    let path = raw
        .split(|byte| *byte == 0)
        .filter(|segment| !segment.is_empty())
        .map(|segment| String::from_utf8_lossy(segment).into_owned())
        .collect::<Vec<_>>()
        .join(".");
    let Some(value) = caller.data().properties.get(&path).cloned() else {
        return NOT_FOUND;
    };
    write_guest_bytes(&mut caller, &value, out_ptr_ptr, out_size_ptr)
}

fn proxy_set_effective_context(mut caller: Caller<'_, HostState>, context_id: u32) -> u32 {
    let state = caller.data_mut();
    if state.contexts.contains_key(&context_id) {
        state.active = context_id;
        OK
    } else {
        BAD_ARGUMENT
    }
}
