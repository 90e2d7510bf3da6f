// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Proxy-Wasm ABI enums shared between the host and the runner.
//!
//! Numeric values are fixed by the Proxy-Wasm ABI; they cross the guest
//! boundary as `u32` and must not be reordered.

/// Status codes returned from host callbacks to the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WasmResult {
    Ok = 0,
    NotFound = 1,
    BadArgument = 2,
    SerializationFailure = 3,
    ParseFailure = 4,
    BadExpression = 5,
    InvalidMemoryAccess = 6,
    Empty = 7,
    CasMismatch = 8,
    ResultMismatch = 9,
    InternalFailure = 10,
    BrokenConnection = 11,
    Unimplemented = 12,
}

impl WasmResult {
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Plugin log severities, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Critical = 5,
}

impl LogLevel {
    /// Maps a raw ABI value to a level. Out-of-range values are clamped to
    /// `Critical` so they are always captured.
    #[must_use]
    pub const fn from_abi(raw: u32) -> Self {
        match raw {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            4 => Self::Error,
            _ => Self::Critical,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Filter-flow status returned by the header phase callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum FilterHeadersStatus {
    #[default]
    Continue = 0,
    StopIteration = 1,
    ContinueAndEndStream = 2,
    StopAllIterationAndBuffer = 3,
    StopAllIterationAndWatermark = 4,
}

impl FilterHeadersStatus {
    #[must_use]
    pub const fn from_abi(raw: u32) -> Self {
        match raw {
            1 => Self::StopIteration,
            2 => Self::ContinueAndEndStream,
            3 => Self::StopAllIterationAndBuffer,
            4 => Self::StopAllIterationAndWatermark,
            _ => Self::Continue,
        }
    }

    /// Whether the proxy would keep processing the stream.
    #[must_use]
    pub const fn is_continue(self) -> bool {
        matches!(self, Self::Continue | Self::ContinueAndEndStream)
    }
}

/// Filter-flow status returned by the body phase callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum FilterDataStatus {
    #[default]
    Continue = 0,
    StopIterationAndBuffer = 1,
    StopIterationAndWatermark = 2,
    StopIterationNoBuffer = 3,
}

impl FilterDataStatus {
    #[must_use]
    pub const fn from_abi(raw: u32) -> Self {
        match raw {
            1 => Self::StopIterationAndBuffer,
            2 => Self::StopIterationAndWatermark,
            3 => Self::StopIterationNoBuffer,
            _ => Self::Continue,
        }
    }

    #[must_use]
    pub const fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Header map selectors understood by the header callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum HeaderMapKind {
    RequestHeaders = 0,
    RequestTrailers = 1,
    ResponseHeaders = 2,
    ResponseTrailers = 3,
    GrpcReceiveInitialMetadata = 4,
    GrpcReceiveTrailingMetadata = 5,
    HttpCallResponseHeaders = 6,
}

impl HeaderMapKind {
    #[must_use]
    pub const fn from_abi(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::RequestHeaders),
            1 => Some(Self::RequestTrailers),
            2 => Some(Self::ResponseHeaders),
            3 => Some(Self::ResponseTrailers),
            4 => Some(Self::GrpcReceiveInitialMetadata),
            5 => Some(Self::GrpcReceiveTrailingMetadata),
            6 => Some(Self::HttpCallResponseHeaders),
            _ => None,
        }
    }
}

/// Buffer selectors understood by the buffer callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BufferKind {
    HttpRequestBody = 0,
    HttpResponseBody = 1,
    DownstreamData = 2,
    UpstreamData = 3,
    HttpCallResponseBody = 4,
    GrpcReceiveBuffer = 5,
    VmConfiguration = 6,
    PluginConfiguration = 7,
    CallData = 8,
}

impl BufferKind {
    #[must_use]
    pub const fn from_abi(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::HttpRequestBody),
            1 => Some(Self::HttpResponseBody),
            2 => Some(Self::DownstreamData),
            3 => Some(Self::UpstreamData),
            4 => Some(Self::HttpCallResponseBody),
            5 => Some(Self::GrpcReceiveBuffer),
            6 => Some(Self::VmConfiguration),
            7 => Some(Self::PluginConfiguration),
            8 => Some(Self::CallData),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Critical);
        assert_eq!(LogLevel::from_abi(99), LogLevel::Critical);
    }

    #[test]
    fn test_header_status_continue_family() {
        assert!(FilterHeadersStatus::Continue.is_continue());
        assert!(FilterHeadersStatus::ContinueAndEndStream.is_continue());
        assert!(!FilterHeadersStatus::StopIteration.is_continue());
        assert!(!FilterHeadersStatus::StopAllIterationAndWatermark.is_continue());
    }

    #[test]
    fn test_kind_round_trips() {
        assert_eq!(HeaderMapKind::from_abi(0), Some(HeaderMapKind::RequestHeaders));
        assert_eq!(HeaderMapKind::from_abi(2), Some(HeaderMapKind::ResponseHeaders));
        assert_eq!(HeaderMapKind::from_abi(7), None);
        assert_eq!(BufferKind::from_abi(7), Some(BufferKind::PluginConfiguration));
        assert_eq!(BufferKind::from_abi(9), None);
    }
}
