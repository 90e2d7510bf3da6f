// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-phase result accumulators.

use crate::abi::{FilterDataStatus, FilterHeadersStatus};
use crate::headers::HeaderMap;
use crate::phase::Phase;

/// A local response generated by the plugin via `sendLocalResponse`,
/// short-circuiting further processing of the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImmediateResponse {
    /// HTTP status sent to the user via the proxy.
    pub http_status: u32,
    /// gRPC status sent to the proxy.
    pub grpc_status: u32,
    /// Response body text.
    pub body: Vec<u8>,
    /// Detail string sent to the proxy.
    pub details: String,
    /// Additional headers attached to the local response.
    pub headers: HeaderMap,
}

/// Everything observable from a single phase invocation: the mutated
/// message, the plugin's returned filter statuses, any latched immediate
/// response, and the logs emitted while the plugin ran.
#[derive(Debug, Clone, Default)]
pub struct PhaseResult {
    /// Filter status for headers returned by the handler.
    pub header_status: FilterHeadersStatus,
    /// Mutated headers.
    pub headers: HeaderMap,
    /// Filter status for body returned by the handler.
    pub body_status: FilterDataStatus,
    /// Mutated body.
    pub body: Vec<u8>,
    /// Immediate response, when the plugin generated one.
    pub immediate: Option<ImmediateResponse>,
    /// Log lines captured during this phase invocation, in emission order.
    pub logs: Vec<String>,
}

impl PhaseResult {
    /// Whether the filter status relevant to `phase` is in the continue
    /// family.
    #[must_use]
    pub const fn status_is_continue(&self, phase: Phase) -> bool {
        if phase.is_body() {
            self.body_status.is_continue()
        } else {
            self.header_status.is_continue()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_selection_by_phase() {
        let result = PhaseResult {
            header_status: FilterHeadersStatus::StopIteration,
            body_status: FilterDataStatus::Continue,
            ..Default::default()
        };
        assert!(!result.status_is_continue(Phase::RequestHeaders));
        assert!(result.status_is_continue(Phase::RequestBody));
    }
}
