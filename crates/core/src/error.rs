// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for FilterCheck.
//!
//! The variants follow the runner's error taxonomy: load errors and schema
//! errors abort with a non-zero exit, VM failures and bad inputs are
//! confined to the test that triggered them.

use thiserror::Error;

/// Main error type for FilterCheck operations.
#[derive(Debug, Error)]
pub enum FilterCheckError {
    /// Wasm bytes were invalid or the module's imports could not be
    /// satisfied. Aborts the affected test only.
    #[error("Load error: {0}")]
    Load(String),

    /// The Wasm VM trapped or otherwise entered a failed state. No further
    /// invocations reach the plugin once this is raised.
    #[error("Wasm VM failed: {0}")]
    VmFailed(String),

    /// The suite document is malformed (bad YAML/textproto, invalid
    /// matcher shape, bad regex). Aborts the whole run.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A test input could not be turned into plugin-visible data, e.g. an
    /// HTTP/1 block that does not parse. Treated as a test-setup failure.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error (suite documents, wasm bytes, matcher files, log files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using `FilterCheckError`.
pub type Result<T> = std::result::Result<T, FilterCheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FilterCheckError::Load("bad magic".to_string());
        assert_eq!(err.to_string(), "Load error: bad magic");

        let err = FilterCheckError::Schema("test[0]: empty name".to_string());
        assert_eq!(err.to_string(), "Schema error: test[0]: empty name");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wasm");
        let err: FilterCheckError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("missing.wasm"));
    }
}
