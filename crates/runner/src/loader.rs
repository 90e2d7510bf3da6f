// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Suite document loading and CLI override merging.

use std::path::{Path, PathBuf};

use filtercheck_core::{FilterCheckError, Result};

use crate::suite::{ConfigLogLevel, Env, TestSuite};
use crate::textproto;

/// Suite document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    Textproto,
    Yaml,
}

/// Infers the format from the file extension.
#[must_use]
pub fn detect_format(path: &Path) -> Option<SuiteFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("textproto") => Some(SuiteFormat::Textproto),
        Some("yaml" | "yml") => Some(SuiteFormat::Yaml),
        _ => None,
    }
}

/// Reads, parses, and validates a suite document. `format` forces the
/// encoding; `None` falls back to extension detection.
///
/// # Errors
///
/// Returns an I/O error when the document cannot be read and a schema
/// error when it does not parse or violates a structural invariant.
pub fn load_suite(path: &Path, format: Option<SuiteFormat>) -> Result<TestSuite> {
    let format = format.or_else(|| detect_format(path)).ok_or_else(|| {
        FilterCheckError::Schema(format!(
            "cannot determine format for {}; use a .textproto, .yaml, or .yml extension",
            path.display()
        ))
    })?;
    let text = std::fs::read_to_string(path).map_err(|err| {
        FilterCheckError::Io(std::io::Error::new(
            err.kind(),
            format!("suite document {}: {err}", path.display()),
        ))
    })?;
    let mut suite = match format {
        SuiteFormat::Yaml => serde_saphyr::from_str(&text).map_err(|err| {
            FilterCheckError::Schema(format!("failed to parse YAML suite: {err}"))
        })?,
        SuiteFormat::Textproto => textproto::parse_suite(&text)?,
    };
    suite.env.test_path = path.display().to_string();
    suite.validate()?;
    Ok(suite)
}

/// CLI-provided values that replace suite-level settings after load.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub wasm_path: Option<String>,
    pub config_path: Option<String>,
    pub log_path: Option<String>,
    pub log_level: Option<ConfigLogLevel>,
    pub num_additional_streams: Option<u64>,
    pub additional_stream_advance_rate: Option<u64>,
}

/// Applies CLI overrides on top of the loaded environment.
pub fn apply_overrides(suite: &mut TestSuite, overrides: &Overrides) {
    if let Some(wasm_path) = &overrides.wasm_path {
        suite.env.wasm_path.clone_from(wasm_path);
    }
    if let Some(config_path) = &overrides.config_path {
        suite.env.config_path.clone_from(config_path);
    }
    if let Some(log_path) = &overrides.log_path {
        suite.env.log_path.clone_from(log_path);
    }
    if let Some(log_level) = overrides.log_level {
        suite.env.log_level = log_level;
    }
    if let Some(streams) = overrides.num_additional_streams {
        suite.env.num_additional_streams = streams;
    }
    if let Some(rate) = overrides.additional_stream_advance_rate {
        suite.env.additional_stream_advance_rate = rate;
    }
}

/// Directory relative input and matcher paths resolve against.
#[must_use]
pub fn base_dir(env: &Env) -> PathBuf {
    Path::new(&env.test_path).parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Resolves a possibly-relative path against the suite document's
/// directory.
#[must_use]
pub fn resolve_path(env: &Env, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir(env).join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(Path::new("a/suite.textproto")), Some(SuiteFormat::Textproto));
        assert_eq!(detect_format(Path::new("suite.yaml")), Some(SuiteFormat::Yaml));
        assert_eq!(detect_format(Path::new("suite.yml")), Some(SuiteFormat::Yaml));
        assert_eq!(detect_format(Path::new("suite.json")), None);
        assert_eq!(detect_format(Path::new("suite")), None);
    }

    #[test]
    fn test_load_yaml_records_test_path() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, "env:\n  wasm_path: p.wasm\ntest:\n  - name: t\n")
            .unwrap_or_else(|e| panic!("write: {e}"));
        let suite =
            load_suite(&path, None).unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(suite.env.wasm_path, "p.wasm");
        assert_eq!(suite.env.test_path, path.display().to_string());
        assert_eq!(resolve_path(&suite.env, "data/in.txt"), dir.path().join("data/in.txt"));
    }

    #[test]
    fn test_load_textproto_by_extension() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("suite.textproto");
        std::fs::write(&path, "env { wasm_path: \"p.wasm\" }\ntest { name: \"t\" }\n")
            .unwrap_or_else(|e| panic!("write: {e}"));
        let suite =
            load_suite(&path, None).unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(suite.tests[0].name, "t");
    }

    #[test]
    fn test_overrides_apply_after_load() {
        let mut suite = TestSuite::default();
        suite.env.wasm_path = "orig.wasm".to_string();
        let overrides = Overrides {
            wasm_path: Some("new.wasm".to_string()),
            log_level: Some(ConfigLogLevel::Critical),
            ..Default::default()
        };
        apply_overrides(&mut suite, &overrides);
        assert_eq!(suite.env.wasm_path, "new.wasm");
        assert_eq!(suite.env.log_level, ConfigLogLevel::Critical);
        assert!(suite.env.config_path.is_empty());
    }

    #[test]
    fn test_missing_document_is_io_error() {
        let err = load_suite(Path::new("/nonexistent/suite.yaml"), None)
            .map(|_| String::new())
            .unwrap_err();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_yaml_parse_error_is_schema_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, "test: [unclosed\n").unwrap_or_else(|e| panic!("write: {e}"));
        let err = load_suite(&path, None).map(|_| String::new()).unwrap_err();
        assert!(err.to_string().contains("Schema error"));
    }
}
