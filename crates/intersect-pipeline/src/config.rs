//! `PipelineConfig` — a small knob surface loadable from TOML, mirroring
//! the teacher's load-with-fallback-to-default config effect: a missing
//! file yields `Default::default()`, a malformed one is an error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Fallback approval expiry when a contract's `approval_policy`
    /// leaves it unset.
    #[serde(default = "default_approval_expiry_seconds")]
    pub default_approval_expiry_seconds: u64,

    /// Whether an unrecognized ceiling type passes by default (per
    /// `spec.md` §4.E) rather than denying the authorization outright.
    #[serde(default = "default_true")]
    pub unknown_ceiling_passes: bool,

    /// For finance-class writes, refuse to proceed if the envelope's
    /// bound policy hash differs from the contract's current policy hash
    /// at connector-call time (policy drift).
    #[serde(default)]
    pub enforce_policy_drift_check: bool,
}

fn default_approval_expiry_seconds() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_approval_expiry_seconds: default_approval_expiry_seconds(),
            unknown_ceiling_passes: true,
            enforce_policy_drift_check: false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline config at {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse pipeline config at {path}: {message}")]
    Parse { path: String, message: String },
}

/// Load `PipelineConfig` from a TOML file at `path`. A missing file is
/// not an error — it falls back to `PipelineConfig::default()`. A
/// present-but-malformed file is.
pub fn load_or_default(path: &Path) -> Result<PipelineConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PipelineConfig::default()),
        Err(e) => Err(ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = load_or_default(Path::new("/nonexistent/intersect-pipeline.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn present_file_overrides_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_approval_expiry_seconds = 120").unwrap();
        let config = load_or_default(file.path()).unwrap();
        assert_eq!(config.default_approval_expiry_seconds, 120);
        assert!(config.unknown_ceiling_passes);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_approval_expiry_seconds = \"not a number\"").unwrap();
        let result = load_or_default(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
