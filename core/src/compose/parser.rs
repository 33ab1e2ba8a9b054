//! Compose manifest parsing, validation, and re-serialization.

use std::path::Path;

use tracing::debug;

use super::types::{BundleMeta, ComposeFile};
use super::version::is_valid_semver;
use crate::error::{FreightError, Result};

/// Parser for docker-compose.yml manifests.
pub struct ComposeParser;

impl ComposeParser {
    /// Parse a compose manifest from YAML text.
    pub fn parse(content: &str) -> Result<ComposeFile> {
        serde_yaml::from_str(content).map_err(|e| FreightError::Parse {
            path: "<inline>".into(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a compose manifest from disk.
    pub fn parse_file(path: &Path) -> Result<ComposeFile> {
        debug!("Reading compose file from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| FreightError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| FreightError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Validate bundle metadata before any engine work starts.
    ///
    /// Requires an `x-bundle` block with a non-empty name and a semver
    /// version.
    pub fn validate_bundle(compose: &ComposeFile) -> Result<&BundleMeta> {
        let meta = compose
            .x_bundle
            .as_ref()
            .ok_or_else(|| FreightError::Validation("missing x-bundle entry".to_string()))?;

        if meta.name.is_empty() {
            return Err(FreightError::Validation(
                "missing name in x-bundle".to_string(),
            ));
        }
        if meta.version.is_empty() {
            return Err(FreightError::Validation(
                "missing version in x-bundle".to_string(),
            ));
        }
        if !is_valid_semver(&meta.version) {
            return Err(FreightError::Validation(format!(
                "invalid version '{}' in x-bundle, must be semantic versioning (e.g., 1.2.3)",
                meta.version
            )));
        }

        Ok(meta)
    }

    /// Serialize a manifest back to YAML.
    ///
    /// Field ordering is deterministic but need not match the input
    /// byte-for-byte; the result is semantically equivalent.
    pub fn serialize(compose: &ComposeFile) -> Result<String> {
        serde_yaml::to_string(compose).map_err(|e| FreightError::Parse {
            path: "<serialize>".into(),
            reason: e.to_string(),
        })
    }
}
