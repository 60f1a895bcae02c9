//! Sidecar record describing the last successful build of a module.
//!
//! The record is stored as `build.json` in the module directory, next to the
//! artifact it describes. It is what staleness checks read: the artifact
//! itself is never loaded just to learn which source it came from.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use xeno_common::ContentHash;

use crate::error::BuildError;

/// Name of the record file within a module directory.
pub const RECORD_FILE: &str = "build.json";

/// What was built, from which source, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Hash of the source the artifact was built from.
    pub hash: ContentHash,
    /// Seconds since the Unix epoch at which the build finished.
    pub built_at: u64,
    /// Artifact path, relative to the module directory when inside it.
    pub artifact: PathBuf,
    /// Build log path, relative to the module directory when inside it.
    pub log: PathBuf,
}

impl BuildRecord {
    /// A record for a build finishing now.
    ///
    /// Paths inside `module_dir` are stored relative to it so the directory
    /// can be moved as a whole.
    pub fn new(module_dir: &Path, hash: ContentHash, artifact: &Path, log: &Path) -> Self {
        let relative = |path: &Path| {
            path.strip_prefix(module_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.to_path_buf())
        };
        let built_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            hash,
            built_at,
            artifact: relative(artifact),
            log: relative(log),
        }
    }

    /// Loads the record from a module directory.
    ///
    /// Returns `None` when the file is missing or unreadable; callers treat
    /// that as "never built".
    pub fn load(module_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(module_dir.join(RECORD_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Writes the record into a module directory, creating it if needed.
    pub fn save(&self, module_dir: &Path) -> Result<(), BuildError> {
        std::fs::create_dir_all(module_dir).map_err(|e| BuildError::Io {
            path: module_dir.to_path_buf(),
            source: e,
        })?;
        let path = module_dir.join(RECORD_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| BuildError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| BuildError::Io { path, source: e })
    }

    /// Absolute artifact location for a record read from `module_dir`.
    pub fn artifact_path(&self, module_dir: &Path) -> PathBuf {
        module_dir.join(&self.artifact)
    }

    /// Absolute build log location for a record read from `module_dir`.
    pub fn log_path(&self, module_dir: &Path) -> PathBuf {
        module_dir.join(&self.log)
    }
}
