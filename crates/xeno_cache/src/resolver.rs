//! Staleness checks and rebuilds for module artifacts on disk.
//!
//! Each module owns `<root>/<module>_ext/`, holding the generated
//! `module.cpp`, the toolchain's `build.log`, the artifact and the
//! [`BuildRecord`] sidecar. The sidecar's hash against a fresh render of the
//! module decides whether the artifact can be reused.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use xeno_common::ContentHash;
use xeno_module::{ModuleSpec, RenderedSource};

use crate::error::BuildError;
use crate::record::BuildRecord;
use crate::toolchain::{BuildRequest, Toolchain};

/// Name of the generated source file within a module directory.
pub const SOURCE_FILE: &str = "module.cpp";

/// Name of the build log within a module directory.
pub const LOG_FILE: &str = "build.log";

/// Suffix appended to a module name to form its directory name.
const MODULE_DIR_SUFFIX: &str = "_ext";

/// How an on-disk artifact relates to the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// No usable artifact or record exists.
    Absent,
    /// The artifact was built from exactly the current source.
    Current,
    /// The artifact was built from different source.
    Outdated,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Absent => "absent",
            Self::Current => "current",
            Self::Outdated => "outdated",
        };
        f.write_str(text)
    }
}

/// Result of [`BuildCache::ensure_built`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Artifact matching `hash`.
    pub artifact: PathBuf,
    /// Hash of the module source.
    pub hash: ContentHash,
    /// Status found before any rebuild.
    pub status: BuildStatus,
}

impl BuildOutcome {
    /// Whether the toolchain ran.
    pub fn rebuilt(&self) -> bool {
        self.status != BuildStatus::Current
    }
}

/// Decides whether module artifacts are current and rebuilds them when not.
#[derive(Debug)]
pub struct BuildCache<T> {
    root: PathBuf,
    toolchain: T,
}

impl<T: Toolchain> BuildCache<T> {
    /// A cache placing module directories under `root`.
    pub fn new(root: impl Into<PathBuf>, toolchain: T) -> Self {
        Self {
            root: root.into(),
            toolchain,
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The toolchain used for rebuilds.
    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Directory holding everything built for `module`.
    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.root.join(format!("{module}{MODULE_DIR_SUFFIX}"))
    }

    /// Compares the artifact on disk with a source hash.
    pub fn status(&self, module: &str, hash: ContentHash) -> BuildStatus {
        self.inspect(module, hash).0
    }

    fn inspect(&self, module: &str, hash: ContentHash) -> (BuildStatus, Option<BuildRecord>) {
        let dir = self.module_dir(module);
        let Some(record) = BuildRecord::load(&dir) else {
            return (BuildStatus::Absent, None);
        };
        if !record.artifact_path(&dir).is_file() {
            return (BuildStatus::Absent, None);
        }
        if record.hash == hash {
            (BuildStatus::Current, Some(record))
        } else {
            (BuildStatus::Outdated, Some(record))
        }
    }

    /// Replaces the recorded hash with the one the artifact itself reports.
    ///
    /// Called when a loaded artifact does not match its record, so that the
    /// next [`status`](Self::status) finds it outdated instead of current.
    pub fn correct_record(&self, module: &str, reported: ContentHash) -> Result<(), BuildError> {
        let dir = self.module_dir(module);
        let Some(mut record) = BuildRecord::load(&dir) else {
            return Ok(());
        };
        record.hash = reported;
        record.save(&dir)
    }

    /// Makes sure an artifact built from the module's current source exists.
    ///
    /// When the recorded hash matches, nothing is written or run. Otherwise
    /// the source is written with its hash embedded, the toolchain runs in the
    /// module directory and, on success, the sidecar is replaced.
    pub fn ensure_built(&mut self, module: &str, spec: &ModuleSpec) -> Result<BuildOutcome, BuildError> {
        let rendered = spec.make_source(module);
        let dir = self.module_dir(module);
        let (status, record) = self.inspect(module, rendered.hash);
        match (status, record) {
            (BuildStatus::Current, Some(record)) => {
                debug!(module, hash = %rendered.hash, "artifact is current");
                return Ok(BuildOutcome {
                    artifact: record.artifact_path(&dir),
                    hash: rendered.hash,
                    status,
                });
            }
            (BuildStatus::Outdated, Some(record)) => {
                info!(module, recorded = %record.hash, current = %rendered.hash, "artifact is outdated");
            }
            _ => info!(module, dir = %dir.display(), "no artifact found"),
        }

        let artifact = self.rebuild(module, spec, &rendered, &dir)?;
        BuildRecord::new(&dir, rendered.hash, &artifact, &dir.join(LOG_FILE)).save(&dir)?;
        Ok(BuildOutcome {
            artifact,
            hash: rendered.hash,
            status,
        })
    }

    fn rebuild(
        &mut self,
        module: &str,
        spec: &ModuleSpec,
        rendered: &RenderedSource,
        dir: &Path,
    ) -> Result<PathBuf, BuildError> {
        std::fs::create_dir_all(dir).map_err(|e| BuildError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let source = dir.join(SOURCE_FILE);
        std::fs::write(&source, rendered.embedded()).map_err(|e| BuildError::Io {
            path: source.clone(),
            source: e,
        })?;
        debug!(module, path = %source.display(), "wrote module source");

        let request = BuildRequest {
            module: module.to_string(),
            source,
            work_dir: dir.to_path_buf(),
            log: dir.join(LOG_FILE),
            include_dirs: spec.include_paths(),
            macros: spec.define_macros(),
            compile_args: spec.compile_args(),
            link_args: spec.link_args(),
            cxx_std: spec.cxx_std(),
        };
        info!(module, "building module");
        let artifact = self
            .toolchain
            .build(&request)
            .map_err(|failure| BuildError::Compilation {
                module: module.to_string(),
                diagnostics: failure.diagnostics,
                log: failure.log,
            })?;
        info!(module, artifact = %artifact.display(), "built module");
        Ok(artifact)
    }
}
