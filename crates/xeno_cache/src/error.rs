//! Error types for building and resolving modules.

use std::path::PathBuf;

use xeno_module::ModuleError;

/// Errors raised while building, loading or resolving a module.
///
/// None of these are retried automatically. A failed build is not remembered,
/// so resolving again after fixing the cause attempts the build again.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The toolchain rejected the generated source.
    #[error("compilation of module '{module}' failed (see {log}):\n{diagnostics}")]
    Compilation {
        /// Module being built.
        module: String,
        /// Compiler output or failure description.
        diagnostics: String,
        /// Build log with the full toolchain output.
        log: PathBuf,
    },

    /// The module was rebuilt but an older copy is already loaded in this
    /// process, so the fresh artifact cannot take effect until restart.
    #[error(
        "module '{module}' was rebuilt but a stale copy is already loaded; restart the process to use it"
    )]
    StaleModule {
        /// Module that is stale.
        module: String,
    },

    /// The runtime could not load a built artifact.
    #[error("failed to load module '{module}': {reason}")]
    Load {
        /// Module being loaded.
        module: String,
        /// Runtime-provided reason.
        reason: String,
    },

    /// A loaded module does not expose a registered function.
    #[error("module '{module}' has no function '{function}'")]
    MissingFunction {
        /// Module searched.
        module: String,
        /// Mangled function name.
        function: String,
    },

    /// No function has been registered for the module.
    #[error("no functions registered for module '{0}'")]
    UnknownModule(String),

    /// Registration was rejected.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Reading or writing build files failed.
    #[error("build I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The build record could not be serialized.
    #[error("failed to serialize build record: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },
}
