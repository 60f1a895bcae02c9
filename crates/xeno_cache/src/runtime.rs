//! The interop runtime that loads built artifacts into the running process.

use std::fmt::Display;
use std::path::Path;

use xeno_common::ContentHash;

/// Loads artifacts and looks up their exposed functions.
///
/// Implementations wrap whatever embeds the host interpreter. Calling a
/// returned function, and any error that raises, is entirely theirs.
pub trait Runtime {
    /// A loaded module.
    type Module;
    /// A callable exposed by a loaded module.
    type Function: Clone;
    /// Why loading failed.
    type Error: Display;

    /// Whether a module with this name is already resident in the process.
    fn is_loaded(&self, module: &str) -> bool;

    /// Loads the artifact at `artifact` as module `module`.
    fn load(&mut self, module: &str, artifact: &Path) -> Result<Self::Module, Self::Error>;

    /// The content hash the module reports through its checksum attribute.
    fn embedded_hash(&self, module: &Self::Module) -> Option<ContentHash>;

    /// Looks up an exposed function by its mangled name.
    fn function(&self, module: &Self::Module, name: &str) -> Option<Self::Function>;
}
