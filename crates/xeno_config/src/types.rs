//! Configuration types deserialized from `xenoform.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// Default directory under which per-module build directories are created.
pub const DEFAULT_MODULE_ROOT_DIR: &str = "./ext";

/// Default capacity of the resolved-function cache.
pub const DEFAULT_FUNCTION_CAPACITY: usize = 128;

/// The top-level configuration parsed from `xenoform.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XenoformConfig {
    /// Where built extension modules are placed.
    #[serde(default)]
    pub extensions: ExtensionsConfig,
    /// Compiler used by the command-line toolchain.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// In-process resolution cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Location of built extension modules.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionsConfig {
    /// Root directory; each module gets a `<module>_ext` subdirectory.
    #[serde(default = "default_module_root_dir")]
    pub module_root_dir: PathBuf,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            module_root_dir: default_module_root_dir(),
        }
    }
}

fn default_module_root_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MODULE_ROOT_DIR)
}

/// Settings for the command-line compiler toolchain.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainConfig {
    /// Compiler executable (e.g. `c++`, `g++-13`, `clang++`).
    #[serde(default = "default_compiler")]
    pub compiler: String,
    /// File suffix of the built extension (e.g. `.cpython-312-x86_64-linux-gnu.so`).
    #[serde(default)]
    pub extension_suffix: Option<String>,
    /// Include directories always passed to the compiler (pybind11, Python, numpy).
    ///
    /// Nothing is discovered automatically. With the default empty list the
    /// compiler only finds these headers on its own search path; the output of
    /// `python3 -m pybind11 --includes` and `numpy.get_include()` belongs here.
    #[serde(default)]
    pub include_dirs: Vec<String>,
    /// Compile arguments added to every module build.
    #[serde(default)]
    pub compile_args: Vec<String>,
    /// Link arguments added to every module build.
    #[serde(default)]
    pub link_args: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            extension_suffix: None,
            include_dirs: Vec::new(),
            compile_args: Vec::new(),
            link_args: Vec::new(),
        }
    }
}

fn default_compiler() -> String {
    "c++".to_string()
}

/// Resolution cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of resolved functions kept before least-recently-used eviction.
    #[serde(default = "default_function_capacity")]
    pub function_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            function_capacity: DEFAULT_FUNCTION_CAPACITY,
        }
    }
}

fn default_function_capacity() -> usize {
    DEFAULT_FUNCTION_CAPACITY
}
