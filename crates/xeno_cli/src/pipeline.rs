//! Shared helpers for CLI commands: configuration lookup and loading the
//! declaration into a rendered module.

use std::path::{Path, PathBuf};

use xeno_config::{load_config, load_config_from_str, load_config_or_default, XenoformConfig};
use xeno_module::{ModuleSpec, RenderedSource};

use crate::declaration::Declaration;
use crate::GlobalArgs;

/// Loads the configuration selected by `--config`, or `xenoform.toml` in the
/// current directory when present.
///
/// A relative `module_root_dir` is resolved against the directory the
/// configuration came from.
pub fn resolve_config(global: &GlobalArgs) -> Result<XenoformConfig, Box<dyn std::error::Error>> {
    let (base, mut config) = match &global.config {
        Some(path) => {
            let path = PathBuf::from(path);
            if path.is_dir() {
                let config = load_config(&path)?;
                (path, config)
            } else {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
                let base = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (base, load_config_from_str(&content)?)
            }
        }
        None => {
            let cwd = std::env::current_dir()?;
            let config = load_config_or_default(&cwd)?;
            (cwd, config)
        }
    };
    if config.extensions.module_root_dir.is_relative() {
        config.extensions.module_root_dir = base.join(&config.extensions.module_root_dir);
    }
    tracing::debug!(root = %config.extensions.module_root_dir.display(), "module root");
    Ok(config)
}

/// A declaration together with its assembled module.
pub struct LoadedModule {
    /// Module name.
    pub name: String,
    /// Accumulated functions and build flags.
    pub spec: ModuleSpec,
    /// The generated source and its hash.
    pub rendered: RenderedSource,
}

/// Reads a declaration file and renders its module source.
pub fn load_module(path: &Path) -> Result<LoadedModule, Box<dyn std::error::Error>> {
    let declaration = Declaration::load(path)?;
    let spec = declaration.module_spec()?;
    let rendered = spec.make_source(&declaration.module);
    Ok(LoadedModule {
        name: declaration.module,
        spec,
        rendered,
    })
}
