//! The `render`, `hash`, `status` and `build` subcommands.

use std::path::Path;

use xeno_cache::{BuildCache, BuildError, CommandToolchain};
use xeno_config::ToolchainConfig;

use crate::pipeline::{load_module, resolve_config};
use crate::GlobalArgs;

/// Prints the module source with its hash embedded.
pub fn render(declaration: &Path) -> Result<i32, Box<dyn std::error::Error>> {
    let module = load_module(declaration)?;
    print!("{}", module.rendered.embedded());
    Ok(0)
}

/// Prints the content hash of the module source.
pub fn hash(declaration: &Path) -> Result<i32, Box<dyn std::error::Error>> {
    let module = load_module(declaration)?;
    println!("{}", module.rendered.hash);
    Ok(0)
}

/// Prints whether the built artifact is absent, current or outdated.
pub fn status(declaration: &Path, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = resolve_config(global)?;
    let module = load_module(declaration)?;
    let cache = BuildCache::new(
        config.extensions.module_root_dir.clone(),
        CommandToolchain::from_config(&config.toolchain),
    );
    let status = cache.status(&module.name, module.rendered.hash);
    println!("{status}");
    Ok(0)
}

/// Builds the module unless its artifact is current.
///
/// Compilation failures are reported with the path of the full log and exit
/// with status 1.
pub fn build(declaration: &Path, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = resolve_config(global)?;
    let module = load_module(declaration)?;
    let mut cache = BuildCache::new(
        config.extensions.module_root_dir.clone(),
        CommandToolchain::from_config(&config.toolchain),
    );
    match cache.ensure_built(&module.name, &module.spec) {
        Ok(outcome) => {
            let verb = if outcome.rebuilt() { "Built" } else { "Fresh" };
            eprintln!("{verb:>12} {} ({})", module.name, outcome.hash);
            println!("{}", outcome.artifact.display());
            Ok(0)
        }
        Err(BuildError::Compilation {
            module,
            diagnostics,
            log,
        }) => {
            eprintln!("error: failed to build module {module}");
            eprintln!("{diagnostics}");
            eprintln!("full log: {}", log.display());
            if let Some(hint) = include_hint(&config.toolchain) {
                eprintln!("hint: {hint}");
            }
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

/// Suggests configuring include dirs when none are set.
fn include_hint(toolchain: &ToolchainConfig) -> Option<&'static str> {
    toolchain.include_dirs.is_empty().then_some(
        "no [toolchain] include_dirs are configured; add the pybind11, Python and numpy \
         include directories (`python3 -m pybind11 --includes`, `numpy.get_include()`)",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_only_without_include_dirs() {
        let mut toolchain = ToolchainConfig::default();
        assert!(include_hint(&toolchain).unwrap().contains("include_dirs"));
        toolchain.include_dirs = vec!["/usr/include/python3.12".to_string()];
        assert_eq!(include_hint(&toolchain), None);
    }
}
