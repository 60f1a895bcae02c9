//! Registration and lazy resolution of compiled functions.
//!
//! Registering only records a function in its module spec and hands back a
//! [`FunctionHandle`]. Nothing is rendered, built or loaded until the first
//! [`BuildRegistry::resolve`] for a module. From then on the loaded module is
//! kept for the lifetime of the registry, and resolved functions are kept in a
//! bounded LRU cache in front of it.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, info, warn};
use xeno_config::XenoformConfig;
use xeno_module::{is_identifier, CompileOptions, FunctionDecl, ModuleError, ModuleSpec};

use crate::error::BuildError;
use crate::lru::LruCache;
use crate::resolver::BuildCache;
use crate::runtime::Runtime;
use crate::toolchain::Toolchain;

/// Tracing target for events of registrations marked verbose.
pub const TRACE_TARGET: &str = "xenoform::trace";

/// Identifies a registered function for later resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionHandle {
    module: String,
    qualified_name: String,
    name: String,
    doc: Option<String>,
    verbose: bool,
}

impl FunctionHandle {
    /// Module the function belongs to.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Name the function is exposed under in the module.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documentation, after `help` replacement.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

fn announce(verbose: bool, message: &str) {
    if verbose {
        info!(target: TRACE_TARGET, "{message}");
    } else {
        debug!("{message}");
    }
}

/// Owns module specs, builds and the in-process resolution caches.
pub struct BuildRegistry<T, R: Runtime> {
    cache: BuildCache<T>,
    runtime: R,
    modules: IndexMap<String, ModuleSpec>,
    loaded: HashMap<String, R::Module>,
    stale: HashSet<String>,
    functions: LruCache<(String, String), R::Function>,
}

impl<T: Toolchain, R: Runtime> BuildRegistry<T, R> {
    /// A registry building through `cache` and loading through `runtime`,
    /// keeping at most `function_capacity` resolved functions.
    pub fn new(cache: BuildCache<T>, runtime: R, function_capacity: usize) -> Self {
        Self {
            cache,
            runtime,
            modules: IndexMap::new(),
            loaded: HashMap::new(),
            stale: HashSet::new(),
            functions: LruCache::new(function_capacity),
        }
    }

    /// A registry using the module root and cache capacity from `config`.
    pub fn from_config(config: &XenoformConfig, toolchain: T, runtime: R) -> Self {
        let cache = BuildCache::new(config.extensions.module_root_dir.clone(), toolchain);
        Self::new(cache, runtime, config.cache.function_capacity)
    }

    /// Registers a function with `module` without building anything.
    ///
    /// Translation errors and C++ standard conflicts are reported here. A
    /// registration for a module that is already loaded is accepted but only
    /// takes effect in a later process.
    pub fn register(
        &mut self,
        module: &str,
        decl: FunctionDecl,
        options: &CompileOptions,
    ) -> Result<FunctionHandle, BuildError> {
        if !is_identifier(module) {
            return Err(ModuleError::InvalidName(module.to_string()).into());
        }
        let (spec, flags) = decl.into_spec(options)?;
        let handle = FunctionHandle {
            module: module.to_string(),
            qualified_name: spec.qualified_name(),
            name: spec.name.clone(),
            doc: spec.doc.clone(),
            verbose: spec.verbose,
        };

        self.modules
            .entry(module.to_string())
            .or_default()
            .add_function(spec, flags)?;

        announce(
            handle.verbose,
            &format!(
                "registered {module}.{} (in {})",
                handle.name,
                self.cache.module_dir(module).display()
            ),
        );
        if self.loaded.contains_key(module) {
            warn!(
                module,
                function = %handle.qualified_name,
                "module is already loaded; this registration takes effect after a restart"
            );
        }
        Ok(handle)
    }

    /// Returns the compiled function behind `handle`, building and loading
    /// its module first if this registry has not done so yet.
    pub fn resolve(&mut self, handle: &FunctionHandle) -> Result<R::Function, BuildError> {
        let key = (handle.module.clone(), handle.qualified_name.clone());
        if let Some(function) = self.functions.get(&key) {
            return Ok(function.clone());
        }

        self.ensure_loaded(&handle.module, handle.verbose)?;
        let module = self
            .loaded
            .get(&handle.module)
            .ok_or_else(|| BuildError::UnknownModule(handle.module.clone()))?;
        let function = self
            .runtime
            .function(module, &handle.qualified_name)
            .ok_or_else(|| BuildError::MissingFunction {
                module: handle.module.clone(),
                function: handle.qualified_name.clone(),
            })?;

        announce(
            handle.verbose,
            &format!(
                "redirected {}.{} to compiled function {}",
                handle.module, handle.name, handle.qualified_name
            ),
        );
        if let Some(((evicted_module, evicted), _)) = self.functions.insert(key, function.clone()) {
            debug!(module = %evicted_module, function = %evicted, "evicted resolved function");
        }
        Ok(function)
    }

    /// Builds (when needed) and loads `module` once per registry.
    ///
    /// A module found stale stays stale for the lifetime of the registry.
    fn ensure_loaded(&mut self, module: &str, verbose: bool) -> Result<(), BuildError> {
        if self.loaded.contains_key(module) {
            return Ok(());
        }
        if self.stale.contains(module) {
            return Err(BuildError::StaleModule {
                module: module.to_string(),
            });
        }
        let spec = self
            .modules
            .get(module)
            .ok_or_else(|| BuildError::UnknownModule(module.to_string()))?;

        let outcome = self.cache.ensure_built(module, spec)?;
        announce(
            verbose,
            &format!("module {module} is {} ({})", outcome.status, outcome.hash),
        );
        if outcome.rebuilt() && self.runtime.is_loaded(module) {
            return Err(self.mark_stale(module));
        }

        let loaded = self
            .runtime
            .load(module, &outcome.artifact)
            .map_err(|e| BuildError::Load {
                module: module.to_string(),
                reason: e.to_string(),
            })?;
        match self.runtime.embedded_hash(&loaded) {
            Some(hash) if hash == outcome.hash => {}
            Some(hash) => {
                warn!(module, loaded = %hash, expected = %outcome.hash, "loaded module reports another hash");
                // the next process must see the artifact as outdated
                self.cache.correct_record(module, hash)?;
                return Err(self.mark_stale(module));
            }
            None => {
                return Err(BuildError::Load {
                    module: module.to_string(),
                    reason: "module does not report a checksum".to_string(),
                })
            }
        }
        announce(verbose, &format!("imported compiled module {module}"));
        self.loaded.insert(module.to_string(), loaded);
        Ok(())
    }

    fn mark_stale(&mut self, module: &str) -> BuildError {
        self.stale.insert(module.to_string());
        BuildError::StaleModule {
            module: module.to_string(),
        }
    }

    /// Whether `module` needs a restart before it can be resolved.
    pub fn is_stale(&self, module: &str) -> bool {
        self.stale.contains(module)
    }

    /// Functions and flags registered so far for `module`.
    pub fn module_spec(&self, module: &str) -> Option<&ModuleSpec> {
        self.modules.get(module)
    }

    /// Names of modules with registrations, in first-registration order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Whether this registry has loaded `module`.
    pub fn is_loaded(&self, module: &str) -> bool {
        self.loaded.contains_key(module)
    }

    /// Number of functions in the resolution cache.
    pub fn cached_functions(&self) -> usize {
        self.functions.len()
    }

    /// The build cache.
    pub fn cache(&self) -> &BuildCache<T> {
        &self.cache
    }

    /// The runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }
}
