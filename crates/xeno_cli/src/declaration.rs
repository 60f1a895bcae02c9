//! Declaration files: a module and the functions compiled into it.
//!
//! ```toml
//! module = "geometry"
//!
//! [[function]]
//! name = "norm"
//! signature = "(x: float, y: float) -> float"
//! body = "return std::sqrt(x * x + y * y);"
//!
//! [function.options]
//! extra_includes = "<cmath>"
//!
//! [function.platform_compile_args]
//! Linux = ["-O3"]
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use xeno_module::{
    is_identifier, platform_specific, CompileOptions, FunctionDecl, ModuleError, ModuleSpec,
    Platform,
};
use xeno_types::Signature;

/// A parsed declaration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Declaration {
    /// Module the functions are compiled into.
    pub module: String,
    /// Functions, in declaration order.
    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionEntry>,
}

/// One `[[function]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionEntry {
    /// Declared name.
    pub name: String,
    /// Enclosing scopes, outermost first.
    #[serde(default)]
    pub scope: Vec<String>,
    /// Signature text, e.g. `"(n: int, *, fast: bool = True) -> int"`.
    pub signature: String,
    /// C++ statements of the function body, without enclosing braces.
    pub body: String,
    /// Documentation.
    pub doc: Option<String>,
    /// Compile options for this function.
    #[serde(default)]
    pub options: CompileOptions,
    /// Extra compile arguments keyed by platform name (`Linux`, `Darwin`, `Windows`).
    #[serde(default)]
    pub platform_compile_args: IndexMap<String, Vec<String>>,
    /// Extra link arguments keyed by platform name.
    #[serde(default)]
    pub platform_link_args: IndexMap<String, Vec<String>>,
}

impl FunctionEntry {
    /// Parses the signature and folds the current platform's arguments into
    /// the options.
    pub fn to_registration(
        &self,
    ) -> Result<(FunctionDecl, CompileOptions), Box<dyn std::error::Error>> {
        let signature = Signature::parse(&self.signature)?;
        let mut decl = FunctionDecl::new(&self.name, signature, &self.body).in_scope(&self.scope);
        if let Some(doc) = &self.doc {
            decl = decl.with_doc(doc);
        }

        let mut options = self.options.clone();
        if let Some(args) = platform_specific(&by_platform(&self.platform_compile_args)?) {
            options.extra_compile_args.extend_from_slice(args);
        }
        if let Some(args) = platform_specific(&by_platform(&self.platform_link_args)?) {
            options.extra_link_args.extend_from_slice(args);
        }
        Ok((decl, options))
    }
}

fn by_platform(
    settings: &IndexMap<String, Vec<String>>,
) -> Result<IndexMap<Platform, Vec<String>>, String> {
    settings
        .iter()
        .map(|(name, args)| name.parse::<Platform>().map(|platform| (platform, args.clone())))
        .collect()
}

impl Declaration {
    /// Parses a declaration from TOML text.
    pub fn parse(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let declaration: Declaration = toml::from_str(content)?;
        if !is_identifier(&declaration.module) {
            return Err(ModuleError::InvalidName(declaration.module).into());
        }
        if declaration.functions.is_empty() {
            return Err(format!("module '{}' declares no functions", declaration.module).into());
        }
        Ok(declaration)
    }

    /// Reads and parses a declaration file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        Self::parse(&content)
    }

    /// Translates every function and collects them into a module spec.
    pub fn module_spec(&self) -> Result<ModuleSpec, Box<dyn std::error::Error>> {
        let mut spec = ModuleSpec::new();
        for entry in &self.functions {
            let (decl, options) = entry.to_registration()?;
            let (function, flags) = decl.into_spec(&options)?;
            tracing::debug!(module = %self.module, function = %function.qualified_name(), "added function");
            spec.add_function(function, flags)?;
        }
        Ok(spec)
    }
}
