//! Compiler toolchains that turn generated source into an extension artifact.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use indexmap::IndexMap;
use tracing::debug;
use xeno_config::ToolchainConfig;

/// Arguments every module build starts with.
const BASE_ARGS: &[&str] = &["-O3", "-Wall", "-shared", "-fPIC", "-fvisibility=hidden"];

/// Everything a toolchain needs to build one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Module name; also the artifact's base name.
    pub module: String,
    /// Generated source file.
    pub source: PathBuf,
    /// Directory the build runs in and writes the artifact to.
    pub work_dir: PathBuf,
    /// File that receives the full toolchain output.
    pub log: PathBuf,
    /// Header search paths.
    pub include_dirs: Vec<String>,
    /// Preprocessor macros by name.
    pub macros: IndexMap<String, Option<String>>,
    /// Extra compiler arguments.
    pub compile_args: Vec<String>,
    /// Extra linker arguments.
    pub link_args: Vec<String>,
    /// C++ standard level.
    pub cxx_std: u32,
}

/// A failed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainFailure {
    /// Compiler diagnostics or a description of why the compiler did not run.
    pub diagnostics: String,
    /// Log file holding the full output.
    pub log: PathBuf,
}

/// Builds an artifact from a [`BuildRequest`].
pub trait Toolchain {
    /// Runs the build and returns the path of the produced artifact.
    fn build(&mut self, request: &BuildRequest) -> Result<PathBuf, ToolchainFailure>;
}

/// Runs a command-line C++ compiler as a single compile-and-link step.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    compiler: String,
    extension_suffix: String,
    include_dirs: Vec<String>,
    compile_args: Vec<String>,
    link_args: Vec<String>,
}

impl CommandToolchain {
    /// A toolchain using `compiler` with no extra settings.
    pub fn new(compiler: &str) -> Self {
        Self {
            compiler: compiler.to_string(),
            extension_suffix: default_extension_suffix().to_string(),
            include_dirs: Vec::new(),
            compile_args: Vec::new(),
            link_args: Vec::new(),
        }
    }

    /// A toolchain from the `[toolchain]` section of the configuration.
    pub fn from_config(config: &ToolchainConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            extension_suffix: config
                .extension_suffix
                .clone()
                .unwrap_or_else(|| default_extension_suffix().to_string()),
            include_dirs: config.include_dirs.clone(),
            compile_args: config.compile_args.clone(),
            link_args: config.link_args.clone(),
        }
    }

    /// The compiler executable.
    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    /// File name of the artifact built for `module`.
    pub fn artifact_name(&self, module: &str) -> String {
        format!("{module}{}", self.extension_suffix)
    }

    /// Compiler arguments for a request, in order.
    ///
    /// Configured include dirs and arguments come before the request's own,
    /// so per-function settings can override them.
    pub fn command_args(&self, request: &BuildRequest) -> Vec<String> {
        let mut args: Vec<String> = BASE_ARGS.iter().map(|a| a.to_string()).collect();
        args.push(format!("-std=c++{}", request.cxx_std));
        for dir in self.include_dirs.iter().chain(&request.include_dirs) {
            args.push(format!("-I{dir}"));
        }
        for (name, value) in &request.macros {
            match value {
                Some(value) => args.push(format!("-D{name}={value}")),
                None => args.push(format!("-D{name}")),
            }
        }
        args.extend(self.compile_args.iter().cloned());
        args.extend(request.compile_args.iter().cloned());
        // the compiler runs inside work_dir
        let source = request
            .source
            .strip_prefix(&request.work_dir)
            .unwrap_or(request.source.as_path());
        args.push(source.display().to_string());
        args.push("-o".to_string());
        args.push(self.artifact_name(&request.module));
        args.extend(self.link_args.iter().cloned());
        args.extend(request.link_args.iter().cloned());
        args
    }
}

fn default_extension_suffix() -> &'static str {
    if cfg!(target_os = "windows") {
        ".pyd"
    } else {
        ".so"
    }
}

fn failure(request: &BuildRequest, diagnostics: String) -> ToolchainFailure {
    ToolchainFailure {
        diagnostics,
        log: request.log.clone(),
    }
}

impl Toolchain for CommandToolchain {
    fn build(&mut self, request: &BuildRequest) -> Result<PathBuf, ToolchainFailure> {
        let args = self.command_args(request);
        debug!(compiler = %self.compiler, args = %args.join(" "), "invoking compiler");

        let mut log = File::create(&request.log).map_err(|e| {
            failure(
                request,
                format!("cannot create build log {}: {e}", request.log.display()),
            )
        })?;
        let output = Command::new(&self.compiler)
            .args(&args)
            .current_dir(&request.work_dir)
            .output()
            .map_err(|e| {
                let diagnostics = if e.kind() == std::io::ErrorKind::NotFound {
                    format!("compiler '{}' not found", self.compiler)
                } else {
                    format!("failed to run compiler '{}': {e}", self.compiler)
                };
                let _ = writeln!(log, "{diagnostics}");
                failure(request, diagnostics)
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let written = writeln!(log, "{} {}", self.compiler, args.join(" "))
            .and_then(|_| log.write_all(stdout.as_bytes()))
            .and_then(|_| log.write_all(stderr.as_bytes()));
        if let Err(e) = written {
            debug!(log = %request.log.display(), error = %e, "could not write build log");
        }

        if !output.status.success() {
            let mut diagnostics = stderr.trim().to_string();
            if diagnostics.is_empty() {
                diagnostics = match output.status.code() {
                    Some(code) => format!("compiler exited with status {code}"),
                    None => "compiler terminated by signal".to_string(),
                };
            }
            return Err(failure(request, diagnostics));
        }
        Ok(request.work_dir.join(self.artifact_name(&request.module)))
    }
}
