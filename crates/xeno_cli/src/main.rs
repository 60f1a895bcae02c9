//! xenoform CLI: inspect and build extension modules from declaration files.
//!
//! `xenoform render` prints the generated source, `xenoform hash` its content
//! hash, `xenoform status` compares it with the artifact on disk and
//! `xenoform build` runs the compiler when the artifact is not current.

#![warn(missing_docs)]

mod commands;
mod declaration;
mod pipeline;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Compile C++ snippets into Python extension modules.
#[derive(Parser, Debug)]
#[command(name = "xenoform", version, about = "xenoform extension module builder")]
pub struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `xenoform.toml` file or the directory containing one.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the generated module source.
    Render {
        /// Declaration file.
        declaration: PathBuf,
    },
    /// Print the content hash of the generated source.
    Hash {
        /// Declaration file.
        declaration: PathBuf,
    },
    /// Report whether the built module is absent, current or outdated.
    Status {
        /// Declaration file.
        declaration: PathBuf,
    },
    /// Build the module if it is not current.
    Build {
        /// Declaration file.
        declaration: PathBuf,
    },
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global = GlobalArgs { config: cli.config };

    let result = match cli.command {
        Command::Render { ref declaration } => commands::render(declaration),
        Command::Hash { ref declaration } => commands::hash(declaration),
        Command::Status { ref declaration } => commands::status(declaration, &global),
        Command::Build { ref declaration } => commands::build(declaration, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_render() {
        let cli = Cli::parse_from(["xenoform", "render", "geometry.toml"]);
        match cli.command {
            Command::Render { declaration } => {
                assert_eq!(declaration, PathBuf::from("geometry.toml"));
            }
            _ => panic!("expected Render command"),
        }
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_hash() {
        let cli = Cli::parse_from(["xenoform", "hash", "m.toml"]);
        assert!(matches!(cli.command, Command::Hash { .. }));
    }

    #[test]
    fn parse_status_with_config() {
        let cli = Cli::parse_from(["xenoform", "--config", "/etc/xenoform.toml", "status", "m.toml"]);
        assert_eq!(cli.config.as_deref(), Some("/etc/xenoform.toml"));
        assert!(matches!(cli.command, Command::Status { .. }));
    }

    #[test]
    fn parse_build_verbose_after_subcommand() {
        let cli = Cli::parse_from(["xenoform", "build", "m.toml", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Build { declaration } => assert_eq!(declaration, PathBuf::from("m.toml")),
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn declaration_is_required() {
        assert!(Cli::try_parse_from(["xenoform", "build"]).is_err());
    }

    #[test]
    fn unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["xenoform", "link", "m.toml"]).is_err());
    }
}
