//! Errors raised while reading `xenoform.toml`.

use std::path::PathBuf;

/// Why a configuration could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    IoError {
        /// Configuration file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The content is not valid TOML or does not match the expected tables.
    #[error("malformed configuration: {0}")]
    ParseError(String),

    /// A setting has a value the build cannot work with.
    #[error("invalid setting `{field}`: {reason}")]
    ValidationError {
        /// Dotted key, e.g. `cache.function_capacity`.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}
