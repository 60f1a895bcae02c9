//! Parsing and validation of `xenoform.toml` configuration files.
//!
//! The configuration decides where built extension modules live, which
//! compiler builds them, and how large the in-process function cache is.
//! A missing file is not an error: every setting has a default.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, load_config_or_default, CONFIG_FILE};
pub use types::*;
