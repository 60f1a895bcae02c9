//! Assembly of registered functions into one pybind11 extension module source.
//!
//! A [`FunctionDecl`] plus its [`CompileOptions`] becomes an immutable
//! [`FunctionSpec`] and a set of [`BuildFlags`]. A [`ModuleSpec`] collects the
//! specs of one module, merges their flags and renders the module source,
//! whose [`ContentHash`](xeno_common::ContentHash) decides whether a built
//! artifact is still current.

#![warn(missing_docs)]

pub mod error;
pub mod function;
pub mod module;
pub mod options;

pub use error::ModuleError;
pub use function::{is_identifier, mangle, BuildFlags, FunctionDecl, FunctionSpec};
pub use module::{ModuleSpec, RenderedSource, CHECKSUM_ATTR, HASH_PLACEHOLDER};
pub use options::{
    parse_macros, platform_specific, CompileOptions, Platform, ReturnValuePolicy,
    DEFAULT_CXX_STD,
};
