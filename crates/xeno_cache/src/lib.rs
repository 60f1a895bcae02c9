//! Building, caching and resolving compiled extension modules.
//!
//! [`BuildCache`] decides from the sidecar [`BuildRecord`] whether a module's
//! artifact matches its current source and drives a [`Toolchain`] when it does
//! not. [`BuildRegistry`] sits on top: it collects registrations, builds each
//! module at most once per registry, loads it through a [`Runtime`] and keeps
//! resolved functions in a bounded [`LruCache`].

#![warn(missing_docs)]

pub mod error;
pub mod lru;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod toolchain;

pub use error::BuildError;
pub use lru::LruCache;
pub use record::{BuildRecord, RECORD_FILE};
pub use registry::{BuildRegistry, FunctionHandle, TRACE_TARGET};
pub use resolver::{BuildCache, BuildOutcome, BuildStatus, LOG_FILE, SOURCE_FILE};
pub use runtime::Runtime;
pub use toolchain::{BuildRequest, CommandToolchain, Toolchain, ToolchainFailure};
