//! Shared foundational types used across the xenoform crates.
//!
//! Currently this is the content hash that fingerprints generated module
//! source and ties a built artifact to the source it was compiled from.

#![warn(missing_docs)]

pub mod hash;

pub use hash::{ContentHash, ParseHashError};
