//! Translation of Python-style type annotations and signatures into C++.
//!
//! A declaration is written the way a Python function would annotate itself
//! (`dict[str, list[bool]]`, `Annotated[int, CppQualifier.CRef]`,
//! `(n: int, /, x: float = 2.7, *, b: bool = False) -> str`). This crate parses
//! such text into [`TypeExpr`] and [`Signature`] values, maps them onto
//! [`TypeNode`] trees of C++ types, and reports which headers the mapped types
//! need. [`group_headers`] orders a header set so generated source is stable.

#![warn(missing_docs)]

pub mod error;
pub mod expr;
pub mod headers;
pub mod mapping;
pub mod node;
pub mod signature;

pub use error::TypeError;
pub use expr::{Marker, TypeExpr};
pub use headers::{group_headers, HeaderGroups, TOOLKIT_HEADER};
pub use node::{translate, Qualifier, TypeNode};
pub use signature::{
    translate_default, translate_signature, ArgAnnotation, ParamDecl, ParamKind, ParamRole,
    ParameterSpec, SigItem, Signature, SignatureTranslation, ARGS_TYPE, KWARGS_TYPE,
};
