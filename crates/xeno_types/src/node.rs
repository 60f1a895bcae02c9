//! C++ type trees and the translator that builds them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::expr::{Marker, TypeExpr, DTYPE, NDARRAY};
use crate::mapping::{cpp_type_for, header_for, OPTIONAL_CPP, UNION};

/// Value/reference/pointer wrapping applied to a translated type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Qualifier {
    /// Pass by value: `T`.
    Auto,
    /// Reference: `T&`.
    Ref,
    /// Const reference: `const T&`.
    CRef,
    /// Rvalue reference: `T&&`.
    RRef,
    /// Pointer: `T*`.
    Ptr,
    /// Pointer to const: `const T*`.
    CPtr,
    /// Const pointer: `T* const`.
    PtrC,
    /// Const pointer to const: `const T* const`.
    CPtrC,
}

impl Qualifier {
    /// Every qualifier, in declaration order.
    pub const ALL: [Qualifier; 8] = [
        Qualifier::Auto,
        Qualifier::Ref,
        Qualifier::CRef,
        Qualifier::RRef,
        Qualifier::Ptr,
        Qualifier::CPtr,
        Qualifier::PtrC,
        Qualifier::CPtrC,
    ];

    /// The wrap pattern; `{}` stands for the qualified type.
    pub fn template(self) -> &'static str {
        match self {
            Self::Auto => "{}",
            Self::Ref => "{}&",
            Self::CRef => "const {}&",
            Self::RRef => "{}&&",
            Self::Ptr => "{}*",
            Self::CPtr => "const {}*",
            Self::PtrC => "{}* const",
            Self::CPtrC => "const {}* const",
        }
    }

    /// The name used in annotations (`CppQualifier.<name>`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Ref => "Ref",
            Self::CRef => "CRef",
            Self::RRef => "RRef",
            Self::Ptr => "Ptr",
            Self::CPtr => "CPtr",
            Self::PtrC => "PtrC",
            Self::CPtrC => "CPtrC",
        }
    }

    /// Looks up a qualifier by its annotation name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.name() == name)
    }

    /// Applies the qualifier to rendered type text.
    pub fn apply(self, rendered: &str) -> String {
        self.template().replacen("{}", rendered, 1)
    }
}

/// One position in a translated C++ type tree.
///
/// An override replaces the whole rendering and suppresses header
/// attribution for the node and everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    target_type: Option<&'static str>,
    subtypes: Vec<TypeNode>,
    type_override: Option<String>,
    qualifier: Option<Qualifier>,
}

impl TypeNode {
    /// A node whose rendering is fixed C++ text.
    pub fn with_override(cpp_type: &str) -> Self {
        Self {
            target_type: None,
            subtypes: Vec::new(),
            type_override: Some(cpp_type.to_string()),
            qualifier: None,
        }
    }

    /// The mapped C++ type name, if the Python type had one.
    pub fn target_type(&self) -> Option<&str> {
        self.target_type
    }

    /// Generic parameters.
    pub fn subtypes(&self) -> &[TypeNode] {
        &self.subtypes
    }

    /// Caller-supplied C++ text, if any.
    pub fn type_override(&self) -> Option<&str> {
        self.type_override.as_deref()
    }

    /// The qualifier applied when rendering.
    pub fn qualifier(&self) -> Option<Qualifier> {
        self.qualifier
    }

    /// Headers required by the mapped types in this tree, in pre-order.
    ///
    /// May contain duplicates; deduplication happens when headers are grouped.
    pub fn headers(&self) -> Vec<&'static str> {
        let mut collected = Vec::new();
        self.collect_headers(&mut collected);
        collected
    }

    fn collect_headers(&self, collected: &mut Vec<&'static str>) {
        // overridden types must bring their own headers
        if self.type_override.is_some() {
            return;
        }
        if let Some(header) = self.target_type.and_then(header_for) {
            collected.push(header);
        }
        for sub in &self.subtypes {
            sub.collect_headers(collected);
        }
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = &self.type_override {
            return write!(f, "{text}");
        }
        let mut rendered = self.target_type.unwrap_or_default().to_string();
        if !self.subtypes.is_empty() {
            let params: Vec<String> = self.subtypes.iter().map(ToString::to_string).collect();
            rendered = format!("{rendered}<{}>", params.join(", "));
        }
        match self.qualifier {
            Some(q) => write!(f, "{}", q.apply(&rendered)),
            None => write!(f, "{rendered}"),
        }
    }
}

/// Translates a declared type into a C++ type tree.
///
/// A top-level `Annotated` must carry exactly one marker: a qualifier or an
/// override string. Leaves without a mapping fail with
/// [`TypeError::Unmapped`] unless an override makes their mapping irrelevant.
pub fn translate(expr: &TypeExpr) -> Result<TypeNode, TypeError> {
    let (base, marker) = split_annotation(expr)?;
    let type_override = match marker {
        Some(Marker::Override(text)) => Some(text.clone()),
        _ => None,
    };
    let qualifier = match marker {
        Some(Marker::Qualifier(q)) => Some(*q),
        _ => None,
    };
    let mut node = Shape {
        root: expr,
        lenient: type_override.is_some(),
    }
    .build(base)?;
    node.type_override = type_override;
    node.qualifier = qualifier;
    Ok(node)
}

fn split_annotation(expr: &TypeExpr) -> Result<(&TypeExpr, Option<&Marker>), TypeError> {
    let TypeExpr::Annotated { base, markers } = expr else {
        return Ok((expr, None));
    };
    if matches!(base.as_ref(), TypeExpr::Annotated { .. }) {
        return Err(TypeError::NestedAnnotation {
            outer: expr.to_string(),
        });
    }
    match markers.as_slice() {
        [] => Err(TypeError::EmptyAnnotation {
            base: base.to_string(),
        }),
        [Marker::Other(text)] => Err(TypeError::InvalidMarker {
            base: base.to_string(),
            marker: text.clone(),
        }),
        [marker] => Ok((base, Some(marker))),
        many => Err(TypeError::TooManyMarkers {
            base: base.to_string(),
            count: many.len(),
        }),
    }
}

/// Builds nodes from the generic shape of an expression.
struct Shape<'a> {
    root: &'a TypeExpr,
    /// Unmapped types are tolerated below an override.
    lenient: bool,
}

impl Shape<'_> {
    fn mapped(&self, python_type: &str) -> Result<Option<&'static str>, TypeError> {
        match cpp_type_for(python_type) {
            Some(cpp) => Ok(Some(cpp)),
            None if self.lenient => Ok(None),
            None => Err(TypeError::Unmapped {
                python_type: python_type.to_string(),
            }),
        }
    }

    fn build(&self, expr: &TypeExpr) -> Result<TypeNode, TypeError> {
        match expr {
            TypeExpr::Annotated { .. } => Err(TypeError::NestedAnnotation {
                outer: self.root.to_string(),
            }),
            TypeExpr::Ellipsis => Ok(self.leaf(self.mapped("...")?)),
            TypeExpr::Union(alternatives) => self.build_union(alternatives),
            TypeExpr::Named { name, args } if name == NDARRAY => self.build_array(expr, args),
            TypeExpr::Named { name, args } => {
                let target_type = self.mapped(name)?;
                let subtypes = args
                    .iter()
                    .filter(|arg| !arg.is_none())
                    .map(|arg| self.build(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypeNode {
                    target_type,
                    subtypes,
                    type_override: None,
                    qualifier: None,
                })
            }
        }
    }

    fn leaf(&self, target_type: Option<&'static str>) -> TypeNode {
        TypeNode {
            target_type,
            subtypes: Vec::new(),
            type_override: None,
            qualifier: None,
        }
    }

    /// Collapses `ndarray[shape, dtype[T]]` to a single element-type subtype.
    fn build_array(&self, expr: &TypeExpr, args: &[TypeExpr]) -> Result<TypeNode, TypeError> {
        let element = match args {
            [_, TypeExpr::Named { name, args: dtype_args }] if name == DTYPE => {
                match dtype_args.as_slice() {
                    [element] => element,
                    _ => return Err(TypeError::InvalidArrayShape(expr.to_string())),
                }
            }
            [element] => element,
            _ => return Err(TypeError::InvalidArrayShape(expr.to_string())),
        };
        Ok(TypeNode {
            target_type: self.mapped(NDARRAY)?,
            subtypes: vec![self.build(element)?],
            type_override: None,
            qualifier: None,
        })
    }

    /// `A | B` -> variant, `T | None` -> optional, `A | B | None` -> optional of variant.
    fn build_union(&self, alternatives: &[TypeExpr]) -> Result<TypeNode, TypeError> {
        let has_none = alternatives.iter().any(TypeExpr::is_none);
        let mut subtypes = alternatives
            .iter()
            .filter(|alt| !alt.is_none())
            .map(|alt| self.build(alt))
            .collect::<Result<Vec<_>, _>>()?;
        if subtypes.is_empty() {
            return Ok(self.leaf(self.mapped("None")?));
        }
        let variant = self.mapped(UNION)?;
        if !has_none {
            return Ok(TypeNode {
                target_type: variant,
                subtypes,
                type_override: None,
                qualifier: None,
            });
        }
        let inner = if subtypes.len() > 1 {
            TypeNode {
                target_type: variant,
                subtypes,
                type_override: None,
                qualifier: None,
            }
        } else {
            subtypes.remove(0)
        };
        Ok(TypeNode {
            target_type: Some(OPTIONAL_CPP),
            subtypes: vec![inner],
            type_override: None,
            qualifier: None,
        })
    }
}
