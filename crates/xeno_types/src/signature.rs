//! Function signatures and their translation to C++ lambda parameters and
//! pybind11 argument annotations.
//!
//! A [`Signature`] mirrors a Python parameter list, including the `/` and `*`
//! boundary tokens and `*args`/`**kwargs`. Translation produces the parameter
//! definitions of the wrapper lambda, the `py::arg(...)` annotation list
//! (with `py::pos_only()`/`py::kw_only()` at the boundary positions), the
//! return type and the headers all of it needs.

use std::collections::HashSet;
use std::fmt;

use crate::error::TypeError;
use crate::expr::TypeExpr;
use crate::node::{translate, TypeNode};

/// C++ type that collects extra positional arguments.
pub const ARGS_TYPE: &str = "py::args";
/// C++ type that collects extra keyword arguments.
pub const KWARGS_TYPE: &str = "py::kwargs";

/// How a declared parameter collects its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A single named parameter.
    Normal,
    /// `*args`.
    VarPositional,
    /// `**kwargs`.
    VarKeyword,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    /// Parameter name.
    pub name: String,
    /// Normal or variadic.
    pub kind: ParamKind,
    /// Declared type. Ignored for variadic parameters.
    pub annotation: Option<TypeExpr>,
    /// Default value as Python source text (`2.7`, `False`, `"abc"`).
    pub default: Option<String>,
}

/// An entry of a declared parameter list, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigItem {
    /// A parameter.
    Param(ParamDecl),
    /// The `/` token: everything before it is positional-only.
    PosOnlyBoundary,
    /// The bare `*` token: everything after it is keyword-only.
    KwOnlyBoundary,
}

/// A declared function signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Parameters and boundary tokens in declaration order.
    pub items: Vec<SigItem>,
    /// Declared return type; `None` renders no return annotation.
    pub returns: Option<TypeExpr>,
}

impl Signature {
    /// An empty signature, `()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a typed parameter.
    pub fn param(mut self, name: &str, annotation: TypeExpr) -> Self {
        self.items.push(SigItem::Param(ParamDecl {
            name: name.to_string(),
            kind: ParamKind::Normal,
            annotation: Some(annotation),
            default: None,
        }));
        self
    }

    /// Appends a typed parameter with a default value (Python source text).
    pub fn param_with_default(mut self, name: &str, annotation: TypeExpr, default: &str) -> Self {
        self.items.push(SigItem::Param(ParamDecl {
            name: name.to_string(),
            kind: ParamKind::Normal,
            annotation: Some(annotation),
            default: Some(default.to_string()),
        }));
        self
    }

    /// Appends the `/` boundary.
    pub fn pos_only(mut self) -> Self {
        self.items.push(SigItem::PosOnlyBoundary);
        self
    }

    /// Appends the bare `*` boundary.
    pub fn kw_only(mut self) -> Self {
        self.items.push(SigItem::KwOnlyBoundary);
        self
    }

    /// Appends `*name`.
    pub fn var_args(mut self, name: &str) -> Self {
        self.items.push(SigItem::Param(ParamDecl {
            name: name.to_string(),
            kind: ParamKind::VarPositional,
            annotation: None,
            default: None,
        }));
        self
    }

    /// Appends `**name`.
    pub fn var_kwargs(mut self, name: &str) -> Self {
        self.items.push(SigItem::Param(ParamDecl {
            name: name.to_string(),
            kind: ParamKind::VarKeyword,
            annotation: None,
            default: None,
        }));
        self
    }

    /// Sets the return type.
    pub fn returns(mut self, annotation: TypeExpr) -> Self {
        self.returns = Some(annotation);
        self
    }

    /// Parses a Python signature such as
    /// `(n: int, /, x: float, y: float = 2.7, *, b: bool = False) -> str`.
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let parse_error = |offset: usize, message: &str| TypeError::Parse {
            input: text.to_string(),
            offset,
            message: message.to_string(),
        };
        let trimmed_start = text.len() - text.trim_start().len();
        let body = text.trim();
        if !body.starts_with('(') {
            return Err(parse_error(trimmed_start, "expected '('"));
        }
        let close = find_closing_paren(body)
            .ok_or_else(|| parse_error(text.len(), "expected ')'"))?;
        let params_text = &body[1..close];
        let tail = body[close + 1..].trim();

        let returns = if tail.is_empty() {
            None
        } else if let Some(ret) = tail.strip_prefix("->") {
            Some(TypeExpr::parse(ret)?)
        } else {
            return Err(parse_error(trimmed_start + close + 1, "expected '->' or end of input"));
        };

        let mut items = Vec::new();
        let pieces = split_top_level(params_text, ',');
        let last = pieces.len().saturating_sub(1);
        for (i, piece) in pieces.iter().enumerate() {
            let piece = piece.trim();
            if piece.is_empty() {
                // a single trailing comma is allowed, as in Python
                if i == last && i > 0 {
                    continue;
                }
                if pieces.len() == 1 {
                    continue;
                }
                return Err(parse_error(trimmed_start, "empty parameter"));
            }
            items.push(parse_item(piece).map_err(|message| parse_error(trimmed_start, &message))?);
        }
        Ok(Self { items, returns })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn parse_item(piece: &str) -> Result<SigItem, String> {
    match piece {
        "/" => return Ok(SigItem::PosOnlyBoundary),
        "*" => return Ok(SigItem::KwOnlyBoundary),
        _ => {}
    }
    let (kind, rest) = if let Some(rest) = piece.strip_prefix("**") {
        (ParamKind::VarKeyword, rest)
    } else if let Some(rest) = piece.strip_prefix('*') {
        (ParamKind::VarPositional, rest)
    } else {
        (ParamKind::Normal, piece)
    };

    let (declared, default) = match find_top_level(rest, '=') {
        Some(eq) => (&rest[..eq], Some(rest[eq + 1..].trim().to_string())),
        None => (rest, None),
    };
    let (name, annotation) = match find_top_level(declared, ':') {
        Some(colon) => (
            declared[..colon].trim(),
            Some(TypeExpr::parse(&declared[colon + 1..]).map_err(|e| e.to_string())?),
        ),
        None => (declared.trim(), None),
    };
    if !is_identifier(name) {
        return Err(format!("invalid parameter name '{name}'"));
    }
    if kind != ParamKind::Normal && default.is_some() {
        return Err(format!("variadic parameter '{name}' cannot have a default"));
    }
    if matches!(default.as_deref(), Some("")) {
        return Err(format!("missing default value for '{name}'"));
    }
    Ok(SigItem::Param(ParamDecl {
        name: name.to_string(),
        kind,
        annotation,
        default,
    }))
}

/// Index of the `)` matching the leading `(`.
fn find_closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && c == ')' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Positions of `delimiter` not nested in brackets or string literals.
fn top_level_positions(text: &str, delimiter: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if c == delimiter && depth == 0 => positions.push(i),
            _ => {}
        }
    }
    positions
}

fn find_top_level(text: &str, delimiter: char) -> Option<usize> {
    top_level_positions(text, delimiter).first().copied()
}

fn split_top_level(text: &str, delimiter: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for pos in top_level_positions(text, delimiter) {
        pieces.push(&text[start..pos]);
        start = pos + delimiter.len_utf8();
    }
    pieces.push(&text[start..]);
    pieces
}

/// How a translated parameter may be passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Positionally or by keyword.
    Normal,
    /// Declared before `/`.
    PositionalOnly,
    /// Declared after `*` or `*args`.
    KeywordOnly,
    /// `*args`.
    VarPositional,
    /// `**kwargs`.
    VarKeyword,
}

/// A translated parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// C++ type.
    pub ty: TypeNode,
    /// Default value in C++ literal syntax.
    pub default: Option<String>,
    /// How the parameter is passed.
    pub role: ParamRole,
}

impl ParameterSpec {
    /// The lambda parameter definition, e.g. `double y=2.7`.
    pub fn definition(&self) -> String {
        match &self.default {
            Some(default) => format!("{} {}={default}", self.ty, self.name),
            None => format!("{} {}", self.ty, self.name),
        }
    }
}

/// An entry of the calling-convention annotation list passed to `m.def`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgAnnotation {
    /// `py::arg("name")` or `py::arg("name")=default`.
    Arg {
        /// Parameter name.
        name: String,
        /// Default value in C++ literal syntax.
        default: Option<String>,
    },
    /// `py::pos_only()`.
    PosOnly,
    /// `py::kw_only()`.
    KwOnly,
}

impl fmt::Display for ArgAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arg {
                name,
                default: Some(default),
            } => write!(f, "py::arg(\"{name}\")={default}"),
            Self::Arg {
                name,
                default: None,
            } => write!(f, "py::arg(\"{name}\")"),
            Self::PosOnly => write!(f, "py::pos_only()"),
            Self::KwOnly => write!(f, "py::kw_only()"),
        }
    }
}

/// Result of translating a [`Signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTranslation {
    /// Parameters in declaration order.
    pub params: Vec<ParameterSpec>,
    /// Annotation list; variadic parameters have no entry.
    pub annotations: Vec<ArgAnnotation>,
    /// Index of `py::pos_only()` in `annotations`.
    pub pos_only_at: Option<usize>,
    /// Index of `py::kw_only()` in `annotations`.
    pub kw_only_at: Option<usize>,
    /// Translated return type.
    pub returns: Option<TypeNode>,
    /// Headers required by parameter and return types, possibly repeated.
    pub headers: Vec<&'static str>,
}

impl SignatureTranslation {
    /// The wrapper lambda head, e.g. `[](int n, double x=2.7) -> std::string`.
    pub fn lambda_head(&self) -> String {
        let defs: Vec<String> = self.params.iter().map(ParameterSpec::definition).collect();
        match &self.returns {
            Some(ret) => format!("[]({}) -> {ret}", defs.join(", ")),
            None => format!("[]({})", defs.join(", ")),
        }
    }
}

/// Renders a Python default value as a C++ literal.
///
/// Only the boolean literals differ; everything else is used as written.
pub fn translate_default(value: &str) -> String {
    match value.trim() {
        "True" => "true".to_string(),
        "False" => "false".to_string(),
        other => other.to_string(),
    }
}

fn validate(signature: &Signature) -> Result<(), TypeError> {
    let invalid = |message: String| Err(TypeError::InvalidSignature(message));
    let mut names = HashSet::new();
    let mut seen_pos_only = false;
    let mut seen_star = false;
    let mut seen_kwargs = false;
    let mut seen_default = false;
    let mut awaiting_kw_param = false;
    for (i, item) in signature.items.iter().enumerate() {
        if seen_kwargs {
            return invalid("nothing may follow **kwargs".to_string());
        }
        match item {
            SigItem::PosOnlyBoundary => {
                if seen_pos_only || seen_star || i == 0 {
                    return invalid("'/' must follow at least one parameter and precede '*'".to_string());
                }
                seen_pos_only = true;
            }
            SigItem::KwOnlyBoundary => {
                if seen_star {
                    return invalid("'*' may appear only once".to_string());
                }
                seen_star = true;
                awaiting_kw_param = true;
            }
            SigItem::Param(param) => {
                if !names.insert(param.name.as_str()) {
                    return invalid(format!("duplicate parameter '{}'", param.name));
                }
                match param.kind {
                    ParamKind::VarPositional => {
                        if seen_star {
                            return invalid("'*args' may not follow '*'".to_string());
                        }
                        seen_star = true;
                    }
                    ParamKind::VarKeyword => seen_kwargs = true,
                    ParamKind::Normal => {
                        awaiting_kw_param = false;
                        if !seen_star {
                            if param.default.is_some() {
                                seen_default = true;
                            } else if seen_default {
                                return invalid(format!(
                                    "parameter '{}' without a default follows one with a default",
                                    param.name
                                ));
                            }
                        }
                    }
                }
            }
        }
    }
    if awaiting_kw_param {
        return invalid("named arguments must follow bare '*'".to_string());
    }
    Ok(())
}

/// Translates a signature into lambda parameters and annotations.
pub fn translate_signature(signature: &Signature) -> Result<SignatureTranslation, TypeError> {
    validate(signature)?;

    let pos_only_index = signature
        .items
        .iter()
        .position(|item| matches!(item, SigItem::PosOnlyBoundary));

    let mut params = Vec::new();
    let mut annotations = Vec::new();
    let mut pos_only_at = None;
    let mut kw_only_at = None;
    let mut headers = Vec::new();
    let mut keyword_only = false;

    for (index, item) in signature.items.iter().enumerate() {
        let param = match item {
            SigItem::PosOnlyBoundary => {
                pos_only_at = Some(annotations.len());
                annotations.push(ArgAnnotation::PosOnly);
                continue;
            }
            SigItem::KwOnlyBoundary => {
                keyword_only = true;
                kw_only_at = Some(annotations.len());
                annotations.push(ArgAnnotation::KwOnly);
                continue;
            }
            SigItem::Param(param) => param,
        };
        match param.kind {
            ParamKind::VarPositional => {
                keyword_only = true;
                params.push(ParameterSpec {
                    name: param.name.clone(),
                    ty: TypeNode::with_override(ARGS_TYPE),
                    default: None,
                    role: ParamRole::VarPositional,
                });
            }
            ParamKind::VarKeyword => {
                params.push(ParameterSpec {
                    name: param.name.clone(),
                    ty: TypeNode::with_override(KWARGS_TYPE),
                    default: None,
                    role: ParamRole::VarKeyword,
                });
            }
            ParamKind::Normal => {
                let annotation = param
                    .annotation
                    .as_ref()
                    .ok_or_else(|| TypeError::MissingAnnotation(param.name.clone()))?;
                let ty = translate(annotation)?;
                headers.extend(ty.headers());
                let default = param.default.as_deref().map(translate_default);
                let role = if pos_only_index.is_some_and(|boundary| index < boundary) {
                    ParamRole::PositionalOnly
                } else if keyword_only {
                    ParamRole::KeywordOnly
                } else {
                    ParamRole::Normal
                };
                annotations.push(ArgAnnotation::Arg {
                    name: param.name.clone(),
                    default: default.clone(),
                });
                params.push(ParameterSpec {
                    name: param.name.clone(),
                    ty,
                    default,
                    role,
                });
            }
        }
    }

    let returns = match &signature.returns {
        Some(annotation) => {
            let ty = translate(annotation)?;
            headers.extend(ty.headers());
            Some(ty)
        }
        None => None,
    };

    Ok(SignatureTranslation {
        params,
        annotations,
        pos_only_at,
        kw_only_at,
        returns,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rendered(annotations: &[ArgAnnotation]) -> Vec<String> {
        annotations.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn boundaries_land_at_declared_positions() {
        let sig = Signature::parse("(n: int, /, x: float, y: float = 2.7, *, b: bool = False) -> str")
            .unwrap();
        let tr = translate_signature(&sig).unwrap();
        assert_eq!(
            rendered(&tr.annotations),
            vec![
                "py::arg(\"n\")",
                "py::pos_only()",
                "py::arg(\"x\")",
                "py::arg(\"y\")=2.7",
                "py::kw_only()",
                "py::arg(\"b\")=false",
            ]
        );
        assert_eq!(tr.pos_only_at, Some(1));
        assert_eq!(tr.kw_only_at, Some(4));
        assert_eq!(
            tr.lambda_head(),
            "[](int n, double x, double y=2.7, bool b=false) -> std::string"
        );
        let roles: Vec<ParamRole> = tr.params.iter().map(|p| p.role).collect();
        assert_eq!(
            roles,
            vec![
                ParamRole::PositionalOnly,
                ParamRole::Normal,
                ParamRole::Normal,
                ParamRole::KeywordOnly
            ]
        );
        assert_eq!(tr.headers, vec!["<string>"]);
    }

    #[test]
    fn builder_matches_parsed_signature() {
        let built = Signature::new()
            .param("n", TypeExpr::named("int"))
            .pos_only()
            .param("x", TypeExpr::named("float"))
            .param_with_default("y", TypeExpr::named("float"), "2.7")
            .kw_only()
            .param_with_default("b", TypeExpr::named("bool"), "False")
            .returns(TypeExpr::named("str"));
        let parsed = Signature::parse("(n: int, /, x: float, y: float = 2.7, *, b: bool = False) -> str")
            .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn true_default_becomes_cpp_literal() {
        let sig = Signature::parse("(flag: bool = True)").unwrap();
        let tr = translate_signature(&sig).unwrap();
        assert_eq!(tr.params[0].definition(), "bool flag=true");
        assert_eq!(rendered(&tr.annotations), vec!["py::arg(\"flag\")=true"]);
        assert_eq!(tr.lambda_head(), "[](bool flag=true)");
    }

    #[test]
    fn other_defaults_render_verbatim() {
        assert_eq!(translate_default("2.7"), "2.7");
        assert_eq!(translate_default("\"abc\""), "\"abc\"");
        assert_eq!(translate_default(" False "), "false");
    }

    #[test]
    fn varargs_collect_without_annotations() {
        let tr = translate_signature(&Signature::parse("(*args: Any) -> int").unwrap()).unwrap();
        assert!(tr.annotations.is_empty());
        assert_eq!(tr.lambda_head(), "[](py::args args) -> int");
        assert_eq!(tr.params[0].role, ParamRole::VarPositional);

        let tr = translate_signature(&Signature::parse("(**args: Any) -> int").unwrap()).unwrap();
        assert!(tr.annotations.is_empty());
        assert_eq!(tr.lambda_head(), "[](py::kwargs args) -> int");
        assert_eq!(tr.params[0].role, ParamRole::VarKeyword);
    }

    #[test]
    fn mixed_variadics() {
        let sig = Signature::parse("(n: int, *args: Any, m: int, **kwargs: Any) -> int").unwrap();
        let tr = translate_signature(&sig).unwrap();
        assert_eq!(
            rendered(&tr.annotations),
            vec!["py::arg(\"n\")", "py::arg(\"m\")"]
        );
        assert_eq!(
            tr.lambda_head(),
            "[](int n, py::args args, int m, py::kwargs kwargs) -> int"
        );
        assert_eq!(tr.params[2].role, ParamRole::KeywordOnly);
        assert_eq!(tr.pos_only_at, None);
        assert_eq!(tr.kw_only_at, None);
    }

    #[test]
    fn no_return_type_means_no_arrow() {
        let tr = translate_signature(&Signature::parse("(x: int)").unwrap()).unwrap();
        assert_eq!(tr.lambda_head(), "[](int x)");
        assert!(tr.returns.is_none());
        let tr = translate_signature(&Signature::parse("() -> None").unwrap()).unwrap();
        assert_eq!(tr.lambda_head(), "[]() -> void");
    }

    #[test]
    fn headers_cover_params_then_return() {
        let sig = Signature::parse("(v: list[int], names: set[str]) -> npt.NDArray[float]").unwrap();
        let tr = translate_signature(&sig).unwrap();
        assert_eq!(
            tr.headers,
            vec![
                "<pybind11/stl.h>",
                "<pybind11/stl.h>",
                "<string>",
                "<pybind11/numpy.h>"
            ]
        );
    }

    #[test]
    fn annotated_parameters() {
        let sig = Signature::parse(
            "(f: Annotated[CppFunction, \"std::function<int(int)>\"], v: Annotated[list[int], CppQualifier.CRef]) -> int",
        )
        .unwrap();
        let tr = translate_signature(&sig).unwrap();
        assert_eq!(
            tr.lambda_head(),
            "[](std::function<int(int)> f, const std::vector<int>& v) -> int"
        );
    }

    #[test]
    fn default_containing_equals_and_commas() {
        let sig = Signature::parse("(s: str = \"a=b, c\", n: int = 3)").unwrap();
        let tr = translate_signature(&sig).unwrap();
        assert_eq!(tr.params[0].default.as_deref(), Some("\"a=b, c\""));
        assert_eq!(tr.params[1].default.as_deref(), Some("3"));
    }

    #[test]
    fn missing_annotation_errors() {
        let err = translate_signature(&Signature::parse("(x)").unwrap()).unwrap_err();
        assert_eq!(err, TypeError::MissingAnnotation("x".to_string()));
    }

    #[test]
    fn unmapped_parameter_type_errors() {
        let err = translate_signature(&Signature::parse("(x: Decimal)").unwrap()).unwrap_err();
        assert!(matches!(err, TypeError::Unmapped { .. }));
    }

    #[test]
    fn invalid_orderings_rejected() {
        for text in [
            "(/, x: int)",
            "(x: int, *, /)",
            "(x: int, *)",
            "(*args: Any, *, y: int)",
            "(**kw: Any, x: int)",
            "(x: int, x: float)",
            "(x: int = 1, y: int)",
        ] {
            let sig = Signature::parse(text).unwrap();
            assert!(
                matches!(translate_signature(&sig), Err(TypeError::InvalidSignature(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn keyword_only_may_omit_defaults() {
        let sig = Signature::parse("(x: int = 1, *, y: int)").unwrap();
        assert!(translate_signature(&sig).is_ok());
    }

    #[test]
    fn parse_errors() {
        assert!(Signature::parse("x: int").is_err());
        assert!(Signature::parse("(x: int").is_err());
        assert!(Signature::parse("(x: int) int").is_err());
        assert!(Signature::parse("(1x: int)").is_err());
        assert!(Signature::parse("(x: int,, y: int)").is_err());
        assert!(Signature::parse("(*args = 3)").is_err());
        assert!(Signature::parse("(x: int =)").is_err());
    }

    #[test]
    fn empty_and_trailing_comma() {
        assert!(Signature::parse("()").unwrap().items.is_empty());
        assert_eq!(Signature::parse("(x: int,)").unwrap().items.len(), 1);
    }
}
