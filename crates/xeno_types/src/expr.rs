//! Python-side type expressions and their parser.
//!
//! A [`TypeExpr`] is the declared type exactly as a Python annotation would
//! spell it, before any mapping to C++ happens. Expressions are usually
//! parsed from annotation text, but can be built directly with the
//! constructors on [`TypeExpr`].

use std::fmt;

use crate::error::TypeError;
use crate::node::Qualifier;

/// Name used for the array origin type after normalisation.
pub const NDARRAY: &str = "np.ndarray";
/// Name used for the array element-type wrapper after normalisation.
pub const DTYPE: &str = "np.dtype";
/// Name of the `None` type.
pub const NONE: &str = "None";

/// A declared (Python-side) type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A named type with ordered generic arguments, e.g. `dict[str, int]`.
    Named {
        /// Normalised type name (`int`, `list`, `np.float64`, ...).
        name: String,
        /// Generic arguments in declaration order.
        args: Vec<TypeExpr>,
    },
    /// A union of alternatives, e.g. `int | float | None`.
    Union(Vec<TypeExpr>),
    /// `Annotated[base, marker, ...]`.
    Annotated {
        /// The annotated type.
        base: Box<TypeExpr>,
        /// Extra metadata attached to the type.
        markers: Vec<Marker>,
    },
    /// The `...` placeholder, as in `tuple[int, ...]`.
    Ellipsis,
}

/// Metadata attached to a type through `Annotated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// A reference/pointer qualifier applied to the mapped type.
    Qualifier(Qualifier),
    /// Literal C++ type text replacing the mapped type.
    Override(String),
    /// Anything else. Rejected at translation time.
    Other(String),
}

impl TypeExpr {
    /// A plain named type with no arguments.
    pub fn named(name: &str) -> Self {
        Self::Named {
            name: normalize_name(name),
            args: Vec::new(),
        }
    }

    /// A generic type with arguments, e.g. `generic("list", vec![named("int")])`.
    pub fn generic(name: &str, args: Vec<TypeExpr>) -> Self {
        Self::Named {
            name: normalize_name(name),
            args,
        }
    }

    /// The `None` type.
    pub fn none() -> Self {
        Self::named(NONE)
    }

    /// A union of the given alternatives.
    ///
    /// Nested unions are spliced in and repeated alternatives (including a
    /// second `None`) are dropped, so `Optional[int | None]` is `int | None`.
    /// A single remaining alternative is returned as is.
    pub fn union(alternatives: Vec<TypeExpr>) -> Self {
        let mut flat: Vec<TypeExpr> = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            let nested = match alternative {
                Self::Union(inner) => inner,
                other => vec![other],
            };
            for alt in nested {
                if !flat.contains(&alt) {
                    flat.push(alt);
                }
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::Union(flat)
        }
    }

    /// `Annotated[base, marker]`.
    pub fn annotated(base: TypeExpr, marker: Marker) -> Self {
        Self::Annotated {
            base: Box::new(base),
            markers: vec![marker],
        }
    }

    /// `Annotated[base, qualifier]`.
    pub fn qualified(base: TypeExpr, qualifier: Qualifier) -> Self {
        Self::annotated(base, Marker::Qualifier(qualifier))
    }

    /// `Annotated[base, "override"]`.
    pub fn overridden(base: TypeExpr, cpp_type: &str) -> Self {
        Self::annotated(base, Marker::Override(cpp_type.to_string()))
    }

    /// A numpy array of the given element type, shaped like `npt.NDArray[T]`.
    pub fn ndarray(element: TypeExpr) -> Self {
        Self::Named {
            name: NDARRAY.to_string(),
            args: vec![
                Self::generic("tuple", vec![Self::named("int"), Self::Ellipsis]),
                Self::generic(DTYPE, vec![element]),
            ],
        }
    }

    /// Returns `true` for the `None` type.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::Named { name, args } if name == NONE && args.is_empty())
    }

    /// Parses annotation text such as `dict[str, list[bool]]` or
    /// `Annotated[int | None, CppQualifier.CRef]`.
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let mut parser = Parser::new(text);
        let expr = parser.parse_union()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }
}

/// Maps spelling variants of the same type onto one canonical name.
fn normalize_name(name: &str) -> String {
    let name = name.trim();
    let name = name
        .strip_prefix("typing.")
        .or_else(|| name.strip_prefix("builtins."))
        .unwrap_or(name);
    if let Some(rest) = name.strip_prefix("numpy.") {
        return format!("np.{rest}");
    }
    match name {
        "List" => "list".to_string(),
        "Dict" => "dict".to_string(),
        "Set" => "set".to_string(),
        "Tuple" => "tuple".to_string(),
        "Type" => "type".to_string(),
        "NoneType" => NONE.to_string(),
        other => other.to_string(),
    }
}

fn is_ndarray_alias(name: &str) -> bool {
    matches!(name, "NDArray" | "npt.NDArray" | "np.typing.NDArray")
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "[")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            Self::Union(alternatives) => {
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{alt}")?;
                }
                Ok(())
            }
            Self::Annotated { base, markers } => {
                write!(f, "Annotated[{base}")?;
                for marker in markers {
                    write!(f, ", {marker}")?;
                }
                write!(f, "]")
            }
            Self::Ellipsis => write!(f, "..."),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualifier(q) => write!(f, "CppQualifier.{}", q.name()),
            Self::Override(text) => write!(f, "{text:?}"),
            Self::Other(text) => write!(f, "{text}"),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TypeError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn error(&self, message: &str) -> TypeError {
        TypeError::Parse {
            input: self.input.to_string(),
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn parse_union(&mut self) -> Result<TypeExpr, TypeError> {
        let mut alternatives = vec![self.parse_primary()?];
        while self.eat('|') {
            alternatives.push(self.parse_primary()?);
        }
        Ok(TypeExpr::union(alternatives))
    }

    fn parse_dotted_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        let mut end = start;
        let mut expect_ident_start = true;
        for (offset, c) in self.rest().char_indices() {
            let ok = if expect_ident_start {
                c.is_alphabetic() || c == '_'
            } else {
                c.is_alphanumeric() || c == '_' || c == '.'
            };
            if !ok {
                break;
            }
            expect_ident_start = c == '.';
            end = start + offset + c.len_utf8();
        }
        if end == start || self.input[start..end].ends_with('.') {
            return None;
        }
        self.pos = end;
        Some(&self.input[start..end])
    }

    fn parse_primary(&mut self) -> Result<TypeExpr, TypeError> {
        self.skip_whitespace();
        if self.rest().starts_with("...") {
            self.pos += 3;
            return Ok(TypeExpr::Ellipsis);
        }
        let Some(raw_name) = self.parse_dotted_name() else {
            return Err(self.error("expected a type name"));
        };
        let name = normalize_name(raw_name);
        if !self.eat('[') {
            return Ok(TypeExpr::named(&name));
        }
        match name.as_str() {
            "Annotated" => {
                let base = self.parse_union()?;
                let mut markers = Vec::new();
                while self.eat(',') {
                    markers.push(self.parse_marker()?);
                }
                self.expect(']')?;
                Ok(TypeExpr::Annotated {
                    base: Box::new(base),
                    markers,
                })
            }
            "Optional" => {
                let inner = self.parse_union()?;
                self.expect(']')?;
                Ok(TypeExpr::union(vec![inner, TypeExpr::none()]))
            }
            "Union" => {
                let alternatives = self.parse_args()?;
                Ok(TypeExpr::union(alternatives))
            }
            alias if is_ndarray_alias(alias) => {
                let element = self.parse_union()?;
                self.expect(']')?;
                Ok(TypeExpr::ndarray(element))
            }
            _ => {
                let args = self.parse_args()?;
                Ok(TypeExpr::Named { name, args })
            }
        }
    }

    /// Parses `a, b, c]` after an opening bracket.
    fn parse_args(&mut self) -> Result<Vec<TypeExpr>, TypeError> {
        let mut args = vec![self.parse_union()?];
        while self.eat(',') {
            args.push(self.parse_union()?);
        }
        self.expect(']')?;
        Ok(args)
    }

    fn parse_string(&mut self, quote: char) -> Result<String, TypeError> {
        self.pos += quote.len_utf8();
        let mut value = String::new();
        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            if escaped {
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                return Ok(value);
            } else {
                value.push(c);
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn parse_marker(&mut self) -> Result<Marker, TypeError> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => Ok(Marker::Override(self.parse_string(quote)?)),
            Some(_) => {
                let raw = self.take_until_top_level_delimiter().trim().to_string();
                if raw.is_empty() {
                    return Err(self.error("expected an annotation"));
                }
                let qualifier = raw
                    .strip_prefix("CppQualifier.")
                    .or_else(|| raw.strip_prefix("Qualifier."))
                    .and_then(Qualifier::from_name);
                Ok(match qualifier {
                    Some(q) => Marker::Qualifier(q),
                    None => Marker::Other(raw),
                })
            }
            None => Err(self.error("expected an annotation")),
        }
    }

    /// Consumes raw text up to the next `,` or `]` not nested in brackets.
    fn take_until_top_level_delimiter(&mut self) -> &'a str {
        let start = self.pos;
        let mut depth = 0usize;
        for (offset, c) in self.rest().char_indices() {
            match c {
                '[' | '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ']' if depth > 0 => depth -= 1,
                ',' | ']' if depth == 0 => {
                    self.pos = start + offset;
                    return &self.input[start..self.pos];
                }
                _ => {}
            }
        }
        self.pos = self.input.len();
        &self.input[start..]
    }
}
