//! Function declarations and the immutable specs registered from them.

use xeno_types::{translate_signature, Signature, SignatureTranslation};

use crate::error::ModuleError;
use crate::options::{CompileOptions, ReturnValuePolicy};

/// Header required by `py::vectorize`.
const VECTORIZE_HEADER: &str = "<pybind11/numpy.h>";

/// A function as the caller declares it: signature, C++ body and docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    /// Function name.
    pub name: String,
    /// Enclosing class names, outermost first.
    pub scope: Vec<String>,
    /// The declared signature.
    pub signature: Signature,
    /// C++ statements forming the function body.
    pub body: String,
    /// Documentation shown to callers.
    pub doc: Option<String>,
}

impl FunctionDecl {
    /// A free function.
    pub fn new(name: &str, signature: Signature, body: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: Vec::new(),
            signature,
            body: body.to_string(),
            doc: None,
        }
    }

    /// Places the function inside the given (nested) class scope.
    pub fn in_scope<S: AsRef<str>>(mut self, scope: &[S]) -> Self {
        self.scope = scope.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Attaches documentation.
    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    /// Translates the declaration into a registered spec and the build flags it
    /// contributes to its module.
    pub fn into_spec(self, options: &CompileOptions) -> Result<(FunctionSpec, BuildFlags), ModuleError> {
        for part in self.scope.iter().chain(std::iter::once(&self.name)) {
            if !is_identifier(part) {
                return Err(ModuleError::InvalidName(part.clone()));
            }
        }
        let signature = translate_signature(&self.signature)?;

        let mut headers: Vec<String> = signature.headers.iter().map(|h| h.to_string()).collect();
        if options.vectorize {
            headers.push(VECTORIZE_HEADER.to_string());
        }
        headers.extend(options.extra_includes.iter().cloned());

        let flags = BuildFlags {
            headers,
            include_paths: options.extra_include_paths.clone(),
            define_macros: options.define_macros.clone(),
            compile_args: options.extra_compile_args.clone(),
            link_args: options.extra_link_args.clone(),
            cxx_std: options.cxx_std,
        };
        let spec = FunctionSpec {
            name: self.name,
            scope: self.scope,
            body: self.body,
            signature,
            return_value_policy: options.return_value_policy,
            doc: options.help.clone().or(self.doc),
            vectorize: options.vectorize,
            verbose: options.verbose,
        };
        Ok((spec, flags))
    }
}

/// Whether `name` can be used as a C++ identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Build inputs a registration adds to its module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags {
    /// Headers needed by the translated types plus explicitly requested ones.
    pub headers: Vec<String>,
    /// Header search paths.
    pub include_paths: Vec<String>,
    /// Macros, `NAME` or `NAME=VALUE`.
    pub define_macros: Vec<String>,
    /// Compiler arguments.
    pub compile_args: Vec<String>,
    /// Linker arguments.
    pub link_args: Vec<String>,
    /// C++ standard level.
    pub cxx_std: u32,
}

/// A registered function. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    /// Declared name.
    pub name: String,
    /// Enclosing class names, outermost first.
    pub scope: Vec<String>,
    /// C++ body text.
    pub body: String,
    /// Translated parameters, annotations and return type.
    pub signature: SignatureTranslation,
    /// Ownership policy for the returned value.
    pub return_value_policy: ReturnValuePolicy,
    /// Docstring passed to the module, if any.
    pub doc: Option<String>,
    /// Whether the wrapper broadcasts over arrays.
    pub vectorize: bool,
    /// Whether events for this function are logged at info level.
    pub verbose: bool,
}

impl FunctionSpec {
    /// The name the function is exposed under in its module.
    pub fn qualified_name(&self) -> String {
        mangle(&self.scope, &self.name)
    }

    /// The wrapper expression assigned to the exposed name.
    pub fn wrapper(&self) -> String {
        let lambda = format!("{} {{{}}}", self.signature.lambda_head(), self.body);
        if self.vectorize {
            format!("py::vectorize({lambda})")
        } else {
            lambda
        }
    }
}

/// Builds the exposed name of a possibly scoped function.
///
/// Unscoped functions become `_name`. Each scope part is written as its
/// length followed by the part, so `Outer.Inner.method` becomes
/// `_5Outer5Inner_method` and distinct scopes never collide.
pub fn mangle<S: AsRef<str>>(scope: &[S], name: &str) -> String {
    let mut mangled = String::from("_");
    if !scope.is_empty() {
        for part in scope {
            let part = part.as_ref();
            mangled.push_str(&format!("{}{part}", part.len()));
        }
        mangled.push('_');
    }
    mangled.push_str(name);
    mangled
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xeno_types::TypeExpr;

    fn doubler() -> FunctionDecl {
        FunctionDecl::new(
            "double_it",
            Signature::parse("(x: float) -> float").unwrap(),
            "return 2 * x;",
        )
    }

    #[test]
    fn mangling() {
        assert_eq!(mangle::<&str>(&[], "f"), "_f");
        assert_eq!(mangle(&["Outer", "Inner"], "method"), "_5Outer5Inner_method");
        assert_eq!(mangle(&["X"], "method"), "_1X_method");
    }

    #[test]
    fn mangling_distinguishes_scopes_that_join_alike() {
        // a naive underscore join would give `_A_B_c` for both
        assert_ne!(mangle(&["A_B"], "c"), mangle(&["A", "B"], "c"));
        assert_ne!(mangle(&["A"], "B_c"), mangle(&["A", "B"], "c"));
        assert_ne!(mangle::<&str>(&[], "_1X_f"), mangle(&["X"], "f"));
    }

    #[test]
    fn spec_from_declaration() {
        let (spec, flags) = doubler().into_spec(&CompileOptions::default()).unwrap();
        assert_eq!(spec.qualified_name(), "_double_it");
        assert_eq!(spec.wrapper(), "[](double x) -> double {return 2 * x;}");
        assert_eq!(flags.cxx_std, 20);
        assert!(flags.headers.is_empty());
    }

    #[test]
    fn vectorize_wraps_and_adds_numpy_header() {
        let options = CompileOptions {
            vectorize: true,
            ..CompileOptions::default()
        };
        let (spec, flags) = doubler().into_spec(&options).unwrap();
        assert_eq!(
            spec.wrapper(),
            "py::vectorize([](double x) -> double {return 2 * x;})"
        );
        assert_eq!(flags.headers, vec!["<pybind11/numpy.h>"]);
    }

    #[test]
    fn help_replaces_doc() {
        let decl = doubler().with_doc("original");
        let (spec, _) = decl.clone().into_spec(&CompileOptions::default()).unwrap();
        assert_eq!(spec.doc.as_deref(), Some("original"));
        let options = CompileOptions {
            help: Some("replacement".to_string()),
            ..CompileOptions::default()
        };
        let (spec, _) = decl.into_spec(&options).unwrap();
        assert_eq!(spec.doc.as_deref(), Some("replacement"));
    }

    #[test]
    fn flags_carry_options_after_type_headers() {
        let decl = FunctionDecl::new(
            "join",
            Signature::new()
                .param("parts", TypeExpr::generic("list", vec![TypeExpr::named("str")]))
                .returns(TypeExpr::named("str")),
            "return \"\";",
        );
        let options = CompileOptions {
            define_macros: vec!["FAST".to_string()],
            extra_includes: vec!["<algorithm>".to_string()],
            extra_include_paths: vec!["/opt/include".to_string()],
            extra_compile_args: vec!["-O2".to_string()],
            extra_link_args: vec!["-lm".to_string()],
            cxx_std: 17,
            ..CompileOptions::default()
        };
        let (_, flags) = decl.into_spec(&options).unwrap();
        assert_eq!(
            flags.headers,
            vec!["<pybind11/stl.h>", "<string>", "<string>", "<algorithm>"]
        );
        assert_eq!(flags.include_paths, vec!["/opt/include"]);
        assert_eq!(flags.define_macros, vec!["FAST"]);
        assert_eq!(flags.compile_args, vec!["-O2"]);
        assert_eq!(flags.link_args, vec!["-lm"]);
        assert_eq!(flags.cxx_std, 17);
    }

    #[test]
    fn scoped_spec() {
        let decl = FunctionDecl::new("method", Signature::parse("(self: Self) -> int").unwrap(), "return 1;")
            .in_scope(&["X"]);
        let (spec, _) = decl.into_spec(&CompileOptions::default()).unwrap();
        assert_eq!(spec.qualified_name(), "_1X_method");
        assert_eq!(spec.wrapper(), "[](py::object self) -> int {return 1;}");
    }

    #[test]
    fn invalid_names_rejected() {
        let decl = FunctionDecl::new("not-a-name", Signature::new(), "");
        assert_eq!(
            decl.into_spec(&CompileOptions::default()).unwrap_err(),
            ModuleError::InvalidName("not-a-name".to_string())
        );
        let decl = FunctionDecl::new("f", Signature::new(), "").in_scope(&["<locals>"]);
        assert!(matches!(
            decl.into_spec(&CompileOptions::default()),
            Err(ModuleError::InvalidName(_))
        ));
    }

    #[test]
    fn translation_errors_surface() {
        let decl = FunctionDecl::new("f", Signature::parse("(x: Decimal)").unwrap(), "");
        assert!(matches!(
            decl.into_spec(&CompileOptions::default()),
            Err(ModuleError::Type(_))
        ));
    }
}
