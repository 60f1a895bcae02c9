//! Module specs and source rendering.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;
use xeno_common::ContentHash;
use xeno_types::group_headers;

use crate::error::ModuleError;
use crate::function::{BuildFlags, FunctionSpec};
use crate::options::{parse_macros, DEFAULT_CXX_STD};

/// Stands in for the content hash in rendered source until it is embedded.
pub const HASH_PLACEHOLDER: &str = "__XENOFORM_HASH__";

/// Module attribute through which a built artifact reports its hash.
pub const CHECKSUM_ATTR: &str = "__checksum__";

const CHECKSUM_CONSTANT: &str = "XENOFORM_CHECKSUM";
const DOC_DELIMITER: &str = "xenoform";

/// Generated module source and its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSource {
    /// Source text containing [`HASH_PLACEHOLDER`].
    pub text: String,
    /// Hash of `text`.
    pub hash: ContentHash,
}

impl RenderedSource {
    /// The source with the real hash substituted, as written to disk.
    pub fn embedded(&self) -> String {
        self.text.replace(HASH_PLACEHOLDER, &self.hash.to_string())
    }
}

/// Everything registered for one module.
///
/// Functions are kept in registration order under their mangled names; a
/// later registration under the same name replaces the earlier spec in place.
/// Build flags accumulate and are deduplicated when read.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    functions: IndexMap<String, FunctionSpec>,
    headers: Vec<String>,
    include_paths: Vec<String>,
    define_macros: Vec<String>,
    compile_args: Vec<String>,
    link_args: Vec<String>,
    cxx_std: Option<u32>,
}

impl ModuleSpec {
    /// An empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function and merges its build flags.
    ///
    /// Fails without modifying the module if the function's C++ standard
    /// differs from the one fixed by earlier registrations.
    pub fn add_function(&mut self, spec: FunctionSpec, flags: BuildFlags) -> Result<(), ModuleError> {
        let mangled = spec.qualified_name();
        if let Some(existing) = self.cxx_std {
            if existing != flags.cxx_std {
                return Err(ModuleError::StandardConflict {
                    function: mangled,
                    existing,
                    requested: flags.cxx_std,
                });
            }
        }
        self.cxx_std = Some(flags.cxx_std);
        self.headers.extend(flags.headers);
        self.include_paths.extend(flags.include_paths);
        self.define_macros.extend(flags.define_macros);
        self.compile_args.extend(flags.compile_args);
        self.link_args.extend(flags.link_args);
        if self.functions.insert(mangled.clone(), spec).is_some() {
            debug!(function = %mangled, "replaced earlier registration");
        }
        Ok(())
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no function has been registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered functions in registration order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.functions.values()
    }

    /// Looks up a function by mangled name.
    pub fn function(&self, mangled: &str) -> Option<&FunctionSpec> {
        self.functions.get(mangled)
    }

    /// The module's C++ standard level.
    pub fn cxx_std(&self) -> u32 {
        self.cxx_std.unwrap_or(DEFAULT_CXX_STD)
    }

    /// Header search paths, deduplicated.
    pub fn include_paths(&self) -> Vec<String> {
        deduplicate(&self.include_paths)
    }

    /// Macros by name, in first-seen order.
    pub fn define_macros(&self) -> IndexMap<String, Option<String>> {
        parse_macros(&deduplicate(&self.define_macros))
    }

    /// Compiler arguments, deduplicated.
    pub fn compile_args(&self) -> Vec<String> {
        deduplicate(&self.compile_args)
    }

    /// Linker arguments, deduplicated.
    pub fn link_args(&self) -> Vec<String> {
        deduplicate(&self.link_args)
    }

    /// Renders the module source and hashes it.
    ///
    /// The text carries [`HASH_PLACEHOLDER`] where the hash belongs, so the
    /// hash covers everything else: headers, flags, signatures and bodies.
    pub fn make_source(&self, module_name: &str) -> RenderedSource {
        let mut out = String::new();
        self.write_preamble(&mut out, module_name);

        for group in group_headers(&self.headers).as_slices() {
            if group.is_empty() {
                continue;
            }
            for header in group {
                out.push_str(&format!("#include {header}\n"));
            }
            out.push('\n');
        }

        out.push_str("namespace py = pybind11;\n\n");
        out.push_str(&format!(
            "static const char* const {CHECKSUM_CONSTANT} = \"{HASH_PLACEHOLDER}\";\n\n"
        ));

        out.push_str("namespace {\n\n");
        for (mangled, spec) in &self.functions {
            out.push_str(&format!("auto {mangled} = {};\n\n", spec.wrapper()));
        }
        out.push_str("} // namespace\n\n");

        out.push_str(&format!("PYBIND11_MODULE({module_name}, m) {{\n"));
        out.push_str(&format!("    m.attr(\"{CHECKSUM_ATTR}\") = {CHECKSUM_CONSTANT};\n"));
        for (mangled, spec) in &self.functions {
            let mut def = format!("    m.def(\"{mangled}\", {mangled}");
            for annotation in &spec.signature.annotations {
                def.push_str(&format!(", {annotation}"));
            }
            def.push_str(&format!(", {}", spec.return_value_policy));
            if let Some(doc) = &spec.doc {
                def.push_str(&format!(", R\"{DOC_DELIMITER}({doc}){DOC_DELIMITER}\""));
            }
            def.push_str(");\n");
            out.push_str(&def);
        }
        out.push_str("}\n");

        let hash = ContentHash::from_str_content(&out);
        RenderedSource { text: out, hash }
    }

    fn write_preamble(&self, out: &mut String, module_name: &str) {
        out.push_str(&format!("// xenoform module: {module_name}\n"));
        out.push_str(&format!("// c++ standard: c++{}\n", self.cxx_std()));
        let lines = [
            ("include paths", self.include_paths()),
            ("macros", deduplicate(&self.define_macros)),
            ("compile args", self.compile_args()),
            ("link args", self.link_args()),
        ];
        for (label, values) in lines {
            if !values.is_empty() {
                out.push_str(&format!("// {label}: {}\n", values.join(" ")));
            }
        }
        out.push('\n');
    }
}

fn deduplicate(items: &[String]) -> Vec<String> {
    items
        .iter()
        .collect::<IndexSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionDecl;
    use crate::options::{CompileOptions, ReturnValuePolicy};
    use pretty_assertions::assert_eq;
    use xeno_types::Signature;

    fn register(module: &mut ModuleSpec, decl: FunctionDecl, options: &CompileOptions) -> Result<(), ModuleError> {
        let (spec, flags) = decl.into_spec(options)?;
        module.add_function(spec, flags)
    }

    fn f_decl(body: &str) -> FunctionDecl {
        FunctionDecl::new("f", Signature::parse("(n: int) -> int").unwrap(), body)
    }

    fn single(body: &str, options: &CompileOptions) -> ModuleSpec {
        let mut module = ModuleSpec::new();
        register(&mut module, f_decl(body), options).unwrap();
        module
    }

    #[test]
    fn renders_complete_module() {
        let module = single("return n * 2;", &CompileOptions::default());
        let source = module.make_source("demo");
        let expected = "\
// xenoform module: demo
// c++ standard: c++20

#include <pybind11/pybind11.h>

namespace py = pybind11;

static const char* const XENOFORM_CHECKSUM = \"__XENOFORM_HASH__\";

namespace {

auto _f = [](int n) -> int {return n * 2;};

} // namespace

PYBIND11_MODULE(demo, m) {
    m.attr(\"__checksum__\") = XENOFORM_CHECKSUM;
    m.def(\"_f\", _f, py::arg(\"n\"), py::return_value_policy::automatic);
}
";
        assert_eq!(source.text, expected);
    }

    #[test]
    fn embedded_source_carries_hash() {
        let source = single("return n;", &CompileOptions::default()).make_source("demo");
        let embedded = source.embedded();
        assert!(!embedded.contains(HASH_PLACEHOLDER));
        assert!(embedded.contains(&format!("\"{}\"", source.hash)));
        assert_eq!(source.hash, ContentHash::from_str_content(&source.text));
    }

    #[test]
    fn rendering_is_idempotent() {
        let module = single("return n;", &CompileOptions::default());
        assert_eq!(module.make_source("demo"), module.make_source("demo"));
    }

    #[test]
    fn hash_tracks_body_changes() {
        let a = single("return n;", &CompileOptions::default()).make_source("demo");
        let b = single("return n + 1;", &CompileOptions::default()).make_source("demo");
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn hash_tracks_headers_and_flags() {
        let base = single("return n;", &CompileOptions::default()).make_source("demo").hash;
        let variants = [
            CompileOptions {
                extra_includes: vec!["<cmath>".to_string()],
                ..CompileOptions::default()
            },
            CompileOptions {
                define_macros: vec!["FAST=1".to_string()],
                ..CompileOptions::default()
            },
            CompileOptions {
                extra_compile_args: vec!["-ffast-math".to_string()],
                ..CompileOptions::default()
            },
            CompileOptions {
                extra_link_args: vec!["-lm".to_string()],
                ..CompileOptions::default()
            },
            CompileOptions {
                extra_include_paths: vec!["/opt/include".to_string()],
                ..CompileOptions::default()
            },
            CompileOptions {
                cxx_std: 17,
                ..CompileOptions::default()
            },
            CompileOptions {
                return_value_policy: ReturnValuePolicy::Copy,
                ..CompileOptions::default()
            },
        ];
        for options in &variants {
            let hash = single("return n;", options).make_source("demo").hash;
            assert_ne!(hash, base, "{options:?} should change the hash");
        }
    }

    #[test]
    fn hash_tracks_module_name() {
        let module = single("return n;", &CompileOptions::default());
        assert_ne!(module.make_source("a").hash, module.make_source("b").hash);
    }

    #[test]
    fn headers_grouped_and_deduplicated() {
        let mut module = ModuleSpec::new();
        let options = CompileOptions {
            extra_includes: vec![
                "<cmath>".to_string(),
                "\"local.h\"".to_string(),
                "<cmath>".to_string(),
            ],
            ..CompileOptions::default()
        };
        let decl = FunctionDecl::new(
            "names",
            Signature::parse("(v: list[str]) -> str").unwrap(),
            "return v[0];",
        );
        register(&mut module, decl, &options).unwrap();
        let text = module.make_source("m").text;
        let includes: Vec<&str> = text.lines().filter(|l| l.starts_with("#include")).collect();
        assert_eq!(
            includes,
            vec![
                "#include \"local.h\"",
                "#include <pybind11/stl.h>",
                "#include <pybind11/pybind11.h>",
                "#include <string>",
                "#include <cmath>",
            ]
        );
    }

    #[test]
    fn flags_render_in_preamble() {
        let mut module = ModuleSpec::new();
        let options = CompileOptions {
            define_macros: vec!["A".to_string(), "B=2".to_string()],
            extra_link_args: vec!["-lm".to_string()],
            ..CompileOptions::default()
        };
        register(&mut module, f_decl("return n;"), &options).unwrap();
        register(
            &mut module,
            FunctionDecl::new("g", Signature::parse("() -> int").unwrap(), "return 0;"),
            &options,
        )
        .unwrap();
        let text = module.make_source("m").text;
        assert!(text.contains("// macros: A B=2\n"));
        assert!(text.contains("// link args: -lm\n"));
        assert!(!text.contains("// compile args"));
        assert_eq!(module.link_args(), vec!["-lm"]);
        let macros: Vec<_> = module.define_macros().into_iter().collect();
        assert_eq!(
            macros,
            vec![("A".to_string(), None), ("B".to_string(), Some("2".to_string()))]
        );
    }

    #[test]
    fn functions_keep_registration_order() {
        let mut module = ModuleSpec::new();
        for name in ["zeta", "alpha", "mid"] {
            let decl = FunctionDecl::new(name, Signature::parse("() -> int").unwrap(), "return 0;");
            register(&mut module, decl, &CompileOptions::default()).unwrap();
        }
        let names: Vec<&str> = module.functions().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        let text = module.make_source("m").text;
        let zeta = text.find("m.def(\"_zeta\"").unwrap();
        let alpha = text.find("m.def(\"_alpha\"").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn same_name_in_different_scopes_coexist() {
        let mut module = ModuleSpec::new();
        let sig = || Signature::parse("(self: Self) -> int").unwrap();
        register(
            &mut module,
            FunctionDecl::new("method", sig(), "return 1;").in_scope(&["X"]),
            &CompileOptions::default(),
        )
        .unwrap();
        register(
            &mut module,
            FunctionDecl::new("method", sig(), "return 2;").in_scope(&["Y"]),
            &CompileOptions::default(),
        )
        .unwrap();
        register(
            &mut module,
            FunctionDecl::new("method", sig(), "return 3;"),
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(module.len(), 3);
        assert!(module.function("_1X_method").is_some());
        assert!(module.function("_1Y_method").is_some());
        assert!(module.function("_method").is_some());
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut module = ModuleSpec::new();
        register(&mut module, f_decl("return 1;"), &CompileOptions::default()).unwrap();
        register(&mut module, f_decl("return 2;"), &CompileOptions::default()).unwrap();
        assert_eq!(module.len(), 1);
        assert_eq!(module.function("_f").unwrap().body, "return 2;");
    }

    #[test]
    fn conflicting_standard_rejected_without_mutation() {
        let mut module = ModuleSpec::new();
        let cxx23 = CompileOptions {
            cxx_std: 23,
            ..CompileOptions::default()
        };
        register(&mut module, f_decl("return n;"), &cxx23).unwrap();
        let before = module.make_source("m");

        let decl = FunctionDecl::new("g", Signature::parse("(i: int) -> bool").unwrap(), "return i % 3 == 0;");
        let options = CompileOptions {
            extra_link_args: vec!["-lm".to_string()],
            ..CompileOptions::default()
        };
        let err = register(&mut module, decl, &options).unwrap_err();
        assert_eq!(
            err,
            ModuleError::StandardConflict {
                function: "_g".to_string(),
                existing: 23,
                requested: 20,
            }
        );
        assert_eq!(module.len(), 1);
        assert!(module.link_args().is_empty());
        assert_eq!(module.make_source("m"), before);
    }

    #[test]
    fn docstring_and_policy_render() {
        let options = CompileOptions {
            help: Some("Doubles n.\nReally.".to_string()),
            return_value_policy: ReturnValuePolicy::Reference,
            ..CompileOptions::default()
        };
        let text = single("return 2 * n;", &options).make_source("m").text;
        assert!(text.contains(
            "m.def(\"_f\", _f, py::arg(\"n\"), py::return_value_policy::reference, R\"xenoform(Doubles n.\nReally.)xenoform\");"
        ));
    }

    #[test]
    fn keyword_markers_render_in_def() {
        let mut module = ModuleSpec::new();
        let decl = FunctionDecl::new(
            "g",
            Signature::parse("(n: int, /, x: float, *, b: bool = False) -> str").unwrap(),
            "return \"\";",
        );
        register(&mut module, decl, &CompileOptions::default()).unwrap();
        let text = module.make_source("m").text;
        assert!(text.contains(
            "m.def(\"_g\", _g, py::arg(\"n\"), py::pos_only(), py::arg(\"x\"), py::kw_only(), py::arg(\"b\")=false, py::return_value_policy::automatic);"
        ));
        assert!(text.contains("auto _g = [](int n, double x, bool b=false) -> std::string {return \"\";};"));
    }

    #[test]
    fn empty_module_still_renders() {
        let module = ModuleSpec::new();
        assert!(module.is_empty());
        let text = module.make_source("empty").text;
        assert!(text.contains("PYBIND11_MODULE(empty, m) {"));
        assert!(text.contains("#include <pybind11/pybind11.h>"));
        assert_eq!(module.cxx_std(), DEFAULT_CXX_STD);
    }
}
