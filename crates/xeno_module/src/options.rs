//! Per-registration compile options.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// C++ standard used when a registration does not ask for one.
pub const DEFAULT_CXX_STD: u32 = 20;

/// How pybind11 transfers ownership of a returned value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnValuePolicy {
    /// Let pybind11 choose (default).
    #[default]
    Automatic,
    /// Like `Automatic`, but references for pointers and lvalue references.
    AutomaticReference,
    /// Python takes ownership of the returned object.
    TakeOwnership,
    /// Python receives a copy.
    Copy,
    /// The returned object is moved into a new Python-owned object.
    Move,
    /// Python references the object without owning it.
    Reference,
    /// Like `Reference`, keeping the implicit `self` alive.
    ReferenceInternal,
}

impl ReturnValuePolicy {
    /// The enumerator name in `py::return_value_policy`.
    pub fn cpp_name(self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::AutomaticReference => "automatic_reference",
            Self::TakeOwnership => "take_ownership",
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Reference => "reference",
            Self::ReferenceInternal => "reference_internal",
        }
    }
}

impl fmt::Display for ReturnValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "py::return_value_policy::{}", self.cpp_name())
    }
}

/// Options attached to one function registration.
///
/// Deserializes from a TOML table where every key is optional; list-valued
/// keys also accept a single string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Wrap the function in `py::vectorize` so it broadcasts over arrays.
    pub vectorize: bool,
    /// Preprocessor macros, `NAME` or `NAME=VALUE`.
    #[serde(deserialize_with = "string_or_list")]
    pub define_macros: Vec<String>,
    /// Extra headers or inline sources to include, e.g. `"<cmath>"`.
    #[serde(deserialize_with = "string_or_list")]
    pub extra_includes: Vec<String>,
    /// Extra header search paths.
    #[serde(deserialize_with = "string_or_list")]
    pub extra_include_paths: Vec<String>,
    /// Extra compiler arguments.
    #[serde(deserialize_with = "string_or_list")]
    pub extra_compile_args: Vec<String>,
    /// Extra linker arguments.
    #[serde(deserialize_with = "string_or_list")]
    pub extra_link_args: Vec<String>,
    /// Ownership policy for the returned value.
    pub return_value_policy: ReturnValuePolicy,
    /// C++ standard, e.g. `20` for `-std=c++20`.
    pub cxx_std: u32,
    /// Replaces the declaration's own documentation.
    pub help: Option<String>,
    /// Log this function's registration and resolution at info level.
    pub verbose: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            vectorize: false,
            define_macros: Vec::new(),
            extra_includes: Vec::new(),
            extra_include_paths: Vec::new(),
            extra_compile_args: Vec::new(),
            extra_link_args: Vec::new(),
            return_value_policy: ReturnValuePolicy::default(),
            cxx_std: DEFAULT_CXX_STD,
            help: None,
            verbose: false,
        }
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrList;

    impl<'de> Visitor<'de> for StringOrList {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut items = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                items.push(item);
            }
            Ok(items)
        }
    }

    deserializer.deserialize_any(StringOrList)
}

/// Splits `["DEF1", "DEF2=3"]` into `{DEF1: None, DEF2: Some("3")}`.
///
/// Only the first `=` separates name from value. A repeated name keeps its
/// first position and takes the last value.
pub fn parse_macros<S: AsRef<str>>(macros: &[S]) -> IndexMap<String, Option<String>> {
    macros
        .iter()
        .map(|m| m.as_ref().trim())
        .filter(|m| !m.is_empty())
        .map(|m| match m.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (m.to_string(), None),
        })
        .collect()
}

/// Operating systems that platform-specific settings can be keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Platform {
    /// Linux.
    Linux,
    /// macOS.
    Darwin,
    /// Windows.
    Windows,
}

impl Platform {
    /// The platform this binary was built for, if it is one of the known ones.
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::Darwin)
        } else if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else {
            None
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Linux" => Ok(Self::Linux),
            "Darwin" => Ok(Self::Darwin),
            "Windows" => Ok(Self::Windows),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Picks the settings for the current platform, if any are given.
pub fn platform_specific(settings: &IndexMap<Platform, Vec<String>>) -> Option<&[String]> {
    settings.get(&Platform::current()?).map(Vec::as_slice)
}
