//! Default Python-to-C++ type mapping and per-type header requirements.

/// Origin name used for unions once parsed.
pub const UNION: &str = "Union";

/// C++ type used when a union contains `None`.
pub const OPTIONAL_CPP: &str = "std::optional";

/// Python type name -> C++ type name.
pub const DEFAULT_TYPE_MAPPING: &[(&str, &str)] = &[
    ("None", "void"),
    ("int", "int"),
    ("np.int32", "int32_t"),
    ("np.int64", "int64_t"),
    ("bool", "bool"),
    ("float", "double"),
    ("np.float32", "float"),
    ("np.float64", "double"),
    ("str", "std::string"),
    ("np.ndarray", "py::array_t"),
    ("bytes", "py::bytes"),
    ("bytearray", "py::bytearray"),
    ("slice", "py::slice"),
    ("list", "std::vector"),
    ("set", "std::unordered_set"),
    ("dict", "std::unordered_map"),
    ("tuple", "std::tuple"),
    ("Any", "py::object"),
    ("Self", "py::object"),
    ("type", "py::type"),
    (UNION, "std::variant"),
    ("PythonFunction", "py::function"),
    ("CppFunction", "py::cpp_function"),
];

/// C++ type name -> header that must be included to use it from the toolkit.
pub const HEADER_REQUIREMENTS: &[(&str, &str)] = &[
    ("std::string", "<string>"),
    ("std::vector", "<pybind11/stl.h>"),
    ("std::unordered_set", "<pybind11/stl.h>"),
    ("std::unordered_map", "<pybind11/stl.h>"),
    ("std::tuple", "<pybind11/stl.h>"),
    ("py::array_t", "<pybind11/numpy.h>"),
    ("std::variant", "<pybind11/stl.h>"),
    (OPTIONAL_CPP, "<pybind11/stl.h>"),
];

/// Looks up the C++ type for a normalised Python type name.
pub fn cpp_type_for(python_type: &str) -> Option<&'static str> {
    DEFAULT_TYPE_MAPPING
        .iter()
        .find(|(py, _)| *py == python_type)
        .map(|(_, cpp)| *cpp)
}

/// Looks up the header needed by a C++ type name.
pub fn header_for(cpp_type: &str) -> Option<&'static str> {
    HEADER_REQUIREMENTS
        .iter()
        .find(|(cpp, _)| *cpp == cpp_type)
        .map(|(_, header)| *header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_names_are_unique() {
        for (i, (a, _)) in DEFAULT_TYPE_MAPPING.iter().enumerate() {
            for (b, _) in &DEFAULT_TYPE_MAPPING[i + 1..] {
                assert_ne!(a, b, "duplicate mapping for {a}");
            }
        }
    }

    #[test]
    fn lookups() {
        assert_eq!(cpp_type_for("float"), Some("double"));
        assert_eq!(cpp_type_for("slice"), Some("py::slice"));
        assert_eq!(cpp_type_for("Decimal"), None);
        assert_eq!(header_for("std::string"), Some("<string>"));
        assert_eq!(header_for("int"), None);
    }
}
