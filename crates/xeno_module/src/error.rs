//! Error types for function registration and module assembly.

use xeno_types::TypeError;

/// Errors raised while turning declarations into module contents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// A function requests a different C++ standard than the module already uses.
    #[error(
        "function '{function}' requests C++{requested} but its module already uses C++{existing}"
    )]
    StandardConflict {
        /// Mangled name of the rejected function.
        function: String,
        /// Standard fixed by earlier registrations.
        existing: u32,
        /// Standard requested by this registration.
        requested: u32,
    },

    /// A function or scope name cannot be used as a C++ identifier.
    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),

    /// The declared signature could not be translated.
    #[error(transparent)]
    Type(#[from] TypeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_conflict_display() {
        let err = ModuleError::StandardConflict {
            function: "_g".to_string(),
            existing: 23,
            requested: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("'_g'"));
        assert!(msg.contains("C++20"));
        assert!(msg.contains("C++23"));
    }

    #[test]
    fn type_errors_pass_through() {
        let err: ModuleError = TypeError::MissingAnnotation("x".to_string()).into();
        assert_eq!(err.to_string(), "parameter 'x' has no type annotation");
    }
}
