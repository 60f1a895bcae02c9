//! Error types for type and signature translation.

/// Errors raised while parsing or translating a declared type or signature.
///
/// All of these surface at registration time: a declaration that cannot be
/// translated is never registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// A type has no C++ mapping and no override was supplied.
    #[error("no C++ type known for '{python_type}' and no override provided")]
    Unmapped {
        /// The Python-side type name.
        python_type: String,
    },

    /// An `Annotated` marker is neither a qualifier nor an override string.
    #[error("unexpected annotation for {base}: {marker}")]
    InvalidMarker {
        /// The annotated base type, rendered.
        base: String,
        /// The offending marker text.
        marker: String,
    },

    /// More than one marker was attached to an `Annotated` type.
    #[error("one and only one annotation must be specified for {base}, got {count}")]
    TooManyMarkers {
        /// The annotated base type, rendered.
        base: String,
        /// How many markers were supplied.
        count: usize,
    },

    /// `Annotated` was used with no marker at all.
    #[error("Annotated[{base}] carries no annotation")]
    EmptyAnnotation {
        /// The annotated base type, rendered.
        base: String,
    },

    /// `Annotated` appears somewhere other than the outermost position.
    #[error("Annotated may only wrap a whole parameter type, found inside '{outer}'")]
    NestedAnnotation {
        /// The enclosing type, rendered.
        outer: String,
    },

    /// An array type does not have the expected `ndarray[shape, dtype[T]]` shape.
    #[error("cannot determine element type of array type '{0}'")]
    InvalidArrayShape(String),

    /// A non-variadic parameter has no type annotation.
    #[error("parameter '{0}' has no type annotation")]
    MissingAnnotation(String),

    /// Parameters, markers and variadics are in an order Python would reject.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Type or signature text could not be parsed.
    #[error("parse error at offset {offset} in '{input}': {message}")]
    Parse {
        /// The text being parsed.
        input: String,
        /// Byte offset of the failure.
        offset: usize,
        /// What was expected.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_display() {
        let err = TypeError::Unmapped {
            python_type: "Decimal".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no C++ type known for 'Decimal' and no override provided"
        );
    }

    #[test]
    fn too_many_markers_display() {
        let err = TypeError::TooManyMarkers {
            base: "int".to_string(),
            count: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("one and only one"));
        assert!(msg.contains("got 2"));
    }

    #[test]
    fn parse_display() {
        let err = TypeError::Parse {
            input: "list[int".to_string(),
            offset: 8,
            message: "expected ']'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 8"));
        assert!(msg.contains("expected ']'"));
    }
}
