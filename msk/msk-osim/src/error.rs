//! Error types for model descriptor parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a model descriptor.
#[derive(Debug, Error)]
pub enum OsimError {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Missing required element.
    #[error("missing required element: {element} in {context}")]
    MissingElement {
        /// The missing element name.
        element: &'static str,
        /// Where the element was expected.
        context: String,
    },

    /// Invalid element text or attribute value.
    #[error("invalid value for {field} in {context}: {message}")]
    InvalidValue {
        /// The field with the invalid value.
        field: &'static str,
        /// The element containing the field.
        context: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// Model file not found.
    #[error("model file not found: {0}")]
    FileNotFound(PathBuf),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OsimError {
    /// Create a missing element error.
    pub fn missing_element(element: &'static str, context: impl Into<String>) -> Self {
        Self::MissingElement {
            element,
            context: context.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(
        field: &'static str,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field,
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Result type for descriptor operations.
pub type Result<T> = std::result::Result<T, OsimError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_element_names_context() {
        let err = OsimError::missing_element("Model", "OpenSimDocument");
        assert!(err.to_string().contains("Model"));
        assert!(err.to_string().contains("OpenSimDocument"));
    }

    #[test]
    fn invalid_value_carries_message() {
        let err = OsimError::invalid_value("location", "PathPoint 'p1'", "expected 3 values");
        assert!(err.to_string().contains("location"));
        assert!(err.to_string().contains("expected 3 values"));
    }
}
