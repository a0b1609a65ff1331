//! Field-level validation errors.

use std::fmt;

/// Validation error with location information.
///
/// Contains details about what failed and where in the data structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Path to the offending value (e.g., "question", "questions[0].answer").
    /// Empty for the root value.
    pub path: String,
    /// Error message describing what went wrong
    pub message: String,
    /// The invalid value that caused the error
    pub value: Option<serde_json::Value>,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Top-level field name this error belongs to, if any.
    pub fn field(&self) -> Option<&str> {
        let end = self
            .path
            .find(|c| c == '.' || c == '[')
            .unwrap_or(self.path.len());
        let head = &self.path[..end];
        if head.is_empty() {
            None
        } else {
            Some(head)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}
