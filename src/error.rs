use crate::model::{HarmCategory, ServiceErrorClass};
use crate::schema::ValidationError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error
    /// (e.g., "settings.base_url", "ExplainInput.language")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "settings", "flow_builder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse classification of [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    MissingField,
    InvalidMedia,
    ContentBlocked,
    ModelService,
    MalformedOutput,
    Configuration,
    UnknownFlow,
    Serialization,
}

/// Which side of a flow invocation a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureOrigin {
    /// The caller's input did not satisfy the input schema.
    Input,
    /// The prompt could not be rendered from the (validated) input.
    Render,
    /// The model service failed or refused to generate.
    Model,
    /// The model answered, but not in the declared output shape.
    Output,
}

/// Unified error type for flow definition and invocation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {}", format_violations(.errors))]
    Validation { errors: Vec<ValidationError> },

    #[error("Missing field '{field}' while rendering prompt")]
    MissingField { field: String },

    #[error("Invalid media for '{field}': {reason}")]
    InvalidMedia { field: String, reason: String },

    #[error("Content blocked by safety policy ({reason}){}", format_category(.category))]
    ContentBlocked {
        category: Option<HarmCategory>,
        reason: String,
    },

    #[error("Model service error ({class}{}): {message}", format_status(.status))]
    ModelService {
        class: ServiceErrorClass,
        status: Option<u16>,
        message: String,
        retry_after_ms: Option<u32>,
    },

    #[error("Malformed model output: {message}{}", format_output_violations(.errors))]
    MalformedOutput {
        message: String,
        errors: Vec<ValidationError>,
        raw: Option<String>,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Unknown flow: {name}")]
    UnknownFlow { name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_violations(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_output_violations(errors: &[ValidationError]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(" ({})", format_violations(errors))
    }
}

fn format_category(category: &Option<HarmCategory>) -> String {
    category.map(|c| format!(": {}", c)).unwrap_or_default()
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(", HTTP {}", s)).unwrap_or_default()
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn model_service(class: ServiceErrorClass, message: impl Into<String>) -> Self {
        Error::ModelService {
            class,
            status: None,
            message: message.into(),
            retry_after_ms: None,
        }
    }

    pub fn malformed_output(message: impl Into<String>, raw: Option<String>) -> Self {
        Error::MalformedOutput {
            message: message.into(),
            errors: Vec::new(),
            raw,
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::model_service(ServiceErrorClass::Cancelled, "invocation cancelled by caller")
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::MissingField { .. } => ErrorKind::MissingField,
            Error::InvalidMedia { .. } => ErrorKind::InvalidMedia,
            Error::ContentBlocked { .. } => ErrorKind::ContentBlocked,
            Error::ModelService { .. } => ErrorKind::ModelService,
            Error::MalformedOutput { .. } => ErrorKind::MalformedOutput,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::UnknownFlow { .. } => ErrorKind::UnknownFlow,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Where in an invocation this error originated, if it came from one.
    pub fn stage(&self) -> Option<FailureOrigin> {
        match self {
            Error::Validation { .. } => Some(FailureOrigin::Input),
            Error::MissingField { .. } | Error::InvalidMedia { .. } => Some(FailureOrigin::Render),
            Error::ContentBlocked { .. } | Error::ModelService { .. } => Some(FailureOrigin::Model),
            Error::MalformedOutput { .. } => Some(FailureOrigin::Output),
            Error::Configuration { .. } | Error::UnknownFlow { .. } | Error::Serialization(_) => {
                None
            }
        }
    }

    /// Whether repeating the same call later (with backoff) may succeed.
    ///
    /// Only transient model-service failures qualify; blocked content and
    /// malformed output need a different input or prompt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ModelService { class, .. } => class.is_retryable(),
            _ => false,
        }
    }

    /// Field-level violations carried by validation and malformed-output errors.
    pub fn violations(&self) -> &[ValidationError] {
        match self {
            Error::Validation { errors } | Error::MalformedOutput { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}
