use thiserror::Error;

/// Boxed, backend-specific error as raised by a live-call invoker.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or request key that caused the error (e.g., "request.size", "request.response_format")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected format, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "image_builder", "config_loader")
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

/// Unified error type for the adapter layer.
///
/// Live-call failures always surface as [`Error::Backend`]; codec and I/O
/// failures keep their own variants and are never masked.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Backend error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Backend {
        message: String,
        status: Option<u16>,
        #[source]
        source: BoxError,
    },

    #[error("Invalid argument: {message}{}", format_context(.context))]
    InvalidArgument {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
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

/// Backend errors that know the HTTP status they were raised for.
pub trait HttpStatus {
    fn http_status(&self) -> Option<u16>;
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::invalid_argument_with_context(msg, ErrorContext::new())
    }

    pub fn invalid_argument_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidArgument {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Whether this error came from a live backend call.
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidArgument { context, .. }
            | Error::Configuration { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Normalize a backend-raised error into [`Error::Backend`].
///
/// The message and the full cause chain are preserved; the HTTP status is
/// lifted out when the concrete backend error exposes one.
pub fn wrap_error(err: BoxError) -> Error {
    let status = status_of(err.as_ref());
    Error::Backend {
        message: err.to_string(),
        status,
        source: err,
    }
}

fn status_of(err: &(dyn std::error::Error + Send + Sync + 'static)) -> Option<u16> {
    err.downcast_ref::<crate::backend::OpenAiError>()
        .and_then(HttpStatus::http_status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded for key")]
    struct ProviderQuota;

    #[test]
    fn wrap_error_keeps_message_and_cause() {
        let err = wrap_error(Box::new(ProviderQuota));
        assert!(err.is_backend());
        assert_eq!(err.to_string(), "Backend error: quota exceeded for key");
        let cause = err.source().expect("cause must be kept");
        assert!(cause.downcast_ref::<ProviderQuota>().is_some());
    }

    #[test]
    fn wrap_error_lifts_http_status() {
        let err = wrap_error(Box::new(crate::backend::OpenAiError::Api {
            status: 429,
            message: "slow down".into(),
        }));
        match err {
            Error::Backend { status, .. } => assert_eq!(status, Some(429)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_argument_formats_context() {
        let err = Error::invalid_argument_with_context(
            "bad size",
            ErrorContext::new().with_field_path("request.size"),
        );
        assert_eq!(
            err.to_string(),
            "Invalid argument: bad size (field: request.size)"
        );
        assert!(err.context().is_some());
    }
}
