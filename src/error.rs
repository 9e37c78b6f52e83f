use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or input that caused the error (e.g., "request.url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected shape, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "cache_backend", "rate_limiter")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
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

/// Unified fault type for the extraction core.
///
/// This is a closed set of fault shapes; the classifier in [`crate::classify`]
/// matches it exhaustively and maps each variant to a category and HTTP status.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Authentication required: {message}")]
    Authentication { message: String },

    #[error("Not authorized: {message}")]
    Authorization { message: String },

    #[error("Rate limit exceeded: {limit} requests per window, retry after {reset_at}")]
    RateLimited { limit: u32, reset_at: u64 },

    #[error("Circuit breaker open for '{dependency}'{}", retry_hint(.retry_in_ms))]
    BreakerOpen {
        dependency: String,
        retry_in_ms: Option<u64>,
    },

    #[error("Call to '{dependency}' timed out after {after:?}")]
    Timeout { dependency: String, after: Duration },

    #[error("Network error: {message}{}", format_context(.context))]
    Network {
        message: String,
        context: ErrorContext,
    },

    #[error("Upstream error: {message}{}", format_context(.context))]
    Upstream {
        message: String,
        context: ErrorContext,
    },

    #[error("Store error: {message}{}", format_context(.context))]
    Store {
        message: String,
        context: ErrorContext,
    },

    #[error("Server error: {message}{}", format_context(.context))]
    Server {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {message}{}", format_context(.context))]
    Unknown {
        message: String,
        context: ErrorContext,
    },
}

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

fn retry_hint(retry_in_ms: &Option<u64>) -> String {
    match retry_in_ms {
        Some(ms) => format!(", retry in {}ms", ms),
        None => String::new(),
    }
}

impl Error {
    /// Create a validation error with structured context
    pub fn validation(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a network error with structured context
    pub fn network(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Network {
            message: msg.into(),
            context,
        }
    }

    /// Create an upstream (malformed or failed external response) error
    pub fn upstream(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Upstream {
            message: msg.into(),
            context,
        }
    }

    /// Create a store error with structured context
    pub fn store(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Store {
            message: msg.into(),
            context,
        }
    }

    /// Create a server error with structured context
    pub fn server(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Server {
            message: msg.into(),
            context,
        }
    }

    /// Create an unknown error with structured context
    pub fn unknown(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Unknown {
            message: msg.into(),
            context,
        }
    }

    /// Clone the fault for fan-out to single-flight waiters.
    ///
    /// `serde_json::Error` is not `Clone`; that variant degrades to `Server`
    /// carrying the original message. Every other variant is preserved
    /// field-for-field so waiters classify identically to the originator.
    pub fn clone_fault(&self) -> Error {
        match self {
            Error::Validation { message, context } => Error::Validation {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Authentication { message } => Error::Authentication {
                message: message.clone(),
            },
            Error::Authorization { message } => Error::Authorization {
                message: message.clone(),
            },
            Error::RateLimited { limit, reset_at } => Error::RateLimited {
                limit: *limit,
                reset_at: *reset_at,
            },
            Error::BreakerOpen {
                dependency,
                retry_in_ms,
            } => Error::BreakerOpen {
                dependency: dependency.clone(),
                retry_in_ms: *retry_in_ms,
            },
            Error::Timeout { dependency, after } => Error::Timeout {
                dependency: dependency.clone(),
                after: *after,
            },
            Error::Network { message, context } => Error::Network {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Upstream { message, context } => Error::Upstream {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Store { message, context } => Error::Store {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Server { message, context } => Error::Server {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Serialization(e) => Error::Server {
                message: format!("serialization error: {}", e),
                context: ErrorContext::new().with_source("serialization"),
            },
            Error::Unknown { message, context } => Error::Unknown {
                message: message.clone(),
                context: context.clone(),
            },
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. }
            | Error::Network { context, .. }
            | Error::Upstream { context, .. }
            | Error::Store { context, .. }
            | Error::Server { context, .. }
            | Error::Unknown { context, .. } => Some(context),
            _ => None,
        }
    }
}
