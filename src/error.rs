//! Error types for the inbox classifier.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Failures of a single classification request.
///
/// Every variant is terminal for the request. The first four are caused by
/// what the caller sent; the last two by the completion provider.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Text extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl ClassifyError {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::EmptyInput(_) => "empty_input",
            Self::ExtractionFailure(_) => "extraction_failure",
            Self::UpstreamFailure(_) => "upstream_failure",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Human-readable detail without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidInput(d)
            | Self::UnsupportedMediaType(d)
            | Self::EmptyInput(d)
            | Self::ExtractionFailure(d)
            | Self::UpstreamFailure(d)
            | Self::MalformedResponse(d) => d,
        }
    }

    /// True when the caller's input caused the failure.
    ///
    /// Extraction failures count as bad input: a PDF we cannot read is the
    /// caller's document, not a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::UnsupportedMediaType(_)
                | Self::EmptyInput(_)
                | Self::ExtractionFailure(_)
        )
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
