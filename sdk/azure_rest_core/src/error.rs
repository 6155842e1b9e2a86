use thiserror::Error;

/// Direction of a JSON model conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Decoding a model from a response body.
    Read,
    /// Encoding a model into a request body.
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Errors that can occur when talking to an Azure REST service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service answered with a non-success status and a body that is not
    /// a JSON error envelope.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// The service answered with a `{"error": {"code", "message"}}` envelope.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A JSON body could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request failed at the transport level.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint URL is malformed, relative, or not http(s).
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// A constructor argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// A request model failed validation in its builder.
    #[error("Builder error: {0}")]
    Builder(String),

    /// The model only supports the opposite conversion direction.
    #[error("{model} does not support JSON {direction}")]
    Unsupported {
        model: &'static str,
        direction: Direction,
    },

    /// The call was cancelled by the caller before the transport completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The blocking execution path could not run.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A response lacked a header the operation depends on.
    #[error("Missing response header: {0}")]
    MissingHeader(String),
}

impl ServiceError {
    pub(crate) fn unsupported(model: &'static str, direction: Direction) -> Self {
        Self::Unsupported { model, direction }
    }

    /// Returns `true` if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status reported by the service, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
