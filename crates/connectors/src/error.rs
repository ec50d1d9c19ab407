//! Error types for connectors

use thiserror::Error;

/// Errors that can occur during connector operations
///
/// The lifecycle driver captures these into `success = false` result objects
/// at the framework boundary; only construction-time errors (unknown source
/// type, invalid rate limit) reach the caller as `Err`.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Failed to initialize the connector (e.g. HTTP client creation failed)
    #[error("failed to initialize connector: {0}")]
    Init(String),

    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing failed (file-dump mode)
    #[cfg(feature = "rb2b")]
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O failed (file-dump mode)
    #[error("file read error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication rejected by the provider
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Provider rate limit hit (429)
    #[error("Rate limited by provider, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Non-2xx response outside the well-known cases
    #[error("HTTP status {status} from {context}")]
    Status { status: u16, context: String },

    /// Transient transport failures exhausted all retry attempts
    #[error("request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Credential environment variable unset or empty
    #[error("environment variable '{0}' is not set or empty")]
    MissingCredential(String),

    /// Configuration error (missing or malformed config keys)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource type not recognized by the adapter
    #[error("Invalid resource type: {0}")]
    InvalidResource(String),

    /// File dump extension not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFile(String),

    /// Unknown source type passed to the factory
    #[error("Unknown source type '{source_type}'. Supported: {supported}")]
    UnknownSource {
        source_type: String,
        supported: String,
    },
}
