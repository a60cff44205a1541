//! Error taxonomy for the exporter.
//!
//! Only [`ConfigError`] is fatal. [`ApiError`] is scoped to one remote
//! retrieval, [`ValueError`] to one sample and [`SinkError`] to one emission;
//! the collector absorbs all three where they occur.

use std::path::PathBuf;

use thiserror::Error;

// ----------------------------------------------------------------------------
// Core Exporter Errors
// ----------------------------------------------------------------------------

/// The main error type for the exporter.
/// All subsystem errors can be converted to this type.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Exposition error: {0}")]
    Exposition(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExporterError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ExporterError::Config(_) => false,
            ExporterError::Api(e) => e.is_recoverable(),
            ExporterError::Value(_) => true,
            ExporterError::Sink(_) => true,
            ExporterError::Exposition(_) => true,
            ExporterError::Io(_) => true,
            ExporterError::Internal(_) => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ExporterError::Config(_) => "config",
            ExporterError::Api(e) => e.category(),
            ExporterError::Value(_) => "value",
            ExporterError::Sink(_) => "sink",
            ExporterError::Exposition(_) => "exposition",
            ExporterError::Io(_) => "io",
            ExporterError::Internal(_) => "internal",
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

/// Errors related to configuration loading and validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    #[error("Failed to build API client: {message}")]
    ClientBuild { message: String },

    #[error("Failed to serialize configuration: {message}")]
    SerializeError { message: String },
}

impl ConfigError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        ConfigError::MissingField {
            field: field.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Remote API Errors
// ----------------------------------------------------------------------------

/// Failure of a single remote call (or of a paginated listing).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request '{api}' failed: {message}")]
    Transport { api: &'static str, message: String },

    #[error("Timeout waiting for '{api}' (waited {timeout_ms}ms)")]
    Timeout { api: &'static str, timeout_ms: u64 },

    #[error("Request '{api}' returned HTTP status {status}")]
    Status { api: &'static str, status: u16 },

    #[error("Request '{api}' rejected (errno {errno}): {reason}")]
    Rejected {
        api: &'static str,
        errno: String,
        reason: String,
    },

    #[error("Failed to encode request '{api}': {message}")]
    Encode { api: &'static str, message: String },

    #[error("Invalid response from '{api}': {message}")]
    Decode { api: &'static str, message: String },

    #[error("Pagination did not finish within {max_pages} pages")]
    PaginationLimit { max_pages: usize },
}

impl ApiError {
    /// Authentication and authorization failures will not heal on the next scrape.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ApiError::Status { status: 401 | 403, .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Transport { .. } | ApiError::Timeout { .. } => "transport",
            ApiError::Status { .. } | ApiError::Rejected { .. } => "api",
            ApiError::Encode { .. } => "encode",
            ApiError::Decode { .. } => "decode",
            ApiError::PaginationLimit { .. } => "pagination",
        }
    }

    pub fn transport(api: &'static str, message: impl Into<String>) -> Self {
        ApiError::Transport {
            api,
            message: message.into(),
        }
    }

    pub fn decode(api: &'static str, message: impl Into<String>) -> Self {
        ApiError::Decode {
            api,
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Value Normalization Errors
// ----------------------------------------------------------------------------

/// A single remote field could not be turned into an `f64`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Malformed numeric value '{raw}': {message}")]
    MalformedValue { raw: String, message: String },

    #[error("Unsupported value type: {found}")]
    UnsupportedValueType { found: String },
}

// ----------------------------------------------------------------------------
// Sink Errors
// ----------------------------------------------------------------------------

/// A sample was refused by the metric sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Metric '{metric}' expects {expected} label values, got {found}")]
    LabelArity {
        metric: String,
        expected: usize,
        found: usize,
    },

    #[error("Sample channel closed")]
    Closed,
}

// ----------------------------------------------------------------------------
// Result Type Aliases
// ----------------------------------------------------------------------------

/// Standard result type for exporter operations
pub type ExporterResult<T> = Result<T, ExporterError>;

/// Result type for remote API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for value normalization
pub type ValueResult<T> = Result<T, ValueError>;
