//! Error types for the upload workflow.
//!
//! - [`ConfigError`] - Configuration resolution errors
//! - [`ServiceError`] - Processing service errors (transport or service-reported)
//! - [`DownloadError`] - Errors while following a download target
//! - [`WorkflowError`] - Controller-level errors
//!
//! Conversion is automatic via `From` implementations, allowing `?` to
//! work across boundaries.

use thiserror::Error;

// =============================================================================
// User-facing messages
// =============================================================================

/// Reason shown when a candidate file is not a CSV.
pub const INVALID_FILE_TYPE: &str = "invalid file type";

/// Reason shown when submit is triggered without a selection.
pub const NO_FILE_SELECTED: &str = "no file selected";

/// Reason shown when the service failed without saying why.
pub const PROCESSING_FAILED: &str = "processing failed";

/// Reason shown when no response could be received at all.
pub const SERVICE_UNREACHABLE: &str = "could not reach service";

/// Reason shown when a submit was abandoned before its outcome arrived.
pub const SUBMIT_CANCELLED: &str = "upload cancelled";

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base URL is not an absolute http(s) URL.
    #[error("Invalid service URL: {0}")]
    InvalidBaseUrl(String),

    /// Environment variable is set but not valid unicode.
    #[error("Environment variable {0} is not valid unicode")]
    InvalidEnv(&'static str),

    /// HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

// =============================================================================
// Processing Service Errors
// =============================================================================

/// Errors from the processing service client.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No response could be received (refused, reset, DNS, ...).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The request timed out before a response arrived.
    #[error("Request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("Service returned {status}: {}", .message.as_deref().unwrap_or(PROCESSING_FAILED))]
    Rejected { status: u16, message: Option<String> },

    /// The service answered 2xx without a usable result reference.
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    /// The selected file could not be read or packaged for upload.
    /// Nothing was sent.
    #[error("Failed to read {name}: {source}")]
    FileRead {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    /// True when no response was received from the service.
    pub fn is_transport(&self) -> bool {
        matches!(self, ServiceError::Transport(_) | ServiceError::Timeout)
    }

    /// True when the failure happened on this side, before any request.
    pub fn is_local(&self) -> bool {
        matches!(self, ServiceError::FileRead { .. })
    }

    /// Message surfaced to the user for this failure.
    ///
    /// Service-supplied text is passed through verbatim; connectivity
    /// problems never borrow the service-error wording.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Transport(_) | ServiceError::Timeout => SERVICE_UNREACHABLE.to_string(),
            ServiceError::Rejected { message: Some(m), .. } if !m.trim().is_empty() => m.clone(),
            ServiceError::Rejected { .. } | ServiceError::InvalidResponse(_) => {
                PROCESSING_FAILED.to_string()
            }
            ServiceError::FileRead { name, source } => format!("could not read {}: {}", name, source),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

// =============================================================================
// Download Errors
// =============================================================================

/// Errors while fetching a result artifact.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No response could be received.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Download failed ({status}): {}", .message.as_deref().unwrap_or("unknown error"))]
    Status { status: u16, message: Option<String> },

    /// Reference cannot be used as a local file name.
    #[error("Result reference is not a valid file name: {0}")]
    InvalidReference(String),

    /// Writing the artifact failed.
    #[error("Failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Transport(err.to_string())
    }
}

// =============================================================================
// Workflow Errors (top-level)
// =============================================================================

/// Errors reported by the workflow controller.
///
/// Every variant leaves the controller in a state from which `reset()` or a
/// fresh selection is possible.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Submit was triggered without a selected file.
    #[error("no file selected")]
    NoFileSelected,

    /// Candidate file is not a CSV.
    #[error("invalid file type")]
    InvalidFileType { media_type: String },

    /// Processing service failure.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for processing service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for downloads.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Result type for controller operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
