//! Processing service boundary.
//!
//! The controller only talks to the service through [`ProcessingService`],
//! so tests and alternative transports can stand in for the HTTP client.
//!
//! # Implementations
//!
//! - [`http`] - reqwest client for the `/api/upload`, `/api/download` and
//!   `/api/health` endpoints

pub mod http;

use futures::future::BoxFuture;

use crate::error::ServiceResult;
use crate::types::{HealthStatus, ResultReference, SelectedFile, UploadReceipt};

pub use http::HttpProcessingService;

/// A remote service that transforms an uploaded CSV into a result artifact.
pub trait ProcessingService: Send + Sync {
    /// Upload `file` and wait for the service's verdict.
    ///
    /// Transport failures must come back as [`crate::ServiceError::Transport`]
    /// or [`crate::ServiceError::Timeout`], never as a service rejection.
    fn upload<'a>(&'a self, file: &'a SelectedFile) -> BoxFuture<'a, ServiceResult<UploadReceipt>>;

    /// Absolute URL where `reference` can be downloaded.
    fn download_url(&self, reference: &ResultReference) -> String;

    /// Ask the service whether it is up.
    fn health(&self) -> BoxFuture<'_, ServiceResult<HealthStatus>>;
}
