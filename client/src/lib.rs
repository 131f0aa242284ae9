//! # Tallyflow - CSV upload workflow client
//!
//! Tallyflow sends a CSV statement to a remote processing service and fetches
//! the transformed result. The heart of the crate is the workflow
//! controller, a small state machine that validates the selection, keeps a
//! single upload in flight and interprets the service's answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ File source │────▶│  Controller  │────▶│  Processing  │────▶│  Download   │
//! │ (pick/drop) │     │  (validate)  │◀────│   service    │     │   agent     │
//! └─────────────┘     └──────────────┘     └──────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tallyflow::{CandidateFile, ClientConfig, DownloadAgent, WorkflowController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = WorkflowController::from_config(ClientConfig::from_env()?)?;
//!     controller.accept_candidate(Some(CandidateFile::from_path("statement.csv")?))?;
//!     controller.submit().await?;
//!
//!     if let Some(target) = controller.request_download() {
//!         let agent = DownloadAgent::for_service(controller.service(), ".");
//!         println!("saved {}", agent.follow(&target).await?.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Service address and fixed limits
//! - [`error`] - Error types
//! - [`types`] - Files, result references, wire bodies
//! - [`events`] - Per-controller log stream
//! - [`service`] - Processing service trait and HTTP client
//! - [`workflow`] - State machine and controller
//! - [`agent`] - Download agent

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub mod service;
pub mod workflow;

pub mod agent;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ClientConfig, CSV_MEDIA_TYPE, DEFAULT_SERVICE_URL, MAX_FILE_SIZE, SERVICE_URL_ENV};

pub use error::{
    ConfigError, DownloadError, ServiceError, WorkflowError,
    ConfigResult, DownloadResult, ServiceResult, WorkflowResult,
};

pub use events::{EventBroadcaster, LogEntry, LogLevel};

pub use types::{
    CandidateFile, DownloadTarget, FileBody, HealthStatus, ResultReference, SelectedFile,
    UploadReceipt,
};

pub use service::{HttpProcessingService, ProcessingService};

pub use workflow::{
    FailureKind, Notice, NoticeLevel, SubmitOutcome, WorkflowController, WorkflowState,
    WorkflowStatus,
};

pub use agent::DownloadAgent;
