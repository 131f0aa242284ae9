//! Workflow state and its transitions.
//!
//! [`WorkflowState`] is a plain value: every operation is a synchronous
//! method that moves it from one consistent state to the next. The
//! controller wraps it in a mutex and adds the network call.
//!
//! ```text
//!            acceptCandidate(bad)            acceptCandidate(good)
//!   Idle ───────────────────────▶ FileRejected ─────────────────▶ Ready
//!    ▲                                                              │ submit
//!    │ reset (from anywhere)                                        ▼
//!    └──────────────────────── Succeeded / Failed ◀──────────── Submitting
//! ```

use std::sync::Arc;

use crate::error::{ServiceError, INVALID_FILE_TYPE, NO_FILE_SELECTED, SUBMIT_CANCELLED};
use crate::types::{CandidateFile, ResultReference, SelectedFile, UploadReceipt};

/// Message shown after a successful upload when the service sends none.
pub const DEFAULT_SUCCESS_MESSAGE: &str = "File processed successfully!";

// =============================================================================
// Status
// =============================================================================

/// Why a submission failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The service answered and refused the content.
    Service,
    /// No usable response was received.
    Transport,
    /// The file could not be read or packaged; nothing was sent.
    Local,
    /// The caller stopped waiting before the outcome arrived.
    Cancelled,
}

/// The single active workflow status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowStatus {
    Idle,
    FileRejected { reason: String },
    Ready,
    Submitting,
    Succeeded { reference: ResultReference },
    Failed { reason: String, kind: FailureKind },
}

impl WorkflowStatus {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::FileRejected { .. } => "file-rejected",
            WorkflowStatus::Ready => "ready",
            WorkflowStatus::Submitting => "submitting",
            WorkflowStatus::Succeeded { .. } => "succeeded",
            WorkflowStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, WorkflowStatus::Submitting)
    }
}

/// Severity of the user-facing notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// The one piece of user-facing text currently shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }
}

// =============================================================================
// Transition outcomes
// =============================================================================

/// Result of offering a candidate file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// No file was offered.
    Empty,
    /// A submission is running; the selection was left untouched.
    Busy,
    /// The file is not a CSV.
    Rejected { media_type: String },
    /// The file is now the selection.
    Accepted,
}

/// Permission to run one upload, tagged with the generation it belongs to.
#[derive(Clone, Debug)]
pub struct SubmitTicket {
    pub generation: u64,
    pub file: Arc<SelectedFile>,
}

/// Why `begin_submit` did not start a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitRefusal {
    /// A request is already in flight.
    InFlight,
    /// Nothing is selected.
    NoFileSelected,
    /// The current result must be reset before another upload.
    AlreadySucceeded,
}

/// Result of applying a finished request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The state moved to Succeeded or Failed.
    Applied,
    /// The request belongs to an older generation and was dropped.
    Stale,
}

// =============================================================================
// State
// =============================================================================

/// Everything the workflow owns for one run.
#[derive(Clone, Debug)]
pub struct WorkflowState {
    status: WorkflowStatus,
    selected: Option<Arc<SelectedFile>>,
    drag_active: bool,
    notice: Option<Notice>,
    generation: u64,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            status: WorkflowStatus::Idle,
            selected: None,
            drag_active: false,
            notice: None,
            generation: 0,
        }
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &WorkflowStatus {
        &self.status
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_deref()
    }

    pub fn is_drag_active(&self) -> bool {
        self.drag_active
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Held result reference; present only while Succeeded.
    pub fn result_reference(&self) -> Option<&ResultReference> {
        match &self.status {
            WorkflowStatus::Succeeded { reference } => Some(reference),
            _ => None,
        }
    }

    /// Offer a file from a picker or a drop.
    ///
    /// Always replaces the previous selection, never merges.
    pub fn accept_candidate(&mut self, file: Option<CandidateFile>) -> AcceptOutcome {
        let Some(file) = file else {
            return AcceptOutcome::Empty;
        };

        if self.status.is_submitting() {
            return AcceptOutcome::Busy;
        }

        match SelectedFile::try_from(file) {
            Ok(selected) => {
                self.selected = Some(Arc::new(selected));
                self.status = WorkflowStatus::Ready;
                self.notice = None;
            }
            Err(rejected) => {
                self.selected = None;
                self.status = WorkflowStatus::FileRejected {
                    reason: INVALID_FILE_TYPE.to_string(),
                };
                self.notice = Some(Notice::error(INVALID_FILE_TYPE));
                return AcceptOutcome::Rejected { media_type: rejected.media_type };
            }
        }

        AcceptOutcome::Accepted
    }

    pub fn begin_drag_over(&mut self) {
        self.drag_active = true;
    }

    pub fn end_drag_over(&mut self) {
        self.drag_active = false;
    }

    /// Enter Submitting and hand out a ticket for the request.
    ///
    /// From Failed the selection is still held, so the workflow passes
    /// back through Ready before submitting again.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, SubmitRefusal> {
        let retry = match &self.status {
            WorkflowStatus::Submitting => return Err(SubmitRefusal::InFlight),
            WorkflowStatus::Succeeded { .. } => return Err(SubmitRefusal::AlreadySucceeded),
            WorkflowStatus::Failed { .. } => self.selected.is_some(),
            _ => false,
        };
        if retry {
            self.status = WorkflowStatus::Ready;
        }

        let file = match (&self.status, &self.selected) {
            (WorkflowStatus::Ready, Some(file)) => Arc::clone(file),
            _ => {
                self.notice = Some(Notice::error(NO_FILE_SELECTED));
                return Err(SubmitRefusal::NoFileSelected);
            }
        };

        self.generation += 1;
        self.status = WorkflowStatus::Submitting;
        self.notice = None;

        Ok(SubmitTicket {
            generation: self.generation,
            file,
        })
    }

    /// Apply the outcome of the request issued for `generation`.
    pub fn complete_submit(
        &mut self,
        generation: u64,
        result: &Result<UploadReceipt, ServiceError>,
    ) -> Completion {
        if generation != self.generation || !self.status.is_submitting() {
            return Completion::Stale;
        }

        match result {
            Ok(receipt) => {
                let text = receipt
                    .message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string());
                self.status = WorkflowStatus::Succeeded {
                    reference: receipt.reference.clone(),
                };
                self.notice = Some(Notice::success(text));
            }
            Err(err) => {
                let reason = err.user_message();
                let kind = if err.is_transport() {
                    FailureKind::Transport
                } else if err.is_local() {
                    FailureKind::Local
                } else {
                    FailureKind::Service
                };
                self.status = WorkflowStatus::Failed {
                    reason: reason.clone(),
                    kind,
                };
                self.notice = Some(Notice::error(reason));
            }
        }

        Completion::Applied
    }

    /// Leave Submitting when the request for `generation` was abandoned
    /// without an outcome. The selection is kept so a retry is possible.
    pub fn abandon_submit(&mut self, generation: u64) -> Completion {
        if generation != self.generation || !self.status.is_submitting() {
            return Completion::Stale;
        }

        self.status = WorkflowStatus::Failed {
            reason: SUBMIT_CANCELLED.to_string(),
            kind: FailureKind::Cancelled,
        };
        self.notice = Some(Notice::error(SUBMIT_CANCELLED));

        Completion::Applied
    }

    /// Back to Idle with nothing held. Any request still running becomes stale.
    pub fn reset(&mut self) {
        self.status = WorkflowStatus::Idle;
        self.selected = None;
        self.drag_active = false;
        self.notice = None;
        self.generation += 1;
    }
}
