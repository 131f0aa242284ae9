//! Workflow controller.
//!
//! Owns one [`WorkflowState`] behind a mutex and drives the upload through a
//! [`ProcessingService`]. All operations take `&self`, so a controller can be
//! shared (e.g. behind an `Arc`) between whatever delivers user actions.
//! The lock is never held across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::state::{
    AcceptOutcome, Completion, SubmitRefusal, WorkflowState, WorkflowStatus,
};
use crate::config::{ClientConfig, CSV_MEDIA_TYPE, MAX_FILE_SIZE};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{EventBroadcaster, LogEntry};
use crate::service::{HttpProcessingService, ProcessingService};
use crate::types::{CandidateFile, DownloadTarget, ResultReference};

/// What a call to [`WorkflowController::submit`] ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The upload succeeded; the workflow is now Succeeded.
    Succeeded(ResultReference),
    /// Another submit is in flight; no request was sent.
    AlreadyInFlight,
    /// The workflow already holds a result; reset before uploading again.
    AlreadySucceeded,
    /// The request finished after a reset or new selection and was dropped.
    Discarded,
}

/// Upload/process/download controller for one user session.
pub struct WorkflowController<S> {
    id: Uuid,
    service: S,
    state: Mutex<WorkflowState>,
    events: EventBroadcaster,
}

impl WorkflowController<HttpProcessingService> {
    /// Controller talking HTTP to the service described by `config`.
    pub fn from_config(config: ClientConfig) -> WorkflowResult<Self> {
        Ok(Self::new(HttpProcessingService::new(config)?))
    }
}

impl<S: ProcessingService> WorkflowController<S> {
    pub fn new(service: S) -> Self {
        let id = Uuid::new_v4();
        log::debug!("workflow {} created", id);

        Self {
            id,
            service,
            state: Mutex::new(WorkflowState::new()),
            events: EventBroadcaster::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> WorkflowState {
        self.lock().clone()
    }

    pub fn status(&self) -> WorkflowStatus {
        self.lock().status().clone()
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        // Transitions never panic halfway, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a file from a picker. `None` leaves everything as it is.
    ///
    /// Returns [`WorkflowError::InvalidFileType`] when the file is not a CSV;
    /// the rejection is also recorded in the state.
    pub fn accept_candidate(&self, file: Option<CandidateFile>) -> WorkflowResult<()> {
        let name = file.as_ref().map(|f| f.name.clone());
        let size = file.as_ref().map(|f| f.size_bytes).unwrap_or(0);

        let outcome = self.lock().accept_candidate(file);

        match outcome {
            AcceptOutcome::Empty => Ok(()),
            AcceptOutcome::Busy => {
                self.events.log(LogEntry::warning(
                    "Upload in progress, selection ignored",
                ));
                Ok(())
            }
            AcceptOutcome::Rejected { media_type } => {
                self.events.log(LogEntry::error(format!(
                    "Rejected {}: expected {}, got {}",
                    name.unwrap_or_default(),
                    CSV_MEDIA_TYPE,
                    if media_type.is_empty() { "no media type" } else { media_type.as_str() }
                )));
                Err(WorkflowError::InvalidFileType { media_type })
            }
            AcceptOutcome::Accepted => {
                self.events.log(LogEntry::info(format!(
                    "Selected {} ({} bytes)",
                    name.unwrap_or_default(),
                    size
                )));
                if size > MAX_FILE_SIZE {
                    self.events.log(LogEntry::warning(format!(
                        "File is larger than the {} MB limit; the service may refuse it",
                        MAX_FILE_SIZE / (1024 * 1024)
                    )));
                }
                Ok(())
            }
        }
    }

    /// A file dropped on the target: ends the drag, then behaves like
    /// [`accept_candidate`](Self::accept_candidate).
    pub fn drop_candidate(&self, file: Option<CandidateFile>) -> WorkflowResult<()> {
        self.end_drag_over();
        self.accept_candidate(file)
    }

    pub fn begin_drag_over(&self) {
        self.lock().begin_drag_over();
    }

    pub fn end_drag_over(&self) {
        self.lock().end_drag_over();
    }

    /// Upload the selected file and wait for the outcome.
    ///
    /// Single-flight: a call made while another is in flight returns
    /// [`SubmitOutcome::AlreadyInFlight`] without sending anything. Failures
    /// are recorded as `Failed` in the state and also returned as errors.
    pub async fn submit(&self) -> WorkflowResult<SubmitOutcome> {
        let ticket = {
            let mut state = self.lock();
            let attempt = state.begin_submit();
            match attempt {
                Ok(ticket) => ticket,
                Err(SubmitRefusal::InFlight) => {
                    log::debug!("workflow {}: submit ignored, request in flight", self.id);
                    return Ok(SubmitOutcome::AlreadyInFlight);
                }
                Err(SubmitRefusal::AlreadySucceeded) => return Ok(SubmitOutcome::AlreadySucceeded),
                Err(SubmitRefusal::NoFileSelected) => {
                    drop(state);
                    self.events.log(LogEntry::error("Please select a file first"));
                    return Err(WorkflowError::NoFileSelected);
                }
            }
        };

        let mut in_flight = InFlight {
            controller: self,
            generation: ticket.generation,
            armed: true,
        };

        self.events.log(LogEntry::info(format!(
            "📤 Uploading {}...",
            ticket.file.name
        )));

        let result = self.service.upload(&ticket.file).await;

        in_flight.armed = false;
        let completion = self.lock().complete_submit(ticket.generation, &result);
        if completion == Completion::Stale {
            log::debug!(
                "workflow {}: dropped result of request generation {}",
                self.id,
                ticket.generation
            );
            return Ok(SubmitOutcome::Discarded);
        }

        match result {
            Ok(receipt) => {
                self.events.log(LogEntry::success(format!(
                    "Processed, result: {}",
                    receipt.reference
                )));
                Ok(SubmitOutcome::Succeeded(receipt.reference))
            }
            Err(err) => {
                self.events.log(LogEntry::error(format!(
                    "Upload failed: {}",
                    err.user_message()
                )));
                log::debug!("workflow {}: {}", self.id, err);
                Err(err.into())
            }
        }
    }

    /// Where to fetch the result. `None` unless the workflow has Succeeded.
    pub fn request_download(&self) -> Option<DownloadTarget> {
        let reference = self.lock().result_reference().cloned()?;
        let url = self.service.download_url(&reference);

        self.events.log(LogEntry::info(format!("📥 Download: {}", url)));

        Some(DownloadTarget { url, reference })
    }

    /// Back to Idle, clearing selection, result, drag state and notices.
    pub fn reset(&self) {
        let previous = {
            let mut state = self.lock();
            let previous = state.status().name();
            state.reset();
            previous
        };

        log::debug!("workflow {}: reset from {}", self.id, previous);
    }
}

/// Held across the upload await. If the `submit` future is dropped before
/// the outcome is applied, the still-current request is marked as abandoned.
struct InFlight<'a, S: ProcessingService> {
    controller: &'a WorkflowController<S>,
    generation: u64,
    armed: bool,
}

impl<S: ProcessingService> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let completion = self.controller.lock().abandon_submit(self.generation);
        if completion == Completion::Applied {
            self.controller
                .events
                .log(LogEntry::warning("Upload abandoned before the service answered"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{
        ServiceError, ServiceResult, NO_FILE_SELECTED, SERVICE_UNREACHABLE, SUBMIT_CANCELLED,
    };
    use crate::types::{HealthStatus, SelectedFile, UploadReceipt};
    use crate::workflow::{FailureKind, NoticeLevel};
    use futures::future::BoxFuture;
    use futures::FutureExt as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    type Responder = Box<dyn Fn() -> ServiceResult<UploadReceipt> + Send + Sync>;

    /// In-process service: counts uploads and optionally waits for `release()`.
    struct FakeService {
        calls: AtomicUsize,
        gated: bool,
        gate: Notify,
        respond: Responder,
    }

    impl FakeService {
        fn new(respond: impl Fn() -> ServiceResult<UploadReceipt> + Send + Sync + 'static) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gated: false,
                gate: Notify::new(),
                respond: Box::new(respond),
            }
        }

        fn gated(respond: impl Fn() -> ServiceResult<UploadReceipt> + Send + Sync + 'static) -> Self {
            Self { gated: true, ..Self::new(respond) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn release(&self) {
            self.gate.notify_one();
        }
    }

    impl ProcessingService for FakeService {
        fn upload<'a>(&'a self, _file: &'a SelectedFile) -> BoxFuture<'a, ServiceResult<UploadReceipt>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.gated {
                    self.gate.notified().await;
                }
                (self.respond)()
            }
            .boxed()
        }

        fn download_url(&self, reference: &ResultReference) -> String {
            format!("http://service.test/api/download/{}", reference)
        }

        fn health(&self) -> BoxFuture<'_, ServiceResult<HealthStatus>> {
            async { Ok(HealthStatus { status: "ok".into() }) }.boxed()
        }
    }

    fn ok(token: &'static str) -> impl Fn() -> ServiceResult<UploadReceipt> + Send + Sync {
        move || {
            Ok(UploadReceipt {
                reference: ResultReference::new(token),
                message: None,
            })
        }
    }

    fn csv(name: &str) -> Option<CandidateFile> {
        Some(CandidateFile::from_bytes(name, "text/csv", b"Description,Credit\n".to_vec()))
    }

    #[tokio::test]
    async fn test_submit_success_then_download() {
        let controller = WorkflowController::new(FakeService::new(ok("out_123.csv")));
        controller.accept_candidate(csv("statement.csv")).unwrap();

        let outcome = controller.submit().await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Succeeded(ResultReference::new("out_123.csv")));

        let target = controller.request_download().unwrap();
        assert_eq!(target.url, "http://service.test/api/download/out_123.csv");
        assert!(target.url.ends_with("/api/download/out_123.csv"));
        assert_eq!(
            controller.status(),
            WorkflowStatus::Succeeded { reference: ResultReference::new("out_123.csv") }
        );
    }

    #[tokio::test]
    async fn test_submit_without_file_reports_error() {
        let controller = WorkflowController::new(FakeService::new(ok("never.csv")));

        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoFileSelected));
        assert_eq!(controller.service().calls(), 0);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status(), &WorkflowStatus::Idle);
        assert_eq!(snapshot.notice().unwrap().text, NO_FILE_SELECTED);
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_and_retryable() {
        let controller = WorkflowController::new(FakeService::new(|| {
            Err(ServiceError::Transport("connection refused".into()))
        }));
        controller.accept_candidate(csv("a.csv")).unwrap();

        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Service(ServiceError::Transport(_))));
        assert_eq!(
            controller.status(),
            WorkflowStatus::Failed {
                reason: SERVICE_UNREACHABLE.to_string(),
                kind: FailureKind::Transport,
            }
        );
        assert_eq!(controller.snapshot().notice().unwrap().level, NoticeLevel::Error);

        // Retry goes out again with the same file.
        let _ = controller.submit().await;
        assert_eq!(controller.service().calls(), 2);
    }

    #[tokio::test]
    async fn test_double_submit_sends_one_request() {
        let controller = WorkflowController::new(FakeService::gated(ok("out.csv")));
        controller.accept_candidate(csv("a.csv")).unwrap();

        let (first, second, _) = tokio::join!(controller.submit(), controller.submit(), async {
            controller.service().release();
        });

        assert_eq!(first.unwrap(), SubmitOutcome::Succeeded(ResultReference::new("out.csv")));
        assert_eq!(second.unwrap(), SubmitOutcome::AlreadyInFlight);
        assert_eq!(controller.service().calls(), 1);
    }

    #[tokio::test]
    async fn test_dropped_submit_does_not_stay_submitting() {
        let controller = WorkflowController::new(FakeService::gated(ok("out.csv")));
        controller.accept_candidate(csv("a.csv")).unwrap();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), controller.submit()).await;
        assert!(timed_out.is_err());
        assert_eq!(controller.service().calls(), 1);

        assert_eq!(
            controller.status(),
            WorkflowStatus::Failed {
                reason: SUBMIT_CANCELLED.to_string(),
                kind: FailureKind::Cancelled,
            }
        );
        assert_eq!(controller.snapshot().selected_file().unwrap().name, "a.csv");

        // The next submit goes out again instead of reporting AlreadyInFlight.
        controller.service().release();
        let outcome = controller.submit().await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Succeeded(ResultReference::new("out.csv")));
        assert_eq!(controller.service().calls(), 2);
    }

    #[tokio::test]
    async fn test_reset_while_in_flight_discards_result() {
        let controller = Arc::new(WorkflowController::new(FakeService::gated(ok("late.csv"))));
        controller.accept_candidate(csv("a.csv")).unwrap();

        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.submit().await })
        };

        while controller.service().calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(controller.status().is_submitting());

        controller.reset();
        controller.service().release();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, SubmitOutcome::Discarded);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status(), &WorkflowStatus::Idle);
        assert!(snapshot.selected_file().is_none());
        assert!(controller.request_download().is_none());
    }

    #[tokio::test]
    async fn test_selection_is_kept_while_submitting() {
        let controller = Arc::new(WorkflowController::new(FakeService::gated(ok("out.csv"))));
        controller.accept_candidate(csv("first.csv")).unwrap();

        let task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.submit().await })
        };
        while controller.service().calls() == 0 {
            tokio::task::yield_now().await;
        }

        controller.drop_candidate(csv("second.csv")).unwrap();
        assert_eq!(controller.snapshot().selected_file().unwrap().name, "first.csv");

        controller.service().release();
        task.await.unwrap().unwrap();
        assert!(controller.request_download().is_some());
    }

    #[test]
    fn test_invalid_candidate_is_an_error() {
        let controller = WorkflowController::new(FakeService::new(ok("x.csv")));
        let err = controller
            .accept_candidate(Some(CandidateFile::from_bytes("x.xlsx", "application/zip", vec![])))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidFileType { .. }));
        assert!(controller.snapshot().selected_file().is_none());
        assert!(controller.request_download().is_none());
    }

    #[test]
    fn test_drop_ends_drag() {
        let controller = WorkflowController::new(FakeService::new(ok("x.csv")));
        controller.begin_drag_over();
        assert!(controller.snapshot().is_drag_active());
        assert_eq!(controller.status(), WorkflowStatus::Idle);

        controller.drop_candidate(csv("a.csv")).unwrap();
        let snapshot = controller.snapshot();
        assert!(!snapshot.is_drag_active());
        assert_eq!(snapshot.status(), &WorkflowStatus::Ready);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let controller = WorkflowController::new(FakeService::new(ok("out.csv")));
        let mut rx = controller.events().subscribe();

        controller.accept_candidate(csv("a.csv")).unwrap();
        controller.submit().await.unwrap();

        let mut messages = Vec::new();
        while let Ok(entry) = rx.try_recv() {
            messages.push(entry.message);
        }
        assert!(messages.iter().any(|m| m.contains("Selected a.csv")));
        assert!(messages.iter().any(|m| m.contains("out.csv")));
    }
}
