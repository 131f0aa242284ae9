//! Upload/process/download workflow.
//!
//! - [`state`] - The state value and its synchronous transitions
//! - [`controller`] - Mutex-guarded controller driving the network call

pub mod controller;
pub mod state;

pub use controller::{SubmitOutcome, WorkflowController};
pub use state::{
    AcceptOutcome, Completion, FailureKind, Notice, NoticeLevel, SubmitRefusal, SubmitTicket,
    WorkflowState, WorkflowStatus, DEFAULT_SUCCESS_MESSAGE,
};
