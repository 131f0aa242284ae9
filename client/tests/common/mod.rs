//! Stand-in processing service for integration tests.
//!
//! Serves the same routes as the real service with canned answers and
//! records every upload it receives.

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What `POST /api/upload` answers.
#[derive(Clone, Debug)]
pub enum UploadReply {
    /// 200 with a `download_filename`.
    Processed { token: String, message: Option<String> },
    /// Any status with a JSON body.
    Json { status: u16, body: Value },
    /// Any status with a plain-text body.
    Text { status: u16, body: String },
}

impl UploadReply {
    pub fn processed(token: &str) -> Self {
        UploadReply::Processed { token: token.to_string(), message: None }
    }

    pub fn error(status: u16, message: &str) -> Self {
        UploadReply::Json { status, body: json!({ "error": message }) }
    }
}

/// One multipart upload as seen by the service.
#[derive(Clone, Debug)]
pub struct ReceivedUpload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

struct StubState {
    reply: UploadReply,
    delay: Duration,
    artifact: Vec<u8>,
    uploads: AtomicUsize,
    received: Mutex<Vec<ReceivedUpload>>,
}

/// A running stub bound to an ephemeral local port.
pub struct StubService {
    pub base_url: String,
    state: Arc<StubState>,
}

impl StubService {
    pub async fn start(reply: UploadReply) -> Self {
        Self::start_with_delay(reply, Duration::ZERO).await
    }

    pub async fn start_with_delay(reply: UploadReply, delay: Duration) -> Self {
        let state = Arc::new(StubState {
            reply,
            delay,
            artifact: b"S.NO,PHONE PAY,SWIPE,CASH,TOTAL\nTOTAL,10.0,0,0,10.0\n".to_vec(),
            uploads: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/upload", post(upload))
            .route("/api/download/{reference}", get(download))
            .route("/api/health", get(health))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Number of upload requests that reached the service.
    pub fn upload_count(&self) -> usize {
        self.state.uploads.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<ReceivedUpload> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn artifact(&self) -> &[u8] {
        &self.state.artifact
    }
}

/// A base URL nothing is listening on.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn upload(State(stub): State<Arc<StubState>>, mut multipart: Multipart) -> Response {
    stub.uploads.fetch_add(1, Ordering::SeqCst);

    while let Some(field) = multipart.next_field().await.unwrap() {
        let received = ReceivedUpload {
            field: field.name().unwrap_or("").to_string(),
            file_name: field.file_name().map(|s| s.to_string()),
            content_type: field.content_type().map(|s| s.to_string()),
            bytes: field.bytes().await.unwrap().to_vec(),
        };
        stub.received.lock().unwrap().push(received);
    }

    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }

    match &stub.reply {
        UploadReply::Processed { token, message } => Json(json!({
            "message": message,
            "download_filename": token,
        }))
        .into_response(),
        UploadReply::Json { status, body } => {
            (StatusCode::from_u16(*status).unwrap(), Json(body.clone())).into_response()
        }
        UploadReply::Text { status, body } => {
            (StatusCode::from_u16(*status).unwrap(), body.clone()).into_response()
        }
    }
}

async fn download(State(stub): State<Arc<StubState>>, Path(reference): Path<String>) -> Response {
    let known = matches!(&stub.reply, UploadReply::Processed { token, .. } if *token == reference);

    if !known {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" }))).into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", reference),
            ),
        ],
        stub.artifact.clone(),
    )
        .into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
