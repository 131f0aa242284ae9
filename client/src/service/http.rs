//! HTTP client for the processing service.
//!
//! # Endpoints
//!
//! | Method | Path                          | Description                    |
//! |--------|-------------------------------|--------------------------------|
//! | POST   | `/api/upload`                 | Upload CSV for processing      |
//! | GET    | `/api/download/{reference}`   | Fetch the processed artifact   |
//! | GET    | `/api/health`                 | Health check                   |

use futures::future::BoxFuture;
use futures::FutureExt as _;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};

use super::ProcessingService;
use crate::config::{ClientConfig, UPLOAD_FIELD};
use crate::error::{ConfigError, ConfigResult, ServiceError, ServiceResult};
use crate::types::{
    ErrorBody, FileBody, HealthStatus, ResultReference, SelectedFile, UploadReceipt, UploadResponse,
};

/// reqwest-backed [`ProcessingService`].
#[derive(Debug, Clone)]
pub struct HttpProcessingService {
    client: Client,
    config: ClientConfig,
}

impl HttpProcessingService {
    /// Build a client for `config`, applying its timeout to every request.
    pub fn new(config: ClientConfig) -> ConfigResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared reqwest client, reused by the download agent.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    async fn upload_file(&self, file: &SelectedFile) -> ServiceResult<UploadReceipt> {
        let bytes = match &file.body {
            FileBody::Bytes(bytes) => bytes.clone(),
            FileBody::Path(path) => tokio::fs::read(path).await.map_err(|source| ServiceError::FileRead {
                name: file.name.clone(),
                source,
            })?,
        };

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| ServiceError::FileRead {
                name: file.name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        log::debug!("POST {} ({} bytes)", self.config.upload_url(), file.size_bytes);

        let response = self
            .client
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await?;

        parse_upload_response(response).await
    }

    async fn fetch_health(&self) -> ServiceResult<HealthStatus> {
        let response = self.client.get(self.config.health_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response).await);
        }

        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("Failed to parse health response: {}", e)))
    }
}

impl ProcessingService for HttpProcessingService {
    fn upload<'a>(&'a self, file: &'a SelectedFile) -> BoxFuture<'a, ServiceResult<UploadReceipt>> {
        self.upload_file(file).boxed()
    }

    fn download_url(&self, reference: &ResultReference) -> String {
        download_url(&self.config.base_url, reference)
    }

    fn health(&self) -> BoxFuture<'_, ServiceResult<HealthStatus>> {
        self.fetch_health().boxed()
    }
}

/// `{base}/api/download/{reference}`, with the reference encoded as a
/// single path segment.
pub fn download_url(base_url: &str, reference: &ResultReference) -> String {
    match Url::parse(base_url) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments
                    .pop_if_empty()
                    .extend(["api", "download", reference.as_str()]);
            }
            url.to_string()
        }
        Err(_) => format!("{}/api/download/{}", base_url.trim_end_matches('/'), reference),
    }
}

/// Classify an upload response.
async fn parse_upload_response(response: Response) -> ServiceResult<UploadReceipt> {
    if !response.status().is_success() {
        return Err(rejection(response).await);
    }

    // A body that is not the expected JSON still counts as a service answer.
    let body: UploadResponse = response
        .json()
        .await
        .map_err(|e| ServiceError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    match body.download_filename {
        Some(name) if !name.trim().is_empty() => Ok(UploadReceipt {
            reference: ResultReference::new(name),
            message: body.message.filter(|m| !m.trim().is_empty()),
        }),
        _ => Err(ServiceError::InvalidResponse(
            "response is missing download_filename".to_string(),
        )),
    }
}

/// Turn a non-2xx response into [`ServiceError::Rejected`], keeping the
/// service's `error` text when the body carries one.
async fn rejection(response: Response) -> ServiceError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.error)
        .filter(|m| !m.trim().is_empty());

    ServiceError::Rejected { status, message }
}
