//! Download agent.
//!
//! Plays the user agent's part once the workflow has a result: follows a
//! [`DownloadTarget`] and streams the artifact into a local directory.

use futures::StreamExt as _;
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt as _;

use crate::error::{DownloadError, DownloadResult};
use crate::service::HttpProcessingService;
use crate::types::{DownloadTarget, ErrorBody, ResultReference};

/// Fetches result artifacts into `output_dir`.
#[derive(Debug, Clone)]
pub struct DownloadAgent {
    client: Client,
    output_dir: PathBuf,
}

impl DownloadAgent {
    pub fn new(client: Client, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
        }
    }

    /// Agent sharing the service's HTTP client (and its timeout).
    pub fn for_service(service: &HttpProcessingService, output_dir: impl Into<PathBuf>) -> Self {
        Self::new(service.http_client().clone(), output_dir)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fetch `target` and return the path it was written to.
    ///
    /// The artifact is saved under its reference name. It is first written
    /// to a `.part` file so an interrupted download never leaves a
    /// truncated result behind.
    pub async fn follow(&self, target: &DownloadTarget) -> DownloadResult<PathBuf> {
        let file_name = local_file_name(&target.reference)?;

        let response = self.client.get(&target.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.error);
            return Err(DownloadError::Status {
                status: status.as_u16(),
                message,
            });
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let destination = self.output_dir.join(file_name);
        let partial = self.output_dir.join(format!("{}.part", file_name));

        let written = match save(response, &partial, &destination).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        log::info!("saved {} ({} bytes)", destination.display(), written);

        Ok(destination)
    }
}

/// Stream the body into `partial`, then move it to `destination`.
async fn save(response: Response, partial: &Path, destination: &Path) -> DownloadResult<u64> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(partial, destination).await?;

    Ok(written)
}

/// The reference as a bare file name; anything that could escape the
/// output directory is refused.
fn local_file_name(reference: &ResultReference) -> DownloadResult<&str> {
    let name = reference.as_str();

    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if unsafe_name {
        return Err(DownloadError::InvalidReference(name.to_string()));
    }

    Ok(name)
}
