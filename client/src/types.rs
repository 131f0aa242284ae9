//! Common types shared by the controller and the service client.
//!
//! # Categories
//!
//! - **File Types** - Candidate and selected files
//! - **Result Types** - Result references and upload receipts
//! - **API Types** - Processing service wire bodies

use mime_guess::mime::{self, Mime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_MEDIA_TYPE;

// =============================================================================
// File Types
// =============================================================================

/// Where the bytes of a file live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileBody {
    /// A file on disk, read when the upload starts.
    Path(PathBuf),
    /// Contents already in memory (e.g. dropped from another application).
    Bytes(Vec<u8>),
}

/// A raw file handle as handed over by a picker or a drop.
///
/// Nothing is validated yet; see [`SelectedFile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub size_bytes: u64,
    /// Declared media type, e.g. `text/csv`.
    pub media_type: String,
    pub body: FileBody,
}

impl CandidateFile {
    /// Describe a file on disk, deriving its media type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            media_type: media_type_for_path(path).to_string(),
            body: FileBody::Path(path.to_path_buf()),
        })
    }

    /// Build an in-memory candidate with an explicit media type.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            media_type: media_type.into(),
            body: FileBody::Bytes(bytes),
        }
    }

    /// True when the declared media type is a well-formed `text/csv`.
    ///
    /// Parameters such as `; charset=utf-8` and letter case are ignored, but
    /// a value that does not parse as a media type is never a CSV.
    pub fn is_csv(&self) -> bool {
        self.media_type
            .parse::<Mime>()
            .map(|m| m.type_() == mime::TEXT && m.subtype() == mime::CSV)
            .unwrap_or(false)
    }
}

/// Media type guessed from the path's extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MEDIA_TYPE)
}

/// A candidate that passed validation and is held by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
    pub body: FileBody,
}

/// Fails with the candidate handed back when it is not a CSV.
impl TryFrom<CandidateFile> for SelectedFile {
    type Error = CandidateFile;

    fn try_from(file: CandidateFile) -> Result<Self, Self::Error> {
        if !file.is_csv() {
            return Err(file);
        }

        Ok(Self {
            name: file.name,
            size_bytes: file.size_bytes,
            media_type: file.media_type,
            body: file.body,
        })
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// Opaque token naming an artifact held by the processing service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultReference(String);

impl ResultReference {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    pub reference: ResultReference,
    /// Success message supplied by the service, if any.
    pub message: Option<String>,
}

/// Where the user agent should go to fetch a result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub reference: ResultReference,
}

// =============================================================================
// API Types
// =============================================================================

/// Body of a successful `POST /api/upload`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    /// Name of the processed artifact, used verbatim in the download URL.
    #[serde(default)]
    pub download_filename: Option<String>,
}

/// Body of a failed request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `GET /api/health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
