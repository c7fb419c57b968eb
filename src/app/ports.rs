use crate::domain::bag::DocumentBag;
use crate::domain::batch::DocumentBatch;
use crate::domain::parties::Certificate;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Issues the session token the upload service expects in its `TOKEN` cookie.
/// Caching and refreshing are the implementation's business.
#[async_trait]
pub trait TokenManagerPort: Send + Sync {
    async fn get_token(&self, certificate: &Certificate) -> Result<String, String>;
}

/// Optional payload compression. A failure is never fatal to a submission.
pub trait CompressorPort: Send + Sync {
    fn try_compress(&self, bytes: &[u8]) -> Result<Vec<u8>, String>;
}

/// Creates uniquely named files that are removed when the returned artifact
/// is dropped.
pub trait TemporaryStoragePort: Send + Sync {
    fn create(&self, contents: &[u8], suffix: &str) -> io::Result<UploadArtifact>;
}

/// Sends one multipart upload and returns the raw response body.
/// `Err` means no response was obtained at all.
#[async_trait]
pub trait UploadTransportPort: Send + Sync {
    async fn post(&self, request: &UploadRequest) -> Result<String, String>;
}

/// A batch processing strategy, such as reading one bag per spreadsheet row.
/// Strategies read their settings from the batch's `batch_processor` section.
#[async_trait]
pub trait BatchProcessorPort: Send + Sync {
    async fn process(&self, batch: &DocumentBatch) -> Result<Vec<DocumentBag>, String>;
}

/// A staged payload file. Dropping it deletes the file, so it cannot outlive
/// the submission holding it, whichever way that submission ends.
#[derive(Debug)]
pub struct UploadArtifact {
    path: TempPath,
}

impl UploadArtifact {
    pub fn new(path: TempPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Deletes the file now, reporting failures that a plain drop would hide.
    pub fn close(self) -> io::Result<()> {
        self.path.close()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    /// `{company}_{artifact basename}`.
    pub file_name: String,
    pub mime_type: &'static str,
}

/// Everything the transport needs for one `DTEUpload` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    pub token: String,
    pub rut_sender: String,
    pub dv_sender: String,
    pub rut_company: String,
    pub dv_company: String,
    pub file: UploadFile,
}
