//! Seams to the outside world: blob storage, the transcription service, and
//! plain HTTP downloads.
//!
//! Components receive these as `Arc<dyn Trait>` so tests can swap in fakes.

use std::path::Path;

use async_trait::async_trait;

use crate::types::{JobPage, JobStatus, StartJobRequest, TranscriptionJob};

/// Service error codes that mean "slow down and try again".
const THROTTLING_CODES: &[&str] = &[
    "ThrottlingException",
    "LimitExceededException",
    "TooManyRequestsException",
    "SlowDown",
];

/// Failures reported by (or on the way to) a remote system.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("throttled: {0}")]
    Throttled(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("HTTP {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("no AWS credentials: {0}")]
    Credentials(String),

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Build a service error, classifying rate-limit codes as throttling.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        if THROTTLING_CODES.contains(&code.as_str()) {
            RemoteError::Throttled(format!("{code}: {message}"))
        } else {
            RemoteError::Service { code, message }
        }
    }

    pub fn is_throttling(&self) -> bool {
        match self {
            RemoteError::Throttled(_) => true,
            RemoteError::HttpStatus { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// Outcome of an existence check. Errors travel separately in the `Result`,
/// so "absent" is never confused with "couldn't tell".
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Found(T),
    NotFound,
}

/// Metadata returned by a blob-store existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: u64,
}

/// A single bucket of durable object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Metadata-only existence check.
    async fn head(&self, key: &str) -> Result<Probe<ObjectInfo>, RemoteError>;

    /// Upload a local file under `key` with the given content type.
    async fn upload_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), RemoteError>;

    /// Canonical URL the transcription service uses to read `key`.
    fn object_url(&self, key: &str) -> String;
}

/// The remote speech-to-text service.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn get_job(&self, job_name: &str) -> Result<Probe<TranscriptionJob>, RemoteError>;

    async fn start_job(&self, request: &StartJobRequest) -> Result<(), RemoteError>;

    /// Fetch one page of jobs in `status`. `next_token` is `None` for the first page.
    async fn list_jobs(
        &self,
        status: JobStatus,
        next_token: Option<&str>,
    ) -> Result<JobPage, RemoteError>;
}

/// Plain HTTP GETs for source media and transcript payloads.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Stream `url` into the file at `dest`, returning its declared content type.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<Option<String>, RemoteError>;

    /// Fetch `url` into memory.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RemoteError>;
}
