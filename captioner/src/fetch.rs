use std::path::PathBuf;
use std::sync::Arc;

use futures_util::{pin_mut, TryStreamExt};
use tracing::{info, warn};

use crate::artifacts::ArtifactStore;
use crate::config::PipelineOptions;
use crate::enumerate::CompletedJobs;
use crate::error::Result;
use crate::remote::{Downloader, Probe, RemoteError, TranscriptionService};

/// What happened to one completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded(PathBuf),
    AlreadyDownloaded,
    /// The job vanished or reports no transcript location.
    NoTranscript,
    /// The transcript URL answered with a non-success status.
    HttpFailed { status: u16, url: String },
    /// Anything else item-specific: unusable id, transport error, non-JSON body.
    Failed(String),
}

impl FetchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FetchOutcome::NoTranscript | FetchOutcome::HttpFailed { .. } | FetchOutcome::Failed(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Downloads each completed job's transcript into `results/` exactly once.
pub struct TranscriptFetcher {
    service: Arc<dyn TranscriptionService>,
    downloader: Arc<dyn Downloader>,
    artifacts: ArtifactStore,
    options: PipelineOptions,
}

impl TranscriptFetcher {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        downloader: Arc<dyn Downloader>,
        options: &PipelineOptions,
    ) -> Self {
        Self {
            service,
            downloader,
            artifacts: ArtifactStore::new(&options.results_dir, &options.webvtt_dir),
            options: options.clone(),
        }
    }

    /// Fetch one job's transcript unless it's already on disk.
    ///
    /// Job lookup errors are fatal; HTTP and payload problems are outcomes.
    pub async fn fetch_job(&self, job_name: &str) -> Result<FetchOutcome> {
        let dest = match self.artifacts.result_path(job_name) {
            Ok(path) => path,
            Err(e) => {
                warn!(job_name, "{e}");
                return Ok(FetchOutcome::Failed(e.to_string()));
            }
        };
        if dest.exists() {
            return Ok(FetchOutcome::AlreadyDownloaded);
        }

        let job = match self.service.get_job(job_name).await? {
            Probe::Found(job) => job,
            Probe::NotFound => {
                warn!(job_name, "completed job disappeared before retrieval");
                return Ok(FetchOutcome::NoTranscript);
            }
        };
        let Some(url) = job.transcript_uri else {
            warn!(job_name, status = %job.status, "job has no transcript location");
            return Ok(FetchOutcome::NoTranscript);
        };

        info!(job_name, dest = %dest.display(), "retrieving transcript");
        let body = match self.downloader.fetch(&url).await {
            Ok(body) => body,
            Err(RemoteError::HttpStatus { status, reason }) => {
                warn!(job_name, status, %reason, %url, "transcript request failed");
                return Ok(FetchOutcome::HttpFailed { status, url });
            }
            Err(e) => {
                warn!(job_name, %url, error = %e, "transcript request failed");
                return Ok(FetchOutcome::Failed(e.to_string()));
            }
        };

        if let Err(e) = serde_json::from_slice::<serde_json::Value>(&body) {
            warn!(job_name, %url, error = %e, "transcript is not JSON; not saving");
            return Ok(FetchOutcome::Failed(format!("invalid transcript JSON: {e}")));
        }

        let path = self.artifacts.write_result(job_name, &body)?;
        Ok(FetchOutcome::Downloaded(path))
    }

    /// Enumerate every completed job and fetch the ones not yet on disk.
    pub async fn fetch_completed(&self) -> Result<FetchSummary> {
        let jobs = CompletedJobs::new(self.service.clone())
            .with_policy(self.options.list_policy)
            .into_stream();
        pin_mut!(jobs);

        let mut summary = FetchSummary::default();
        while let Some(job_name) = jobs.try_next().await? {
            match self.fetch_job(&job_name).await? {
                FetchOutcome::Downloaded(_) => summary.downloaded += 1,
                FetchOutcome::AlreadyDownloaded => summary.skipped += 1,
                _ => summary.failed += 1,
            }
        }

        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "retrieval pass complete"
        );
        Ok(summary)
    }
}
