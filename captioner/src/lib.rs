//! Batch captioning pipeline: media manifest in, remote ASR jobs, WebVTT out.
//!
//! **captioner** moves media items through a rate-limited, eventually
//! consistent transcription service without ever doing the same work twice:
//! source media is uploaded to blob storage once per item, one job is
//! submitted per item id, each completed transcript is downloaded once, and
//! each transcript is segmented into subtitle cues once. Every stage
//! re-derives its progress from durable state, so any run can be interrupted
//! and repeated.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> captioner::Result<()> {
//! use captioner::PipelineOptions;
//!
//! let options = PipelineOptions::default();
//!
//! // Queue every item in a manifest (requires the "aws" feature, on by default)
//! captioner::transcribe_manifests(&["items.tsv"], "my-media-bucket", "us-east-1", &options).await?;
//!
//! // Later: pull down whatever has finished and caption it
//! captioner::download_transcripts("us-east-1", &options).await?;
//! captioner::convert_results(&options)?;
//! # Ok(())
//! # }
//! ```
//!
//! Remote systems sit behind the [`remote`] traits, so every component can be
//! driven by in-memory fakes.

#[cfg(feature = "aws")]
pub mod aws;
pub mod artifacts;
pub mod backoff;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod fetch;
pub mod http;
pub mod index;
pub mod manifest;
pub mod remote;
pub mod segment;
pub mod submit;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use artifacts::ArtifactStore;
pub use backoff::RetryPolicy;
pub use config::{Language, MediaFormat, PipelineOptions};
pub use enumerate::CompletedJobs;
pub use error::{Error, Result};
pub use fetch::{FetchOutcome, FetchSummary, TranscriptFetcher};
pub use remote::{BlobStore, Downloader, Probe, RemoteError, TranscriptionService};
pub use segment::{convert_file, segment, ConvertOutcome, ConvertSummary};
pub use submit::{JobSubmitter, SubmitOutcome, SubmitSummary};
pub use types::{Captions, ManifestItem, SubtitleCue};
pub use upload::UploadDeduplicator;

use std::path::{Path, PathBuf};

/// Upload and submit every item listed in `manifests`, in order.
///
/// `bucket` must be readable by the transcription service.
#[cfg(feature = "aws")]
pub async fn transcribe_manifests<P: AsRef<Path>>(
    manifests: &[P],
    bucket: &str,
    region: &str,
    options: &PipelineOptions,
) -> Result<SubmitSummary> {
    use std::sync::Arc;

    let lines = manifest::read_manifests(manifests)?;

    let s3 = aws::s3_client(bucket, region)?;
    let service = Arc::new(aws::TranscribeClient::new(s3.credentials().clone(), region)?);
    let store = Arc::new(aws::S3BlobStore::from_client(s3, bucket, region));
    let downloader = Arc::new(http::HttpDownloader::new()?);

    JobSubmitter::new(service, store, downloader, options)
        .submit_all(lines)
        .await
}

/// Download every completed transcript that isn't already in `results/`.
#[cfg(feature = "aws")]
pub async fn download_transcripts(region: &str, options: &PipelineOptions) -> Result<FetchSummary> {
    use std::sync::Arc;

    let credentials = aws::default_credentials(region)?;
    let service = Arc::new(aws::TranscribeClient::new(credentials, region)?);
    let downloader = Arc::new(http::HttpDownloader::new()?.progress(false));

    TranscriptFetcher::new(service, downloader, options)
        .fetch_completed()
        .await
}

/// Convert the given transcript files into `webvtt_dir`.
pub fn convert_transcripts<P: AsRef<Path>>(inputs: &[P], options: &PipelineOptions) -> ConvertSummary {
    let artifacts = ArtifactStore::new(&options.results_dir, &options.webvtt_dir);
    segment::convert_files(inputs, &artifacts)
}

/// Convert every `*.json` in the results directory that has no subtitle yet.
pub fn convert_results(options: &PipelineOptions) -> Result<ConvertSummary> {
    let artifacts = ArtifactStore::new(&options.results_dir, &options.webvtt_dir);
    let mut inputs: Vec<PathBuf> = std::fs::read_dir(artifacts.results_dir())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    inputs.sort();
    Ok(segment::convert_files(&inputs, &artifacts))
}

/// Write `index.json` for every manifest item that has a downloaded transcript.
pub fn index_manifests<P: AsRef<Path>>(manifests: &[P], options: &PipelineOptions) -> Result<usize> {
    let items = manifest::valid_items(manifest::read_manifests(manifests)?);
    let artifacts = ArtifactStore::new(&options.results_dir, &options.webvtt_dir);
    index::write_index(&items, &artifacts, &options.index_path)
}
