use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::artifacts::ArtifactStore;
use crate::backoff::{retry_throttled, RetryPolicy};
use crate::config::{Language, MediaFormat, PipelineOptions};
use crate::error::{Error, Result};
use crate::manifest::ManifestLine;
use crate::remote::{BlobStore, Downloader, Probe, TranscriptionService};
use crate::types::{JobStatus, ManifestItem, StartJobRequest};
use crate::upload::{media_extension, object_key, UploadDeduplicator};

/// What happened to one manifest item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { media_uri: String },
    /// The id can't name a local artifact.
    InvalidItemId(String),
    /// A transcript is already on disk.
    AlreadyTranscribed,
    UnsupportedLanguage(String),
    UnsupportedFormat(String),
    /// A job with this name exists remotely, in any state.
    JobExists(JobStatus),
    UploadFailed(String),
    /// Submission stayed throttled for every attempt; retry on a later run.
    GaveUp { attempts: u32 },
}

impl SubmitOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted { .. })
    }

    /// Item left unprocessed because something went wrong (as opposed to a
    /// deliberate skip).
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SubmitOutcome::InvalidItemId(_)
                | SubmitOutcome::UploadFailed(_)
                | SubmitOutcome::GaveUp { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub malformed: usize,
}

/// Queues manifest items for transcription, once per item id.
pub struct JobSubmitter {
    service: Arc<dyn TranscriptionService>,
    store: Arc<dyn BlobStore>,
    uploader: UploadDeduplicator,
    artifacts: ArtifactStore,
    vocabulary_name: Option<String>,
    policy: RetryPolicy,
    item_delay: Duration,
}

impl JobSubmitter {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        store: Arc<dyn BlobStore>,
        downloader: Arc<dyn Downloader>,
        options: &PipelineOptions,
    ) -> Self {
        Self {
            service,
            uploader: UploadDeduplicator::new(store.clone(), downloader),
            store,
            artifacts: ArtifactStore::new(&options.results_dir, &options.webvtt_dir),
            vocabulary_name: options.vocabulary_name.clone(),
            policy: options.submit_policy,
            item_delay: options.item_delay,
        }
    }

    /// Upload and submit one item unless it's already done, unsupported, or
    /// already known to the service.
    ///
    /// Returns `Err` only for fatal conditions; everything item-specific is an
    /// outcome.
    pub async fn submit_item(&self, item: &ManifestItem) -> Result<SubmitOutcome> {
        let item_id = item.item_id.as_str();

        match self.artifacts.has_result(item_id) {
            Ok(true) => {
                info!(item_id, "skipping completed item");
                return Ok(SubmitOutcome::AlreadyTranscribed);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(item_id, "{e}");
                return Ok(SubmitOutcome::InvalidItemId(item_id.to_string()));
            }
        }

        let language = match Language::new(&item.language) {
            Ok(language) => language,
            Err(e) => {
                warn!(item_id, "{e}");
                return Ok(SubmitOutcome::UnsupportedLanguage(item.language.clone()));
            }
        };

        let extension = media_extension(&item.media_master_url).unwrap_or_default();
        let format = match MediaFormat::from_extension(&extension) {
            Ok(format) => format,
            Err(e) => {
                warn!(item_id, "{e}");
                return Ok(SubmitOutcome::UnsupportedFormat(extension));
            }
        };

        match self.service.get_job(item_id).await {
            Ok(Probe::Found(job)) => {
                info!(item_id, status = %job.status, "not reprocessing existing job");
                return Ok(SubmitOutcome::JobExists(job.status));
            }
            Ok(Probe::NotFound) => {}
            // The service doesn't reliably distinguish "no such job" from other
            // lookup failures, so any failure falls through to submission. A
            // transient lookup error can therefore double-submit.
            Err(e) => {
                warn!(item_id, error = %e, "job lookup failed; treating as not found");
            }
        }

        let key = object_key(item_id, format.as_str());
        info!(item_id, title = %item.title, %key, "uploading");

        if let Err(e) = self
            .uploader
            .ensure_uploaded(&item.media_master_url, &key)
            .await
        {
            warn!(item_id, url = %item.media_master_url, error = %e, "unable to upload");
            return Ok(SubmitOutcome::UploadFailed(e.to_string()));
        }

        let media_uri = self.store.object_url(&key);
        info!(item_id, %media_uri, "transcribing");

        let request = StartJobRequest {
            job_name: item_id.to_string(),
            media_uri: media_uri.clone(),
            media_format: format,
            language_code: language.code().to_string(),
            vocabulary_name: self.vocabulary_name.clone(),
        };

        let (service, request) = (&self.service, &request);
        match retry_throttled(self.policy, "start transcription job", move || {
            service.start_job(request)
        })
        .await
        {
            Ok(()) => Ok(SubmitOutcome::Submitted { media_uri }),
            Err(Error::RetriesExhausted { attempts }) => {
                warn!(item_id, attempts, "unable to submit; leaving for a later run");
                Ok(SubmitOutcome::GaveUp { attempts })
            }
            Err(e) => Err(e),
        }
    }

    /// Process every manifest line in order, pausing between lines.
    pub async fn submit_all(&self, lines: Vec<ManifestLine>) -> Result<SubmitSummary> {
        let mut summary = SubmitSummary::default();

        for line in lines {
            match line {
                Err(malformed) => {
                    warn!("skipping {malformed}");
                    summary.malformed += 1;
                }
                Ok(item) => {
                    let outcome = self.submit_item(&item).await?;
                    if outcome.is_submitted() {
                        summary.submitted += 1;
                    } else if outcome.is_failure() {
                        summary.failed += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
            }
            tokio::time::sleep(self.item_delay).await;
        }

        info!(
            submitted = summary.submitted,
            skipped = summary.skipped,
            failed = summary.failed,
            malformed = summary.malformed,
            "submission pass complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::manifest::parse_manifest;
    use crate::remote::RemoteError;
    use crate::testing::{FakeBlobStore, FakeDownloader, FakeTranscriptionService};

    const MEDIA: &str = "https://media.example.com/master/abc.MP3";

    struct Harness {
        service: Arc<FakeTranscriptionService>,
        store: Arc<FakeBlobStore>,
        downloader: Arc<FakeDownloader>,
        submitter: JobSubmitter,
        _dir: tempfile::TempDir,
        artifacts: ArtifactStore,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let options = PipelineOptions::new()
            .results_dir(dir.path().join("results"))
            .webvtt_dir(dir.path().join("webvtt"))
            .item_delay(Duration::ZERO);
        let service = Arc::new(FakeTranscriptionService::default());
        let store = Arc::new(FakeBlobStore::default());
        let downloader = Arc::new(FakeDownloader::default());
        downloader.serve(MEDIA, b"audio", Some("audio/mpeg"));
        let submitter =
            JobSubmitter::new(service.clone(), store.clone(), downloader.clone(), &options);
        Harness {
            service,
            store,
            downloader,
            submitter,
            artifacts: ArtifactStore::new(&options.results_dir, &options.webvtt_dir),
            _dir: dir,
        }
    }

    fn item(language: &str, media: &str) -> ManifestItem {
        ManifestItem {
            item_id: "abc".into(),
            language: language.into(),
            title: "A Title".into(),
            item_url: "https://example.com/item/abc".into(),
            media_master_url: media.into(),
            media_stream_url: media.into(),
        }
    }

    #[tokio::test]
    async fn test_submits_new_item() {
        let h = harness();

        let outcome = h.submitter.submit_item(&item("english", MEDIA)).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Submitted {
                media_uri: "https://s3.test.example/media-bucket/abc.mp3".into()
            }
        );

        let started = h.service.started.lock().unwrap().clone();
        assert_eq!(started.len(), 1);
        let request = &started[0];
        assert_eq!(request.job_name, "abc");
        assert_eq!(request.media_format, MediaFormat::Mp3);
        assert_eq!(request.language_code, "en-US");
        assert_eq!(request.vocabulary_name.as_deref(), Some("LCCoreTerms"));
        assert_eq!(request.media_uri, "https://s3.test.example/media-bucket/abc.mp3");
        assert_eq!(h.store.object("abc.mp3").unwrap().1, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_submitting_twice_creates_one_job() {
        let h = harness();
        let item = item("spanish", MEDIA);

        h.submitter.submit_item(&item).await.unwrap();
        let second = h.submitter.submit_item(&item).await.unwrap();

        assert_eq!(second, SubmitOutcome::JobExists(JobStatus::Queued));
        assert_eq!(h.service.started_names(), ["abc"]);
        assert_eq!(*h.service.start_calls.lock().unwrap(), 1);
        assert_eq!(h.store.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_result_skips_everything() {
        let h = harness();
        h.artifacts.write_result("abc", b"{}").unwrap();

        let outcome = h.submitter.submit_item(&item("english", MEDIA)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::AlreadyTranscribed);
        assert_eq!(*h.service.start_calls.lock().unwrap(), 0);
        assert!(h.store.head_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_like_item_id_is_rejected() {
        let h = harness();
        let mut item = item("english", MEDIA);
        item.item_id = "../escape".into();

        let outcome = h.submitter.submit_item(&item).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::InvalidItemId("../escape".into()));
        assert!(outcome.is_failure());
        assert_eq!(*h.service.start_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let h = harness();
        let outcome = h.submitter.submit_item(&item("german", MEDIA)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::UnsupportedLanguage("german".into()));
        assert_eq!(*h.service.start_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let h = harness();
        let outcome = h
            .submitter
            .submit_item(&item("english", "https://media.example.com/abc.ogg"))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::UnsupportedFormat("ogg".into()));
        assert!(h.store.head_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_job_in_any_state_is_not_resubmitted() {
        for status in [JobStatus::InProgress, JobStatus::Completed, JobStatus::Failed] {
            let h = harness();
            h.service.add_job("abc", status, None);

            let outcome = h.submitter.submit_item(&item("english", MEDIA)).await.unwrap();
            assert_eq!(outcome, SubmitOutcome::JobExists(status));
            assert_eq!(*h.service.start_calls.lock().unwrap(), 0);
            assert_eq!(h.store.upload_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_proceeds_to_submit() {
        let h = harness();
        *h.service.get_job_fails.lock().unwrap() = true;

        let outcome = h.submitter.submit_item(&item("english", MEDIA)).await.unwrap();
        assert!(outcome.is_submitted());
    }

    #[tokio::test]
    async fn test_upload_failure_is_per_item() {
        let h = harness();
        h.downloader.fail(MEDIA, 403);

        let outcome = h.submitter.submit_item(&item("english", MEDIA)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::UploadFailed(ref m) if m.contains("403")));
        assert!(outcome.is_failure());
        assert_eq!(*h.service.start_calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_submission_retries_then_succeeds() {
        let h = harness();
        {
            let mut failures = h.service.start_failures.lock().unwrap();
            failures.push_back(RemoteError::service("ThrottlingException", "slow"));
            failures.push_back(RemoteError::service("ThrottlingException", "slow"));
        }
        let start = Instant::now();

        let outcome = h.submitter.submit_item(&item("english", MEDIA)).await.unwrap();
        assert!(outcome.is_submitted());
        assert_eq!(*h.service.start_calls.lock().unwrap(), 3);
        // 1s after the first throttle, 6s after the second
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_throttling_gives_up_after_30_attempts() {
        let h = harness();
        *h.service.throttle_starts_forever.lock().unwrap() = true;

        let outcome = h.submitter.submit_item(&item("english", MEDIA)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::GaveUp { attempts: 30 });
        assert_eq!(*h.service.start_calls.lock().unwrap(), 30);
    }

    #[tokio::test]
    async fn test_non_throttling_submission_error_is_fatal() {
        let h = harness();
        h.service
            .start_failures
            .lock()
            .unwrap()
            .push_back(RemoteError::service("BadRequestException", "bad vocabulary"));

        let result = h.submitter.submit_item(&item("english", MEDIA)).await;
        assert!(matches!(result, Err(Error::Remote(RemoteError::Service { .. }))));
        assert_eq!(*h.service.start_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_all_tallies_outcomes() {
        let h = harness();
        h.downloader
            .serve("https://media.example.com/def.wav", b"wav", Some("audio/wav"));
        let manifest = format!(
            "abc\tenglish\tOne\thttps://example.com/abc\t{MEDIA}\n\
             only\tthree\tfields\n\
             def\tspanish\tTwo\thttps://example.com/def\thttps://media.example.com/def.wav\n\
             ghi\tfrench\tThree\thttps://example.com/ghi\thttps://media.example.com/ghi.mp3\n"
        );

        let summary = h.submitter.submit_all(parse_manifest(&manifest)).await.unwrap();
        assert_eq!(
            summary,
            SubmitSummary {
                submitted: 2,
                skipped: 1,
                failed: 0,
                malformed: 1,
            }
        );
        assert_eq!(h.service.started_names(), ["abc", "def"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_all_pauses_between_lines() {
        let dir = tempfile::tempdir().unwrap();
        let options = PipelineOptions::new()
            .results_dir(dir.path().join("results"))
            .item_delay(Duration::from_millis(500));
        let submitter = JobSubmitter::new(
            Arc::new(FakeTranscriptionService::default()),
            Arc::new(FakeBlobStore::default()),
            Arc::new(FakeDownloader::default()),
            &options,
        );
        let manifest = "a\tklingon\tT\tu\thttps://m.example/a.mp3\n\
                        b\tklingon\tT\tu\thttps://m.example/b.mp3\n\
                        bad\n";
        let start = Instant::now();

        let summary = submitter.submit_all(parse_manifest(manifest)).await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.malformed, 1);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }
}
