//! In-memory stand-ins for the remote seams, recording every call.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::remote::{BlobStore, Downloader, ObjectInfo, Probe, RemoteError};
use crate::types::{JobPage, JobStatus, StartJobRequest, TranscriptionJob};

#[derive(Default)]
pub struct FakeBlobStore {
    pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub head_calls: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<String>>,
    /// When set, `head` fails with this storage error.
    pub head_error: Mutex<Option<String>>,
}

impl FakeBlobStore {
    pub fn with_object(key: &str) -> Self {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (b"existing".to_vec(), "audio/mpeg".into()));
        store
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn head(&self, key: &str) -> Result<Probe<ObjectInfo>, RemoteError> {
        self.head_calls.lock().unwrap().push(key.to_string());
        if let Some(msg) = self.head_error.lock().unwrap().clone() {
            return Err(RemoteError::Storage(msg));
        }
        Ok(match self.objects.lock().unwrap().get(key) {
            Some((body, _)) => Probe::Found(ObjectInfo {
                size: body.len() as u64,
            }),
            None => Probe::NotFound,
        })
    }

    async fn upload_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), RemoteError> {
        let body = tokio::fs::read(path).await?;
        self.uploads.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://s3.test.example/media-bucket/{key}")
    }
}

/// Serves canned bodies by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeDownloader {
    pub responses: Mutex<HashMap<String, Result<(Vec<u8>, Option<String>), u16>>>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn serve(&self, url: &str, body: &[u8], content_type: Option<&str>) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Ok((body.to_vec(), content_type.map(String::from))),
        );
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(status));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn respond(&self, url: &str) -> Result<(Vec<u8>, Option<String>), RemoteError> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.responses.lock().unwrap().get(url).cloned() {
            Some(Ok(response)) => Ok(response),
            Some(Err(status)) => Err(RemoteError::HttpStatus {
                status,
                reason: "Canned Failure".into(),
            }),
            None => Err(RemoteError::HttpStatus {
                status: 404,
                reason: "Not Found".into(),
            }),
        }
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download_to(&self, url: &str, dest: &Path) -> Result<Option<String>, RemoteError> {
        let (body, content_type) = self.respond(url)?;
        tokio::fs::write(dest, body).await?;
        Ok(content_type)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        Ok(self.respond(url)?.0)
    }
}

#[derive(Default)]
pub struct FakeTranscriptionService {
    pub jobs: Mutex<BTreeMap<String, TranscriptionJob>>,
    pub started: Mutex<Vec<StartJobRequest>>,
    pub start_calls: Mutex<u32>,
    /// Errors returned by `start_job`, one per call, before it succeeds.
    pub start_failures: Mutex<VecDeque<RemoteError>>,
    pub throttle_starts_forever: Mutex<bool>,
    /// When set, `get_job` fails with an internal error.
    pub get_job_fails: Mutex<bool>,
    /// Listing pages keyed by the token that requests them.
    pub pages: Mutex<HashMap<Option<String>, JobPage>>,
    pub list_calls: Mutex<Vec<Option<String>>>,
    /// Errors returned by `list_jobs`, one per call, before pages are served.
    pub list_failures: Mutex<VecDeque<RemoteError>>,
}

impl FakeTranscriptionService {
    pub fn add_job(&self, job_name: &str, status: JobStatus, transcript_uri: Option<&str>) {
        self.jobs.lock().unwrap().insert(
            job_name.to_string(),
            TranscriptionJob {
                job_name: job_name.to_string(),
                status,
                media_uri: None,
                language_code: None,
                transcript_uri: transcript_uri.map(String::from),
            },
        );
    }

    /// Chain pages so page `i` carries the token for page `i + 1`.
    pub fn set_pages(&self, pages: &[&[&str]]) {
        let mut map = self.pages.lock().unwrap();
        map.clear();
        for (i, names) in pages.iter().enumerate() {
            let key = (i > 0).then(|| format!("token-{i}"));
            let next_token = (i + 1 < pages.len()).then(|| format!("token-{}", i + 1));
            map.insert(
                key,
                JobPage {
                    job_names: names.iter().map(|n| n.to_string()).collect(),
                    next_token,
                },
            );
        }
    }

    pub fn started_names(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.job_name.clone())
            .collect()
    }
}

#[async_trait]
impl crate::remote::TranscriptionService for FakeTranscriptionService {
    async fn get_job(&self, job_name: &str) -> Result<Probe<TranscriptionJob>, RemoteError> {
        if *self.get_job_fails.lock().unwrap() {
            return Err(RemoteError::service("InternalFailureException", "try later"));
        }
        Ok(match self.jobs.lock().unwrap().get(job_name) {
            Some(job) => Probe::Found(job.clone()),
            None => Probe::NotFound,
        })
    }

    async fn start_job(&self, request: &StartJobRequest) -> Result<(), RemoteError> {
        *self.start_calls.lock().unwrap() += 1;
        if *self.throttle_starts_forever.lock().unwrap() {
            return Err(RemoteError::service("LimitExceededException", "slow down"));
        }
        if let Some(e) = self.start_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&request.job_name) {
            return Err(RemoteError::service(
                "ConflictException",
                "The requested job name already exists",
            ));
        }
        jobs.insert(
            request.job_name.clone(),
            TranscriptionJob {
                job_name: request.job_name.clone(),
                status: JobStatus::Queued,
                media_uri: Some(request.media_uri.clone()),
                language_code: Some(request.language_code.clone()),
                transcript_uri: None,
            },
        );
        self.started.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn list_jobs(
        &self,
        status: JobStatus,
        next_token: Option<&str>,
    ) -> Result<JobPage, RemoteError> {
        assert_eq!(status, JobStatus::Completed);
        let token = next_token.map(String::from);
        self.list_calls.lock().unwrap().push(token.clone());
        if let Some(e) = self.list_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.pages
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or_else(|| RemoteError::service("BadRequestException", "invalid NextToken"))
    }
}
