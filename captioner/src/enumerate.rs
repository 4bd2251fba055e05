//! Paging through every completed job.

use std::sync::Arc;

use futures_util::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info};

use crate::backoff::{retry_throttled, RetryPolicy};
use crate::error::{Error, Result};
use crate::remote::TranscriptionService;
use crate::types::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Cursor over the names of completed jobs, one page per `next_batch` call.
///
/// Throttled pages are retried under the listing policy (by default forever);
/// any other failure ends the enumeration with an error.
pub struct CompletedJobs {
    service: Arc<dyn TranscriptionService>,
    policy: RetryPolicy,
    cursor: Cursor,
    pages: usize,
}

impl CompletedJobs {
    pub fn new(service: Arc<dyn TranscriptionService>) -> Self {
        Self {
            service,
            policy: RetryPolicy::enumeration(),
            cursor: Cursor::Start,
            pages: 0,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn has_more(&self) -> bool {
        self.cursor != Cursor::Done
    }

    /// Token the next request will carry; `None` for the first page and once done.
    pub fn next_token(&self) -> Option<&str> {
        match &self.cursor {
            Cursor::Next(token) => Some(token.as_str()),
            Cursor::Start | Cursor::Done => None,
        }
    }

    /// Fetch the next page of job names, or `None` once the listing is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<String>>> {
        if !self.has_more() {
            return Ok(None);
        }

        let token = self.next_token().map(str::to_string);
        let service = &self.service;
        let token_ref = token.as_deref();
        let page = retry_throttled(self.policy, "list completed jobs", move || {
            service.list_jobs(JobStatus::Completed, token_ref)
        })
        .await?;

        self.pages += 1;
        self.cursor = match page.next_token {
            Some(next) if !next.is_empty() => Cursor::Next(next),
            _ => Cursor::Done,
        };
        debug!(
            page = self.pages,
            jobs = page.job_names.len(),
            more = self.has_more(),
            "listed completed jobs"
        );
        if !self.has_more() {
            info!(pages = self.pages, "completed-job listing exhausted");
        }

        Ok(Some(page.job_names))
    }

    /// Lazily yield every job name, fetching pages on demand.
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> + Send {
        stream::try_unfold(self, |mut jobs| async move {
            let batch = jobs.next_batch().await?;
            Ok::<_, Error>(batch.map(|names| {
                let names = stream::iter(names.into_iter().map(Ok::<_, Error>));
                (names, jobs)
            }))
        })
        .try_flatten()
    }

    /// Drain the listing into memory.
    pub async fn collect_all(mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            names.extend(batch);
        }
        Ok(names)
    }
}
