//! AWS Transcribe over its JSON 1.1 protocol.

use async_trait::async_trait;
use object_store::aws::AwsCredentialProvider;
use object_store::CredentialProvider;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sigv4::{Signer, SigningRequest};
use crate::error::{Error, Result};
use crate::remote::{Probe, RemoteError, TranscriptionService};
use crate::types::{JobPage, JobStatus, StartJobRequest, TranscriptionJob};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "Transcribe";
const SERVICE: &str = "transcribe";

/// `TranscriptionService` backed by AWS Transcribe.
#[derive(Debug, Clone)]
pub struct TranscribeClient {
    client: reqwest::Client,
    endpoint: Url,
    host: String,
    credentials: AwsCredentialProvider,
    signer: Signer,
}

impl TranscribeClient {
    /// Client for the regional endpoint `https://transcribe.<region>.amazonaws.com/`.
    pub fn new(credentials: AwsCredentialProvider, region: &str) -> Result<Self> {
        let endpoint = format!("https://transcribe.{region}.amazonaws.com/");
        Self::with_endpoint(credentials, region, &endpoint)
    }

    /// Client for a non-default endpoint (VPC endpoint, local stand-in).
    pub fn with_endpoint(
        credentials: AwsCredentialProvider,
        region: &str,
        endpoint: &str,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::InvalidOption(format!("invalid endpoint {endpoint:?}: {e}")))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::InvalidOption(format!("endpoint has no host: {endpoint}")))
            }
        };
        let client = reqwest::Client::builder()
            .user_agent(concat!("captioner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            host,
            credentials,
            signer: Signer::new(region, SERVICE),
        })
    }

    async fn call<Req, Resp>(&self, action: &str, request: &Req) -> std::result::Result<Resp, RemoteError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)
            .map_err(|e| RemoteError::Transport(format!("encoding {action} request: {e}")))?;
        let target = format!("{TARGET_PREFIX}.{action}");
        let credentials = self
            .credentials
            .get_credential()
            .await
            .map_err(|e| RemoteError::Credentials(e.to_string()))?;
        let signature = self.signer.sign(
            &credentials,
            &SigningRequest {
                host: &self.host,
                content_type: CONTENT_TYPE,
                target: &target,
                payload: &payload,
            },
            chrono::Utc::now(),
        );

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("x-amz-target", &target)
            .header("x-amz-date", &signature.amz_date)
            .header(reqwest::header::AUTHORIZATION, &signature.authorization);
        if let Some(token) = &signature.security_token {
            builder = builder.header("x-amz-security-token", token);
        }

        debug!(action, "calling transcription service");
        let response = builder
            .body(payload)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error(status, &body));
        }
        serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Transport(format!("decoding {action} response: {e}")))
    }
}

#[async_trait]
impl TranscriptionService for TranscribeClient {
    async fn get_job(&self, job_name: &str) -> std::result::Result<Probe<TranscriptionJob>, RemoteError> {
        let request = GetJobRequest {
            transcription_job_name: job_name,
        };
        match self
            .call::<_, GetJobResponse>("GetTranscriptionJob", &request)
            .await
        {
            Ok(response) => Ok(Probe::Found(response.transcription_job.into())),
            Err(e) if is_missing_job(&e) => Ok(Probe::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn start_job(&self, request: &StartJobRequest) -> std::result::Result<(), RemoteError> {
        let wire = StartJobWire {
            transcription_job_name: &request.job_name,
            language_code: &request.language_code,
            media_format: request.media_format.as_str(),
            media: Media {
                media_file_uri: Some(request.media_uri.clone()),
            },
            settings: request.vocabulary_name.as_deref().map(|name| Settings {
                vocabulary_name: name,
            }),
        };
        self.call::<_, serde_json::Value>("StartTranscriptionJob", &wire)
            .await?;
        Ok(())
    }

    async fn list_jobs(
        &self,
        status: JobStatus,
        next_token: Option<&str>,
    ) -> std::result::Result<JobPage, RemoteError> {
        let request = ListJobsRequest { status, next_token };
        let response: ListJobsResponse = self.call("ListTranscriptionJobs", &request).await?;
        Ok(JobPage {
            job_names: response
                .transcription_job_summaries
                .into_iter()
                .map(|s| s.transcription_job_name)
                .collect(),
            next_token: response.next_token,
        })
    }
}

/// "No such job" comes back as a 400 whose message says so.
fn is_missing_job(e: &RemoteError) -> bool {
    match e {
        RemoteError::Service { code, message } => {
            code == "NotFoundException"
                || (code == "BadRequestException" && message.contains("couldn't be found"))
        }
        _ => false,
    }
}

fn parse_error(status: reqwest::StatusCode, body: &[u8]) -> RemoteError {
    let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();
    match parsed.and_then(|b| b.kind.map(|kind| (kind, b.message.unwrap_or_default()))) {
        // "com.amazonaws.transcribe#BadRequestException" -> "BadRequestException"
        Some((kind, message)) => {
            let code = kind.rsplit('#').next().unwrap_or(&kind).to_string();
            RemoteError::service(code, message)
        }
        None => RemoteError::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        },
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(rename = "Message", alias = "message")]
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetJobRequest<'a> {
    transcription_job_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetJobResponse {
    transcription_job: JobWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JobWire {
    transcription_job_name: String,
    transcription_job_status: JobStatus,
    language_code: Option<String>,
    media: Option<Media>,
    transcript: Option<TranscriptWire>,
}

impl From<JobWire> for TranscriptionJob {
    fn from(job: JobWire) -> Self {
        TranscriptionJob {
            job_name: job.transcription_job_name,
            status: job.transcription_job_status,
            media_uri: job.media.and_then(|m| m.media_file_uri),
            language_code: job.language_code,
            transcript_uri: job.transcript.and_then(|t| t.transcript_file_uri),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    media_file_uri: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranscriptWire {
    transcript_file_uri: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartJobWire<'a> {
    transcription_job_name: &'a str,
    language_code: &'a str,
    media_format: &'a str,
    media: Media,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<Settings<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Settings<'a> {
    vocabulary_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListJobsRequest<'a> {
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListJobsResponse {
    next_token: Option<String>,
    #[serde(default)]
    transcription_job_summaries: Vec<JobSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JobSummary {
    transcription_job_name: String,
}
