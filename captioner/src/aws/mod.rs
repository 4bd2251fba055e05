//! Production adapters: S3 for media, AWS Transcribe for jobs.
//!
//! Both adapters share one credential chain, resolved by `object_store`:
//! `AWS_*` variables, web identity, ECS task role, then instance metadata.

mod s3;
mod sigv4;
mod transcribe;

pub use object_store::aws::{AwsCredential, AwsCredentialProvider};
pub use s3::{s3_client, S3BlobStore};
pub use transcribe::TranscribeClient;

use crate::error::Result;

/// Region used when neither `AWS_REGION` nor `AWS_DEFAULT_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// The S3 builder insists on a bucket even when only its credentials are wanted.
const UNUSED_BUCKET: &str = "captioner-credentials";

/// Credential chain for callers that never touch S3.
pub fn default_credentials(region: &str) -> Result<AwsCredentialProvider> {
    Ok(s3_client(UNUSED_BUCKET, region)?.credentials().clone())
}

/// `AWS_REGION`, then `AWS_DEFAULT_REGION`, then [`DEFAULT_REGION`].
pub fn region_from_env() -> String {
    optional_env("AWS_REGION")
        .or_else(|| optional_env("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
