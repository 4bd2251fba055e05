use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as StorePath;
use object_store::{
    Attribute, Attributes, ObjectStore, PutMultipartOpts, PutOptions, PutPayload,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::remote::{BlobStore, ObjectInfo, Probe, RemoteError};

/// Files larger than this go up as a multipart upload. S3 rejects parts under 5 MiB.
const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Everything but RFC 3986 unreserved characters is escaped in object keys.
const KEY_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// S3 client for `bucket` in `region`, authenticated through the default
/// chain: `AWS_*` variables, web identity, ECS task role, instance metadata.
pub fn s3_client(bucket: &str, region: &str) -> Result<AmazonS3> {
    if bucket.trim().is_empty() {
        return Err(Error::InvalidOption("bucket name is empty".into()));
    }
    AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region(region)
        .build()
        .map_err(|e| Error::Remote(storage(e)))
}

/// One S3 bucket as a `BlobStore`.
pub struct S3BlobStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    endpoint: String,
    part_size: usize,
}

impl S3BlobStore {
    /// Wrap a client built by [`s3_client`].
    pub fn from_client(client: AmazonS3, bucket: &str, region: &str) -> Self {
        Self::from_store(
            Arc::new(client),
            bucket,
            &format!("https://s3.{region}.amazonaws.com"),
        )
    }

    /// Wrap any object store; `endpoint` is only used to build object URLs.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: &str, endpoint: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    pub fn part_size(mut self, bytes: usize) -> Self {
        self.part_size = bytes.max(1);
        self
    }

    async fn put_multipart(
        &self,
        location: &StorePath,
        file: &mut tokio::fs::File,
        attributes: Attributes,
    ) -> std::result::Result<(), RemoteError> {
        let mut upload = self
            .store
            .put_multipart_opts(
                location,
                PutMultipartOpts {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(storage)?;

        let mut parts = 0usize;
        loop {
            let mut part = Vec::with_capacity(self.part_size);
            let read = (&mut *file)
                .take(self.part_size as u64)
                .read_to_end(&mut part)
                .await;
            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    let _ = upload.abort().await;
                    return Err(e.into());
                }
            }
            if let Err(e) = upload.put_part(PutPayload::from(part)).await {
                let _ = upload.abort().await;
                return Err(storage(e));
            }
            parts += 1;
        }

        upload.complete().await.map_err(storage)?;
        debug!(%location, parts, "multipart upload complete");
        Ok(())
    }
}

fn storage(e: object_store::Error) -> RemoteError {
    RemoteError::Storage(e.to_string())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn head(&self, key: &str) -> std::result::Result<Probe<ObjectInfo>, RemoteError> {
        match self.store.head(&StorePath::from(key)).await {
            Ok(meta) => Ok(Probe::Found(ObjectInfo {
                size: meta.size as u64,
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(Probe::NotFound),
            Err(e) => Err(storage(e)),
        }
    }

    async fn upload_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> std::result::Result<(), RemoteError> {
        let location = StorePath::from(key);
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let mut file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        if size > self.part_size as u64 {
            return self.put_multipart(&location, &mut file, attributes).await;
        }

        let mut body = Vec::with_capacity(size as usize);
        file.read_to_end(&mut body).await?;
        self.store
            .put_opts(
                &location,
                PutPayload::from(body),
                PutOptions {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(storage)?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        let key = utf8_percent_encode(key, KEY_ESCAPES);
        format!("{}/{}/{key}", self.endpoint, self.bucket)
    }
}
