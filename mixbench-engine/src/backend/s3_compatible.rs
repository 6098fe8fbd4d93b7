use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use super::common::{Backend, BackendError, BackendResult, ObjectMeta, PutResponse};
use crate::payload::Payload;

/// Connection settings for an [`S3CompatibleBackend`].
#[derive(Clone, Default)]
pub struct S3CompatibleConfig {
    /// Name of the bucket all objects are written to.
    pub bucket: String,
    /// The region name sent with signed requests.
    pub region: String,
    /// Endpoint URL, e.g. `http://localhost:9000` for MinIO. Defaults to AWS.
    pub endpoint: Option<String>,
    /// Use path-style instead of virtual-host-style addressing.
    pub path_style: bool,
    /// Per-request timeout enforced by the client.
    pub request_timeout: Option<Duration>,
    /// Access key ID.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl fmt::Debug for S3CompatibleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3CompatibleConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// A [`Backend`] talking to Amazon S3 or any S3-compatible service.
pub struct S3CompatibleBackend {
    bucket: Box<Bucket>,
}

impl S3CompatibleBackend {
    /// Creates a new S3 compatible backend bound to the given bucket.
    ///
    /// Credentials that are not configured explicitly are picked up from the environment.
    pub fn new(config: S3CompatibleConfig) -> BackendResult<Self> {
        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            config.session_token.as_deref(),
            None,
        )
        .map_err(|err| BackendError::generic("failed to load S3 credentials", err))?;

        let endpoint = match config.endpoint {
            Some(endpoint) => endpoint,
            None => format!("https://s3.{}.amazonaws.com", config.region),
        };
        let region = Region::Custom {
            region: config.region,
            endpoint,
        };

        let mut bucket = Bucket::new(&config.bucket, region, credentials)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }
        if let Some(request_timeout) = config.request_timeout {
            bucket = bucket.with_request_timeout(request_timeout)?;
        }

        Ok(Self { bucket })
    }
}

impl fmt::Debug for S3CompatibleBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Compatible")
            .field("bucket", &self.bucket.name())
            .field("endpoint", &self.bucket.host())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Backend for S3CompatibleBackend {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    #[tracing::instrument(level = "trace", skip(self, payload))]
    async fn put_object(&self, key: &str, mut payload: Payload) -> BackendResult<PutResponse> {
        let response = self.bucket.put_object_stream(&mut payload, key).await?;
        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(BackendError::generic(
                format!("failed to upload {key}"),
                format!("unexpected status {status}"),
            ));
        }

        // Streamed uploads do not surface the ETag.
        Ok(PutResponse {
            size: response.uploaded_bytes() as u64,
            etag: None,
        })
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object(&self, key: &str) -> BackendResult<Bytes> {
        let response = self.bucket.get_object(key).await?;
        if response.status_code() == 404 {
            return Err(BackendError::NotFound(key.to_owned()));
        }

        Ok(Bytes::from(response.to_vec()))
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn stat_object(&self, key: &str) -> BackendResult<ObjectMeta> {
        let (head, status) = self.bucket.head_object(key).await?;
        if status == 404 {
            return Err(BackendError::NotFound(key.to_owned()));
        }

        Ok(ObjectMeta {
            size: head.content_length.unwrap_or_default().max(0) as u64,
            etag: head.e_tag,
        })
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        self.bucket.delete_object(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{PayloadSource, RandomPayloads};

    fn local_config() -> S3CompatibleConfig {
        S3CompatibleConfig {
            bucket: "mixbench".into(),
            region: "us-east-1".into(),
            endpoint: Some("http://localhost:9000".into()),
            path_style: true,
            access_key: Some("minioadmin".into()),
            secret_key: Some("minioadmin".into()),
            ..Default::default()
        }
    }

    #[test]
    fn debug_does_not_leak_credentials() {
        let output = format!("{:?}", local_config());
        assert!(!output.contains("minioadmin"));
    }

    #[ignore = "requires a local S3-compatible server"]
    #[tokio::test]
    async fn works_with_local_server() {
        let backend = S3CompatibleBackend::new(local_config()).unwrap();
        let payloads = RandomPayloads::fixed(1024);

        let put = backend
            .put_object("mixbench/test.rnd", payloads.next_payload())
            .await
            .unwrap();
        assert_eq!(put.size, 1024);

        let meta = backend.stat_object("mixbench/test.rnd").await.unwrap();
        assert_eq!(meta.size, 1024);

        let contents = backend.get_object("mixbench/test.rnd").await.unwrap();
        assert_eq!(contents.len(), 1024);

        backend.delete_object("mixbench/test.rnd").await.unwrap();
    }
}
