use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::payload::Payload;

/// A shared, type-erased [`Backend`] instance.
pub type SharedBackend = Arc<dyn Backend>;

/// The storage calls issued by the benchmark.
///
/// A backend is bound to a single bucket when it is constructed. Implementations must not retry
/// failed calls; retry policy belongs to the transport.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Uploads the payload under the given key.
    async fn put_object(&self, key: &str, payload: Payload) -> BackendResult<PutResponse>;

    /// Downloads the full contents of an object.
    async fn get_object(&self, key: &str) -> BackendResult<Bytes>;

    /// Fetches the metadata of an object without its contents.
    async fn stat_object(&self, key: &str) -> BackendResult<ObjectMeta>;

    /// Deletes an object.
    async fn delete_object(&self, key: &str) -> BackendResult<()>;
}

/// Response of a successful upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutResponse {
    /// Number of bytes uploaded.
    pub size: u64,
    /// The ETag assigned by the backend.
    pub etag: Option<String>,
}

/// Metadata returned for a `STAT` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// The ETag assigned by the backend.
    pub etag: Option<String>,
}

/// Errors returned by a [`Backend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// IO errors related to payload streaming.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors reported by the S3 client. These can be network errors or error responses returned
    /// by the API itself.
    #[error("s3 error: {0}")]
    S3(#[from] s3::error::S3Error),

    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Any other error stemming from a backend.
    #[error("storage backend error: {context}")]
    Generic {
        /// What the backend was doing.
        context: String,
        /// The underlying error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BackendError {
    /// Wraps an arbitrary error with some context.
    pub fn generic(
        context: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Generic {
            context: context.into(),
            cause: cause.into(),
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
