//! Objects tracked in the working set.

use std::fmt;

/// An object that was created by a successful `PUT`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRecord {
    /// Full object key within the bucket.
    pub name: String,
    /// Size of the uploaded payload in bytes.
    pub size: u64,
    /// The ETag returned by the storage backend, if any.
    pub etag: Option<String>,
}

impl ObjectRecord {
    /// Creates a record for an object without an ETag.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            etag: None,
        }
    }

    /// Attaches the ETag reported by the backend.
    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }
}

impl fmt::Display for ObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
