//! Object storage collaborators.
//!
//! The converter only needs two calls: fetch a whole object and write a
//! whole object. [`ObjectStore`] captures exactly that, and the three
//! implementations cover production and local use:
//!
//! | Store | Backing | Used by |
//! |---|---|---|
//! | [`S3Store`] | AWS S3 or any S3-compatible endpoint | deployed handler |
//! | [`LocalStore`] | one directory per bucket under a root | local runs |
//! | [`MemoryStore`] | in-process map | tests, fault injection |
//!
//! Every write carries a SHA-256 checksum of its body, computed once by the
//! caller in [`PutObject::new`]. Stores either forward it (S3 verifies it
//! server side) or verify it themselves before persisting anything.

mod local;
mod memory;
mod s3;

pub use local::LocalStore;
pub use memory::{MemoryStore, StoredObject};
pub use s3::S3Store;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The object (or its bucket) does not exist.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("checksum mismatch for {key}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("S3 error: {0}")]
    Sdk(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Base64-encoded SHA-256 digest, the form S3 expects in `x-amz-checksum-sha256`.
pub fn sha256_base64(bytes: &[u8]) -> String {
    BASE64.encode(Sha256::digest(bytes))
}

/// A complete object write.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_length: u64,
    /// Base64 SHA-256 of `body`.
    pub checksum_sha256: String,
}

impl PutObject {
    /// Build a write whose length and checksum are taken from `body` itself.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        body: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        let content_length = body.len() as u64;
        let checksum_sha256 = sha256_base64(&body);
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            content_type: content_type.into(),
            content_length,
            checksum_sha256,
        }
    }

    /// Check the declared length and checksum against the body.
    pub fn verify(&self) -> Result<(), StorageError> {
        if self.content_length != self.body.len() as u64 {
            return Err(StorageError::ChecksumMismatch {
                key: self.key.clone(),
                expected: format!("{} bytes", self.content_length),
                actual: format!("{} bytes", self.body.len()),
            });
        }
        let actual = sha256_base64(&self.body);
        if actual != self.checksum_sha256 {
            return Err(StorageError::ChecksumMismatch {
                key: self.key.clone(),
                expected: self.checksum_sha256.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Whole-object storage operations.
///
/// Implementations are created once per process and shared by every
/// invocation it handles.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full contents of `bucket/key`.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Write `object`, replacing any existing object under the same key.
    async fn put(&self, object: PutObject) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).get(bucket, key).await
    }

    async fn put(&self, object: PutObject) -> Result<(), StorageError> {
        (**self).put(object).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_base64_known_value() {
        // sha256("") in base64
        assert_eq!(
            sha256_base64(b""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn put_object_derives_length_and_checksum() {
        let put = PutObject::new("bucket", "a.avif", b"hello".to_vec(), "image/avif");
        assert_eq!(put.content_length, 5);
        assert_eq!(put.checksum_sha256, sha256_base64(b"hello"));
        assert!(put.verify().is_ok());
    }

    #[test]
    fn verify_detects_tampered_body() {
        let mut put = PutObject::new("bucket", "a.avif", b"hello".to_vec(), "image/avif");
        put.body[0] = b'j';
        assert!(matches!(
            put.verify(),
            Err(StorageError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn verify_detects_length_mismatch() {
        let mut put = PutObject::new("bucket", "a.avif", b"hello".to_vec(), "image/avif");
        put.content_length = 4;
        assert!(put.verify().is_err());
    }

    #[test]
    fn not_found_is_distinct() {
        let err = StorageError::NotFound {
            bucket: "b".into(),
            key: "k".into(),
        };
        assert!(err.is_not_found());
        assert!(!StorageError::Sdk("timeout".into()).is_not_found());
    }
}
