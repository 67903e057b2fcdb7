//! The event that triggers one conversion.

use serde::{Deserialize, Serialize};

/// A reference to one stored object, as delivered by the trigger.
///
/// `key` is exactly as received: it may still be URL-escaped. Use
/// [`crate::key::decode_key`] before handing it to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    #[serde(rename = "s3Bucket")]
    pub bucket: String,
    #[serde(rename = "s3Key")]
    pub key: String,
}

impl ConversionRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}
