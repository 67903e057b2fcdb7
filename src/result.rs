//! Caller-visible result records.
//!
//! The converter reports what it did as an [`Outcome`]; [`ConversionResult`]
//! is its serialized form. Failures never produce a record: they surface as
//! a [`ConvertError`](crate::convert::ConvertError) instead.

use serde::{Deserialize, Serialize};

/// Message attached to skipped conversions.
pub const SKIP_MESSAGE: &str = "Image is already in AVIF format. Skipping conversion.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionStatus {
    #[serde(rename = "CONVERTED")]
    Converted,
    #[serde(rename = "SKIPPED_ALREADY_AVIF")]
    SkippedAlreadyTarget,
}

/// Terminal state of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Source was already AVIF; nothing was written.
    Skipped { original_key: String },
    /// An AVIF copy was written under `new_key`.
    Converted {
        original_key: String,
        new_key: String,
        original_size: usize,
        encoded_size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub status: ConversionStatus,
    pub original_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Outcome> for ConversionResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Skipped { original_key } => Self {
                status: ConversionStatus::SkippedAlreadyTarget,
                original_key,
                new_key: None,
                message: Some(SKIP_MESSAGE.to_string()),
            },
            Outcome::Converted {
                original_key,
                new_key,
                ..
            } => Self {
                status: ConversionStatus::Converted,
                original_key,
                new_key: Some(new_key),
                message: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converted_record_shape() {
        let result = ConversionResult::from(Outcome::Converted {
            original_key: "a/photo.jpg".into(),
            new_key: "a/photo.avif".into(),
            original_size: 1000,
            encoded_size: 200,
        });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "CONVERTED",
                "originalKey": "a/photo.jpg",
                "newKey": "a/photo.avif",
            })
        );
    }

    #[test]
    fn skipped_record_omits_new_key() {
        let result = ConversionResult::from(Outcome::Skipped {
            original_key: "a/photo.avif".into(),
        });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "SKIPPED_ALREADY_AVIF",
                "originalKey": "a/photo.avif",
                "message": SKIP_MESSAGE,
            })
        );
    }

    #[test]
    fn record_parses_back() {
        let parsed: ConversionResult =
            serde_json::from_str(r#"{"status":"CONVERTED","originalKey":"k.png","newKey":"k.avif"}"#)
                .unwrap();
        assert_eq!(parsed.status, ConversionStatus::Converted);
        assert_eq!(parsed.new_key.as_deref(), Some("k.avif"));
        assert_eq!(parsed.message, None);
    }
}
