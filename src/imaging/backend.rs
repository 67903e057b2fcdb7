//! Codec trait and shared types.
//!
//! The [`Codec`] trait defines the three operations the converter needs from
//! an image library: decode a buffer, report which loader handled it, and
//! encode with an [`EncodeProfile`]. Releasing a decoded image is dropping
//! its handle, so a handle cannot outlive the scope that decoded it.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), pure Rust and statically
//! linked into the binary.

use super::profile::EncodeProfile;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("format metadata unavailable: {0}")]
    Metadata(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("unsupported encode profile: {0}")]
    UnsupportedProfile(String),
}

/// Identifier of the loader that decoded an image, e.g. `jpegload_buffer`.
///
/// Labels are `<family>load` plus a variant suffix, so callers match on
/// prefixes rather than whole strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatLabel(String);

impl FormatLabel {
    const UNKNOWN: &'static str = "unknown";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label used when the codec could not report a loader.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image library operations used by the converter.
///
/// Implementations are shared by every invocation a process handles, hence
/// `Send + Sync`. `Image` is the decoded-image handle; its `Drop` is the
/// release step.
pub trait Codec: Send + Sync {
    type Image;

    /// Decode a fully buffered image.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, CodecError>;

    /// Report the loader that decoded `image`.
    fn read_format_label(&self, image: &Self::Image) -> Result<FormatLabel, CodecError>;

    /// Encode `image` to AVIF bytes following `profile`.
    fn encode(&self, image: &Self::Image, profile: &EncodeProfile) -> Result<Vec<u8>, CodecError>;
}
