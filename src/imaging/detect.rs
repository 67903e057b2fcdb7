//! Source format detection.
//!
//! The decision to skip an object rests on the loader label the codec
//! reports, not on the key's extension: `photo.jpg` may well hold AVIF bytes.
//!
//! Failing to read the label is not fatal. The object is then treated as
//! [`FormatLabel::unknown`] and converted, since re-encoding an image is
//! cheaper than leaving one unconverted.

use super::backend::{Codec, FormatLabel};
use tracing::{debug, warn};

/// Loader prefix of the HEIF family, which AVIF belongs to.
///
/// Matching is by prefix so loader variants (`heifload_buffer`,
/// `heifload_source`) all count. A loader for AVIF that does not share this
/// prefix is not recognized and its images get re-encoded.
pub const TARGET_LOADER_PREFIX: &str = "heifload";

/// Read the loader label of a decoded image, falling back to
/// [`FormatLabel::unknown`] when the codec cannot report one.
pub fn detect<C: Codec>(codec: &C, image: &C::Image) -> FormatLabel {
    match codec.read_format_label(image) {
        Ok(label) => {
            debug!(loader = %label, "detected loader");
            label
        }
        Err(e) => {
            warn!(error = %e, "failed to read image format metadata, attempting conversion");
            FormatLabel::unknown()
        }
    }
}

/// Whether `label` says the image is already AVIF.
pub fn is_already_target(label: &FormatLabel) -> bool {
    label.as_str().starts_with(TARGET_LOADER_PREFIX)
}
