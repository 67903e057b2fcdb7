//! # AVIF Transcoder
//!
//! Converts one stored image object to AVIF per invocation. Given a bucket
//! and a (possibly URL-escaped) key, it fetches the object, checks whether it
//! is already AVIF, and if not encodes it with a fixed profile and writes the
//! result next to the original as `<stem>.avif`.
//!
//! ```text
//! {"s3Bucket": "photos", "s3Key": "2024/my+dawn.jpg"}
//!   → fetch photos/2024/my dawn.jpg
//!   → decode, detect loader (jpegload_buffer)
//!   → encode AVIF (quality 50, rav1e)
//!   → put photos/2024/my dawn.avif (image/avif, SHA-256 checksum)
//!   → {"status": "CONVERTED", "originalKey": "2024/my dawn.jpg", "newKey": "2024/my dawn.avif"}
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`key`] | Unescapes event keys and derives the `.avif` output key |
//! | [`imaging`] | Codec trait, pure-Rust codec, fixed encode profile, format detection |
//! | [`storage`] | Object store trait with S3, local-directory, and in-memory stores |
//! | [`convert`] | The per-invocation orchestrator and its stage-tagged errors |
//! | [`result`] | Result records returned to the caller |
//! | [`types`] | The trigger event |
//! | [`config`] | TOML configuration |
//! | [`logging`] | Tracing subscriber setup |
//!
//! # Design Decisions
//!
//! ## Skip by Content, Not by Name
//!
//! Whether an object is already AVIF is decided from the loader that decoded
//! it, not from its key. Re-running the handler on its own output is
//! therefore a no-op: the `.avif` object is recognized and skipped, and no
//! write happens. This is what keeps a bucket-wide trigger from looping.
//!
//! ## Reproducible Output
//!
//! The encode profile is a constant. Neither the event nor the config file
//! can change it, so identical input bytes always give identical output.
//!
//! ## Fail Fast, Tagged by Stage
//!
//! Every failure aborts the invocation and carries the stage it happened in
//! ([`convert::Stage`]) along with the underlying error. There is no partial
//! success: if the upload fails, no `CONVERTED` record is produced.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and AVIF encoding use the `image` crate and rav1e, so the
//! binary has no system library dependencies.

pub mod config;
pub mod convert;
pub mod imaging;
pub mod key;
pub mod logging;
pub mod result;
pub mod storage;
pub mod types;

pub use convert::{ConvertError, Converter, DefaultConverter, InitError, Stage};
pub use result::{ConversionResult, ConversionStatus, Outcome};
pub use types::ConversionRequest;

#[cfg(test)]
pub(crate) mod test_helpers;
