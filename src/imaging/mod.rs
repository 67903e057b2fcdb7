//! Image handling in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff + decode** | `image::guess_format` + `image` decoders |
//! | **AVIF inspection** | `avif-parse` |
//! | **Encode → AVIF** | rav1e via `image::codecs::avif` |
//!
//! The module is split into:
//! - **Profile**: the fixed [`EncodeProfile`] every conversion uses
//! - **Backend**: [`Codec`] trait + [`RustCodec`]
//! - **Detect**: loader-label check deciding whether to skip

pub mod backend;
pub mod detect;
mod profile;
pub mod rust_backend;

pub use backend::{Codec, CodecError, FormatLabel};
pub use detect::{TARGET_LOADER_PREFIX, detect, is_already_target};
pub use profile::{ChromaSubsampling, Compression, EncodeProfile, EncoderBackend, Quality};
pub use rust_backend::{DecodedImage, RustCodec};
