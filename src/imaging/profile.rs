//! The fixed AVIF encode profile.
//!
//! Every conversion uses [`EncodeProfile::AVIF`]. Nothing in an incoming
//! request can change it, so identical input gives identical output. The
//! profile says *what* the encoder must produce; the
//! [`Codec`](super::Codec) implementation decides *how*, and rejects fields it
//! cannot honor instead of silently ignoring them.
//!
//! ## Fields
//!
//! - [`Quality`]: Lossy encoding quality (1-100).
//! - `bit_depth`: Bits per channel of the encoded image.
//! - `lossless`: Request mathematically lossless output.
//! - [`ChromaSubsampling`]: Chroma plane resolution.
//! - [`Compression`]: Bitstream codec inside the HEIF container.
//! - [`EncoderBackend`]: Which encoder library produces the bitstream.
//! - `speed`: Encoder speed/effort trade-off (0 slowest, 10 fastest).

use serde::Serialize;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn value(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaSubsampling {
    /// Let the encoder pick based on quality.
    Auto,
    /// Full-resolution chroma (4:4:4).
    Off,
    /// Half-resolution chroma in both directions (4:2:0).
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    Av1,
    Hevc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderBackend {
    /// rav1e, the pure-Rust AV1 encoder behind `image`'s AVIF support.
    Rav1e,
    Aom,
    Svt,
}

/// Encoder parameters applied uniformly to every conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeProfile {
    pub quality: Quality,
    pub bit_depth: u8,
    pub lossless: bool,
    pub chroma: ChromaSubsampling,
    pub compression: Compression,
    pub encoder: EncoderBackend,
    pub speed: u8,
}

impl EncodeProfile {
    /// The one profile every conversion uses.
    pub const AVIF: EncodeProfile = EncodeProfile {
        quality: Quality(50),
        bit_depth: 8,
        lossless: false,
        chroma: ChromaSubsampling::Auto,
        compression: Compression::Av1,
        encoder: EncoderBackend::Rav1e,
        speed: 6,
    };

    /// Quality handed to the encoder. Lossless requests map to the top of
    /// the scale.
    pub fn effective_quality(&self) -> u8 {
        if self.lossless {
            100
        } else {
            self.quality.value().clamp(1, 100) as u8
        }
    }
}
