//! Pure Rust codec. Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff format | `ftyp` brands for HEIF, else `image::guess_format` (magic bytes, never the key) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Inspect (AVIF, HEIC, other HEIF) | `avif-parse`, falling back to the `ispe` property box; dimensions only |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//!
//! HEIF-family sources (AVIF, HEIC, image sequences) are never re-encoded:
//! they are skipped as already converted, so their pixels are never decoded.
//! Reading the container header is enough to reject truncated or corrupt
//! files at the decode stage.

use super::backend::{Codec, CodecError, FormatLabel};
use super::profile::{ChromaSubsampling, Compression, EncodeProfile, EncoderBackend};
use image::codecs::avif::AvifEncoder;
use image::{DynamicImage, ImageFormat};
use std::borrow::Cow;

/// Formats with a decoder compiled in, and the loader label each reports.
const LOADERS: &[(ImageFormat, &str)] = &[
    (ImageFormat::Jpeg, "jpegload_buffer"),
    (ImageFormat::Png, "pngload_buffer"),
    (ImageFormat::Tiff, "tiffload_buffer"),
    (ImageFormat::WebP, "webpload_buffer"),
];

/// Loader label for the HEIF container family, AVIF included.
const HEIF_LOADER: &str = "heifload_buffer";

/// `ftyp` brands that mark a file as HEIF (AVIF, HEIC, and their sequence
/// and structural variants).
const HEIF_BRANDS: [&[u8]; 6] = [b"avif", b"avis", b"heic", b"heix", b"mif1", b"msf1"];

/// Decoded image handle produced by [`RustCodec`].
///
/// Owns the decoded pixels; dropping it frees them.
pub struct DecodedImage {
    loader: &'static str,
    pixels: Pixels,
}

enum Pixels {
    Raster(DynamicImage),
    /// HEIF container whose header was read but not decoded.
    HeifContainer { width: u32, height: u32 },
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.pixels {
            Pixels::Raster(img) => (img.width(), img.height()),
            Pixels::HeifContainer { width, height } => (*width, *height),
        }
    }
}

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn loader_for(format: ImageFormat) -> Option<&'static str> {
    LOADERS
        .iter()
        .find(|(fmt, _)| *fmt == format && fmt.reading_enabled())
        .map(|(_, loader)| *loader)
}

/// Iterate ISO-BMFF boxes laid out back to back in `data`, yielding each
/// box type with its payload. Stops at the first malformed header.
fn boxes(data: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    let mut rest = data;
    std::iter::from_fn(move || {
        let size = u32::from_be_bytes(rest.get(0..4)?.try_into().ok()?);
        let kind: [u8; 4] = rest.get(4..8)?.try_into().ok()?;
        let (header, size) = match size {
            0 => (8, rest.len()),
            1 => {
                let large = u64::from_be_bytes(rest.get(8..16)?.try_into().ok()?);
                (16, usize::try_from(large).ok()?)
            }
            n => (8, n as usize),
        };
        if size < header || size > rest.len() {
            return None;
        }
        let payload = &rest[header..size];
        rest = &rest[size..];
        Some((kind, payload))
    })
}

fn child<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    boxes(data).find(|(k, _)| k == kind).map(|(_, payload)| payload)
}

/// True when the file opens with an `ftyp` box naming a HEIF brand, as
/// major or compatible brand.
fn is_heif(bytes: &[u8]) -> bool {
    let Some((_, ftyp)) = boxes(bytes)
        .next()
        .filter(|(kind, payload)| kind == b"ftyp" && payload.len() >= 8)
    else {
        return false;
    };
    // major brand, minor version, then compatible brands
    std::iter::once(&ftyp[0..4])
        .chain(ftyp[8..].chunks_exact(4))
        .any(|brand| HEIF_BRANDS.iter().any(|heif| *heif == brand))
}

/// Dimensions from the first `ispe` property (`meta/iprp/ipco/ispe`).
fn ispe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // meta and ispe are full boxes: 4 bytes of version and flags first.
    let meta = child(bytes, b"meta")?.get(4..)?;
    let ipco = child(child(meta, b"iprp")?, b"ipco")?;
    let ispe = child(ipco, b"ispe")?;
    let width = u32::from_be_bytes(ispe.get(4..8)?.try_into().ok()?);
    let height = u32::from_be_bytes(ispe.get(8..12)?.try_into().ok()?);
    (width > 0 && height > 0).then_some((width, height))
}

fn avif_dimensions(bytes: &[u8]) -> Result<(u32, u32), CodecError> {
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| CodecError::Decode(format!("failed to parse HEIF container: {e:?}")))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| CodecError::Decode(format!("failed to read HEIF metadata: {e:?}")))?;
    Ok((meta.max_frame_width.get(), meta.max_frame_height.get()))
}

/// Read dimensions from a HEIF container without decoding its payload.
/// `avif-parse` handles plain AVIF; other brands (HEIC, `mif1`, `avis`)
/// fall back to the image spatial extent property.
fn inspect_heif(bytes: &[u8]) -> Result<DecodedImage, CodecError> {
    let (width, height) = match avif_dimensions(bytes) {
        Ok(dims) => dims,
        Err(e) => ispe_dimensions(bytes).ok_or(e)?,
    };
    Ok(DecodedImage {
        loader: HEIF_LOADER,
        pixels: Pixels::HeifContainer { width, height },
    })
}

/// Reject profile fields the rav1e path cannot produce.
fn check_profile(profile: &EncodeProfile) -> Result<(), CodecError> {
    if profile.compression != Compression::Av1 {
        return Err(CodecError::UnsupportedProfile(format!(
            "{:?} compression (only AV1 is available)",
            profile.compression
        )));
    }
    if profile.encoder != EncoderBackend::Rav1e {
        return Err(CodecError::UnsupportedProfile(format!(
            "{:?} encoder (only rav1e is linked)",
            profile.encoder
        )));
    }
    if profile.bit_depth != 8 {
        return Err(CodecError::UnsupportedProfile(format!(
            "{}-bit output",
            profile.bit_depth
        )));
    }
    if profile.chroma != ChromaSubsampling::Auto {
        return Err(CodecError::UnsupportedProfile(format!(
            "{:?} chroma subsampling",
            profile.chroma
        )));
    }
    if profile.speed > 10 {
        return Err(CodecError::UnsupportedProfile(format!(
            "speed {} (range 0-10)",
            profile.speed
        )));
    }
    Ok(())
}

/// Normalize to 8-bit RGB(A), the layouts the AVIF encoder accepts.
fn to_eight_bit(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(img),
        other if other.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

impl Codec for RustCodec {
    type Image = DecodedImage;

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        if is_heif(bytes) {
            return inspect_heif(bytes);
        }
        let format = image::guess_format(bytes).map_err(|_| CodecError::UnknownFormat)?;
        if format == ImageFormat::Avif {
            return inspect_heif(bytes);
        }
        let loader = loader_for(format).ok_or_else(|| {
            CodecError::Decode(format!("no decoder compiled in for {format:?}"))
        })?;
        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CodecError::Decode(format!("{format:?}: {e}")))?;
        Ok(DecodedImage {
            loader,
            pixels: Pixels::Raster(img),
        })
    }

    fn read_format_label(&self, image: &DecodedImage) -> Result<FormatLabel, CodecError> {
        Ok(FormatLabel::new(image.loader))
    }

    fn encode(&self, image: &DecodedImage, profile: &EncodeProfile) -> Result<Vec<u8>, CodecError> {
        check_profile(profile)?;
        let raster = match &image.pixels {
            Pixels::Raster(img) => img,
            Pixels::HeifContainer { .. } => {
                return Err(CodecError::Encode(
                    "HEIF sources are not re-encoded".to_string(),
                ));
            }
        };

        let mut out = Vec::new();
        let encoder =
            AvifEncoder::new_with_speed_quality(&mut out, profile.speed, profile.effective_quality());
        to_eight_bit(raster)
            .write_with_encoder(encoder)
            .map_err(|e| CodecError::Encode(format!("AVIF encode failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::detect::is_already_target;
    use crate::test_helpers::{avif_bytes, heif_bytes, jpeg_bytes, png_bytes, with_major_brand};

    #[test]
    fn decode_jpeg_reports_jpeg_loader() {
        let codec = RustCodec::new();
        let image = codec.decode(&jpeg_bytes(64, 48)).unwrap();
        assert_eq!(image.dimensions(), (64, 48));
        let label = codec.read_format_label(&image).unwrap();
        assert_eq!(label.as_str(), "jpegload_buffer");
        assert!(!is_already_target(&label));
    }

    #[test]
    fn decode_png_reports_png_loader() {
        let codec = RustCodec::new();
        let image = codec.decode(&png_bytes(10, 20)).unwrap();
        assert_eq!(image.dimensions(), (10, 20));
        assert_eq!(
            codec.read_format_label(&image).unwrap().as_str(),
            "pngload_buffer"
        );
    }

    #[test]
    fn decode_avif_reports_heif_loader() {
        let codec = RustCodec::new();
        let image = codec.decode(&avif_bytes(32, 24)).unwrap();
        assert_eq!(image.dimensions(), (32, 24));
        let label = codec.read_format_label(&image).unwrap();
        assert!(is_already_target(&label));
    }

    #[test]
    fn decode_garbage_is_unknown_format() {
        let codec = RustCodec::new();
        let err = codec.decode(b"definitely not an image").err().unwrap();
        assert!(matches!(err, CodecError::UnknownFormat));
    }

    #[test]
    fn decode_empty_buffer_errors() {
        let codec = RustCodec::new();
        assert!(codec.decode(&[]).is_err());
    }

    #[test]
    fn decode_truncated_jpeg_errors() {
        let codec = RustCodec::new();
        let bytes = jpeg_bytes(64, 64);
        let err = codec.decode(&bytes[..bytes.len() / 3]).err().unwrap();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn encode_jpeg_to_avif() {
        let codec = RustCodec::new();
        let image = codec.decode(&jpeg_bytes(64, 48)).unwrap();
        let out = codec.encode(&image, &EncodeProfile::AVIF).unwrap();
        assert!(!out.is_empty());
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Avif);

        let reread = codec.decode(&out).unwrap();
        assert_eq!(reread.dimensions(), (64, 48));
    }

    #[test]
    fn encode_is_reproducible() {
        let codec = RustCodec::new();
        let image = codec.decode(&png_bytes(40, 30)).unwrap();
        let a = codec.encode(&image, &EncodeProfile::AVIF).unwrap();
        let b = codec.encode(&image, &EncodeProfile::AVIF).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn encode_avif_source_is_refused() {
        let codec = RustCodec::new();
        let image = codec.decode(&avif_bytes(16, 16)).unwrap();
        let err = codec.encode(&image, &EncodeProfile::AVIF).unwrap_err();
        assert!(matches!(err, CodecError::Encode(_)));
    }

    #[test]
    fn encode_rejects_ten_bit_profile() {
        let codec = RustCodec::new();
        let image = codec.decode(&png_bytes(8, 8)).unwrap();
        let profile = EncodeProfile {
            bit_depth: 10,
            ..EncodeProfile::AVIF
        };
        let err = codec.encode(&image, &profile).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedProfile(_)));
    }

    #[test]
    fn encode_rejects_foreign_encoder() {
        let codec = RustCodec::new();
        let image = codec.decode(&png_bytes(8, 8)).unwrap();
        let profile = EncodeProfile {
            encoder: EncoderBackend::Svt,
            ..EncodeProfile::AVIF
        };
        assert!(matches!(
            codec.encode(&image, &profile),
            Err(CodecError::UnsupportedProfile(_))
        ));
    }

    #[test]
    fn eight_bit_images_are_borrowed() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
        assert!(matches!(to_eight_bit(&img), Cow::Borrowed(_)));
    }

    #[test]
    fn sixteen_bit_images_are_narrowed() {
        let img = DynamicImage::ImageRgb16(image::ImageBuffer::new(2, 2));
        let narrowed = to_eight_bit(&img);
        assert!(matches!(narrowed.as_ref(), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn grayscale_alpha_becomes_rgba() {
        let img = DynamicImage::ImageLumaA8(image::ImageBuffer::new(2, 2));
        assert!(matches!(to_eight_bit(&img).as_ref(), DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn decode_heic_header_reports_heif_loader() {
        let codec = RustCodec::new();
        let image = codec.decode(&heif_bytes(b"heic", &[b"mif1", b"heic"], 4032, 3024)).unwrap();
        assert_eq!(image.dimensions(), (4032, 3024));
        let label = codec.read_format_label(&image).unwrap();
        assert_eq!(label.as_str(), "heifload_buffer");
        assert!(is_already_target(&label));
    }

    #[test]
    fn decode_mif1_major_avif_is_heif() {
        let codec = RustCodec::new();
        let bytes = with_major_brand(avif_bytes(24, 16), b"mif1");
        let image = codec.decode(&bytes).unwrap();
        assert_eq!(image.dimensions(), (24, 16));
        assert!(is_already_target(&codec.read_format_label(&image).unwrap()));
    }

    #[test]
    fn decode_avis_major_is_heif() {
        let codec = RustCodec::new();
        let bytes = with_major_brand(avif_bytes(8, 8), b"avis");
        let image = codec.decode(&bytes).unwrap();
        assert!(is_already_target(&codec.read_format_label(&image).unwrap()));
    }

    #[test]
    fn heif_brand_without_header_is_decode_error() {
        let codec = RustCodec::new();
        let bytes = heif_bytes(b"heic", &[], 0, 0);
        let err = codec.decode(&bytes).err().unwrap();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn non_heif_bmff_is_not_heif() {
        assert!(!is_heif(&heif_bytes(b"isom", &[b"mp41"], 8, 8)));
        assert!(is_heif(&heif_bytes(b"isom", &[b"mp41", b"msf1"], 8, 8)));
        assert!(!is_heif(b"ftyp"));
        assert!(!is_heif(&png_bytes(4, 4)));
    }

    #[test]
    fn truncated_box_stops_iteration() {
        let mut bytes = heif_bytes(b"heic", &[], 8, 8);
        bytes.truncate(bytes.len() - 1);
        assert_eq!(ispe_dimensions(&bytes), None);
    }
}
