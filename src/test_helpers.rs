//! Shared test utilities: synthetic images built in memory.
//!
//! Every helper produces a small gradient so encoders have real content to
//! work with, and nothing is read from disk.

use crate::imaging::{Codec, EncodeProfile, RustCodec};
use image::{ExtendedColorType, ImageEncoder, RgbImage};

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A valid baseline JPEG of the given dimensions.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// A valid PNG of the given dimensions.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// A valid AVIF, produced by running a PNG through the production encoder.
pub fn avif_bytes(width: u32, height: u32) -> Vec<u8> {
    let codec = RustCodec::new();
    let image = codec.decode(&png_bytes(width, height)).unwrap();
    codec.encode(&image, &EncodeProfile::AVIF).unwrap()
}

/// One ISO-BMFF box.
fn bmff_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// A HEIF header (`ftyp` plus `meta/iprp/ipco/ispe`) with no image data.
/// Zero dimensions leave out the `meta` box.
pub fn heif_bytes(major: &[u8; 4], compatible: &[&[u8; 4]], width: u32, height: u32) -> Vec<u8> {
    let mut ftyp = major.to_vec();
    ftyp.extend_from_slice(&[0; 4]);
    for brand in compatible {
        ftyp.extend_from_slice(*brand);
    }
    let mut out = bmff_box(b"ftyp", &ftyp);
    if width > 0 && height > 0 {
        let mut ispe = vec![0; 4];
        ispe.extend_from_slice(&width.to_be_bytes());
        ispe.extend_from_slice(&height.to_be_bytes());
        let ipco = bmff_box(b"ipco", &bmff_box(b"ispe", &ispe));
        let mut meta = vec![0; 4];
        meta.extend(bmff_box(b"iprp", &ipco));
        out.extend(bmff_box(b"meta", &meta));
    }
    out
}

/// Rewrite the major brand of a file that starts with an `ftyp` box.
pub fn with_major_brand(mut bytes: Vec<u8>, brand: &[u8; 4]) -> Vec<u8> {
    assert_eq!(&bytes[4..8], b"ftyp");
    bytes[8..12].copy_from_slice(brand);
    bytes
}
