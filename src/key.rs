//! Object key handling: unescaping event keys and deriving output keys.
//!
//! Storage event notifications deliver object keys URL-escaped the way a
//! query string is: `%XX` for reserved bytes and `+` for a space. Every
//! storage call needs the literal key, so [`decode_key`] runs before
//! anything else touches the object.
//!
//! The converted object lives next to its source, under the same key with
//! the extension swapped ([`derive_target_key`]):
//!
//! - `a/b/photo.jpg` → `a/b/photo.avif`
//! - `a/b/photo` → `a/b/photo.avif` (no extension: appended)
//! - `a.b.jpg` → `a.b.avif` (only the last dot counts)
//! - `noext.` → `noext.avif` (a trailing dot is an empty extension)

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("invalid escape sequence {escape:?} at byte {offset}")]
    InvalidEscape { offset: usize, escape: String },
    #[error("decoded key is not valid UTF-8")]
    InvalidUtf8,
}

/// Unescape a query-encoded object key into its literal form.
///
/// `%XX` (either hex case) becomes the byte `0xXX` and `+` becomes a space.
/// A `%` not followed by two hex digits is rejected rather than passed
/// through, so a malformed key never reaches storage.
pub fn decode_key(raw: &str) -> Result<String, KeyDecodeError> {
    // Hand-rolled: `form_urlencoded` and `percent_encoding` pass malformed
    // escapes through instead of failing.

    // Fast path: nothing to unescape.
    if !raw.contains(['%', '+']) {
        return Ok(raw.to_string());
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex_value);
                let lo = bytes.get(i + 2).copied().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
                    _ => {
                        let end = (i + 3).min(bytes.len());
                        return Err(KeyDecodeError::InvalidEscape {
                            offset: i,
                            escape: String::from_utf8_lossy(&bytes[i..end]).into_owned(),
                        });
                    }
                }
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| KeyDecodeError::InvalidUtf8)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Replace the extension of `key` with `extension` (which includes its dot).
///
/// The extension is the suffix starting at the last `.` of the final
/// `/`-separated segment. Keys without one get `extension` appended.
pub fn derive_target_key(key: &str, extension: &str) -> String {
    let segment_start = key.rfind('/').map_or(0, |pos| pos + 1);
    match key[segment_start..].rfind('.') {
        Some(dot) => format!("{}{}", &key[..segment_start + dot], extension),
        None => format!("{key}{extension}"),
    }
}
