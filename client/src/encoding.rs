//! UTF-8-safe base64 used for SMS bodies and password changes.
//!
//! The firmware expects standard-alphabet base64 of the UTF-8 bytes. Decoding
//! is as forgiving as a browser's `atob`: ASCII whitespace is skipped, padding
//! is optional and stray trailing bits are ignored. Anything that still fails
//! to decode, or decodes to invalid UTF-8, becomes an empty string.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Base64-encode the UTF-8 bytes of `input`.
pub fn b64_encode_utf8(input: &str) -> String {
    STANDARD.encode(input.as_bytes())
}

/// Decode base64 produced by [`b64_encode_utf8`] (or the firmware).
///
/// Returns an empty string on malformed input instead of an error.
pub fn b64_decode_utf8(input: &str) -> String {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    FORGIVING
        .decode(compact)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ascii() {
        assert_eq!(b64_encode_utf8("Hello"), "SGVsbG8=");
    }

    #[test]
    fn test_encode_multibyte() {
        assert_eq!(b64_encode_utf8("你好，世界"), "5L2g5aW977yM5LiW55WM");
        assert_eq!(b64_encode_utf8("Grüße 👋"), "R3LDvMOfZSDwn5GL");
    }

    #[test]
    fn test_round_trip_mixed_scripts() {
        for s in ["", "plain ascii", "Grüße 👋", "你好，世界", "line\nbreak\ttab", "€100 ✓"] {
            assert_eq!(b64_decode_utf8(&b64_encode_utf8(s)), s);
        }
    }

    #[test]
    fn test_decode_without_padding() {
        assert_eq!(b64_decode_utf8("SGVsbG8"), "Hello");
    }

    #[test]
    fn test_decode_ignores_whitespace() {
        assert_eq!(b64_decode_utf8(" SGVs\r\nbG8= "), "Hello");
    }

    #[test]
    fn test_decode_malformed_is_empty() {
        assert_eq!(b64_decode_utf8("not base64!!"), "");
        assert_eq!(b64_decode_utf8("A"), "");
    }

    #[test]
    fn test_decode_invalid_utf8_is_empty() {
        // 0xff 0xfe is not valid UTF-8
        assert_eq!(b64_decode_utf8("//4="), "");
    }
}
