//! Small utilities exposed to scripts: random numbers, codecs and checksums.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use md5::Md5;
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::CodecError;
use crate::foundation::bytes::Bytes;

/// Returns a uniformly distributed integer in `0..=max`.
///
/// Non-positive bounds yield `0`.
pub fn get_random(max: i64) -> i64 {
    if max <= 0 {
        return 0;
    }
    rand::rng().random_range(0..=max)
}

/// Returns the string view of a binary payload, replacing invalid UTF-8.
pub fn to_string(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes.as_slice()).into_owned()
}

pub fn base64_encode(input: impl AsRef<[u8]>) -> String {
    STANDARD.encode(input)
}

pub fn base64_decode(input: &str) -> Result<String, CodecError> {
    let raw = base64_decode_bytes(input)?;
    String::from_utf8(raw.into_vec()).map_err(|_| CodecError::Utf8)
}

/// Decodes base64 without requiring the result to be text.
pub fn base64_decode_bytes(input: &str) -> Result<Bytes, CodecError> {
    STANDARD
        .decode(input.trim())
        .map(Bytes::from)
        .map_err(|e| CodecError::Base64(e.to_string()))
}

pub fn hex_encode(input: impl AsRef<[u8]>) -> String {
    hex::encode(input)
}

pub fn hex_decode(input: &str) -> Result<String, CodecError> {
    let raw = hex_decode_bytes(input)?;
    String::from_utf8(raw.into_vec()).map_err(|_| CodecError::Utf8)
}

/// Decodes hex without requiring the result to be text.
pub fn hex_decode_bytes(input: &str) -> Result<Bytes, CodecError> {
    hex::decode(input.trim())
        .map(Bytes::from)
        .map_err(|e| CodecError::Hex(e.to_string()))
}

/// Lower-case hex MD5 digest.
pub fn md5_sum(input: impl AsRef<[u8]>) -> String {
    hex::encode(Md5::digest(input))
}

/// Lower-case hex SHA-1 digest.
pub fn sha1_sum(input: impl AsRef<[u8]>) -> String {
    hex::encode(Sha1::digest(input))
}

/// Lower-case hex SHA-256 digest.
pub fn sha256_sum(input: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_random_bounds() {
        assert_eq!(get_random(0), 0);
        assert_eq!(get_random(-5), 0);
        for _ in 0..200 {
            let n = get_random(3);
            assert!((0..=3).contains(&n));
        }
    }

    #[test]
    fn test_codecs() {
        assert_eq!(base64_encode("lyre"), "bHlyZQ==");
        assert_eq!(base64_decode("bHlyZQ==").unwrap(), "lyre");
        assert_eq!(hex_encode("hi"), "6869");
        assert_eq!(hex_decode("6869").unwrap(), "hi");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(base64_decode("***"), Err(CodecError::Base64(_))));
        assert!(matches!(hex_decode("zz"), Err(CodecError::Hex(_))));
        assert_eq!(hex_decode("ff"), Err(CodecError::Utf8));
        assert_eq!(hex_decode_bytes("ff").unwrap().as_slice(), &[0xff]);
    }

    #[test]
    fn test_checksums_match_known_vectors() {
        assert_eq!(md5_sum(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(sha1_sum("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            sha256_sum("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_to_string_is_lossy() {
        let bytes = Bytes::from(vec![b'o', b'k', 0xff]);
        assert_eq!(to_string(&bytes), "ok\u{fffd}");
    }
}
