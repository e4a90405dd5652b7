//! Binary payloads handed to scripts.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// An owned byte buffer with a lossy string view.
///
/// Network data, database text columns and websocket frames all arrive as
/// `Bytes` so that binary content survives untouched.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the buffer, returning the inner vector.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Returns the buffer as UTF-8, when it is valid.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<String> for Bytes {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for Bytes {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

/// Lossy UTF-8 rendering; invalid sequences become U+FFFD.
impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => write!(f, "Bytes({text:?})"),
            None => write!(f, "Bytes({} bytes)", self.0.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossy_display() {
        let bytes = Bytes::from(vec![b'o', b'k', 0xff]);
        assert_eq!(bytes.to_string(), "ok\u{fffd}");
        assert!(bytes.as_str().is_none());
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_value(Bytes::from("hi")).unwrap();
        assert_eq!(json, serde_json::json!([104, 105]));
    }
}
