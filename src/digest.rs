//! Key digests used to derive on-disk record names

use std::fmt;

/// A 32-byte BLAKE3 digest of a blob key
///
/// The filesystem backend names each record after the hex form of its key's
/// digest, so arbitrary keys (slashes, unicode, `..`) map to flat, fixed-width
/// file names inside the store root.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyDigest([u8; 32]);

impl KeyDigest {
    /// Digest a key
    pub fn of(key: &str) -> Self {
        KeyDigest(*blake3::hash(key.as_bytes()).as_bytes())
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string (the record file name)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a record file name back into a digest
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(KeyDigest(arr))
    }
}

impl fmt::Display for KeyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for KeyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyDigest({})", &self.to_hex()[..7])
    }
}
