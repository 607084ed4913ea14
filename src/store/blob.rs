//! Blob type - the stream handed back by `get`

use crate::{Error, Result};
use std::fmt;
use std::io::{self, Read};

/// A readable blob stream with its declared length
///
/// Dropping a `Blob` closes the underlying stream. Wrappers that observe
/// the stream (the tiered cache's tee) release their resources on drop, so
/// a caller may stop reading at any point.
pub struct Blob {
    reader: Box<dyn Read + Send>,
    length: u64,
}

impl Blob {
    /// Create a blob from a reader that yields `length` bytes
    pub fn new(reader: impl Read + Send + 'static, length: u64) -> Self {
        Blob {
            reader: Box::new(reader),
            length,
        }
    }

    /// Create a blob over an owned buffer
    pub fn from_bytes(data: impl Into<bytes::Bytes>) -> Self {
        let data = data.into();
        let length = data.len() as u64;
        Blob::new(io::Cursor::new(data), length)
    }

    /// The declared payload length
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Take the underlying reader
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }

    /// Replace the reader while keeping the declared length
    pub(crate) fn map_reader<F>(self, f: F) -> Self
    where
        F: FnOnce(Box<dyn Read + Send>) -> Box<dyn Read + Send>,
    {
        Blob {
            reader: f(self.reader),
            length: self.length,
        }
    }

    /// Read the whole payload
    ///
    /// Fails with `LengthMismatch` when the stream ends early.
    pub fn read_to_vec(mut self, key: &str) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.length.min(1 << 20) as usize);
        (&mut self.reader).take(self.length).read_to_end(&mut data)?;
        if data.len() as u64 != self.length {
            return Err(Error::LengthMismatch {
                key: key.to_string(),
                expected: self.length,
                actual: data.len() as u64,
            });
        }
        Ok(data)
    }
}

impl Read for Blob {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob").field("length", &self.length).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_to_vec() {
        let blob = Blob::from_bytes(b"hello world".to_vec());
        assert_eq!(blob.length(), 11);
        assert_eq!(blob.read_to_vec("k").unwrap(), b"hello world");
    }

    #[test]
    fn test_into_reader_yields_payload() {
        let mut reader = Blob::from_bytes(&b"abc"[..]).into_reader();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn test_short_stream_is_length_mismatch() {
        let blob = Blob::new(io::Cursor::new(vec![1u8, 2]), 4);
        match blob.read_to_vec("short") {
            Err(Error::LengthMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }
}
