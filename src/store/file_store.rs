//! Directory-backed blob store with atomic record publication
//!
//! Each blob lives in its own file, named after the BLAKE3 digest of its key.
//!
//! Record format (all integers big-endian):
//! ```text
//! [HEADER LENGTH: 8 bytes]
//!   - H: u64 BE
//!
//! [HEADER: H bytes]
//!   - JSON: {"key": "<key>", "length": <payload length>}
//!
//! [PAYLOAD: length bytes]
//! ```
//!
//! `put` writes the whole record to a temporary file in the store root,
//! syncs it, and renames it over the final name. The rename is the only
//! publication point, so readers see either the previous record or the new
//! one, never a partial write.

use super::{Blob, BlobStore};
use crate::digest::KeyDigest;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Size of the header length prefix
const PREFIX_SIZE: u64 = 8;

/// Upper bound on a record header, guards against reading garbage lengths
const MAX_HEADER_SIZE: u64 = 1 << 20;

/// Name prefix of in-flight temporary records
const TEMP_PREFIX: &str = ".put-";

/// Metadata written in front of every payload
#[derive(Debug, Serialize, Deserialize)]
struct RecordHeader {
    key: String,
    length: u64,
}

/// A blob store rooted at a local directory
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a fresh store at `root`
    ///
    /// **Destructive**: anything already at `root` is removed first.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        match fs::remove_dir_all(&root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&root)?;

        Ok(FileStore { root })
    }

    /// Open a store at `root`, keeping existing records
    ///
    /// The directory is created if missing. Temporary files left behind by
    /// interrupted writes are swept.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                fs::remove_file(entry.path())?;
            }
        }

        Ok(FileStore { root })
    }

    /// Get the store root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Count the published records
    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            if KeyDigest::from_hex(&name.to_string_lossy()).is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Published records as `(key, payload length)`, oldest write first
    pub fn records(&self) -> Result<Vec<(String, u64)>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if KeyDigest::from_hex(&name).is_none() {
                continue;
            }

            // Deleted since the listing
            let file = match File::open(entry.path()) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let modified = file.metadata()?.modified()?;
            let (_, header) = Self::read_header(&mut BufReader::new(file), &name)?;
            records.push((modified, header.key, header.length));
        }

        records.sort_by_key(|(modified, _, _)| *modified);
        Ok(records
            .into_iter()
            .map(|(_, key, length)| (key, length))
            .collect())
    }

    /// Check whether the store holds no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(KeyDigest::of(key).to_hex())
    }

    fn read_header(reader: &mut impl Read, key: &str) -> Result<(u64, RecordHeader)> {
        let mut prefix = [0u8; PREFIX_SIZE as usize];
        reader
            .read_exact(&mut prefix)
            .map_err(|e| truncated(e, key, "header length"))?;

        let header_len = u64::from_be_bytes(prefix);
        if header_len > MAX_HEADER_SIZE {
            return Err(Error::Corruption(format!(
                "Record for {} declares a {} byte header",
                key, header_len
            )));
        }

        let mut header_buf = vec![0u8; header_len as usize];
        reader
            .read_exact(&mut header_buf)
            .map_err(|e| truncated(e, key, "header"))?;

        Ok((header_len, serde_json::from_slice(&header_buf)?))
    }
}

impl BlobStore for FileStore {
    fn get(&mut self, key: &str) -> Result<Blob> {
        let file = File::open(self.record_path(key)).map_err(|e| not_found(e, key))?;
        let file_len = file.metadata()?.len();

        let mut reader = BufReader::new(file);
        let (header_len, header) = Self::read_header(&mut reader, key)?;

        if header.key != key {
            return Err(Error::Corruption(format!(
                "Record for {} is labelled {}",
                key, header.key
            )));
        }

        let expected_len = (PREFIX_SIZE + header_len)
            .checked_add(header.length)
            .ok_or_else(|| {
                Error::Corruption(format!(
                    "Record for {} declares a {} byte payload",
                    key, header.length
                ))
            })?;
        if file_len != expected_len {
            return Err(Error::Corruption(format!(
                "Record for {} is {} bytes, header implies {}",
                key, file_len, expected_len
            )));
        }

        Ok(Blob::new(reader.take(header.length), header.length))
    }

    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        let final_path = self.record_path(key);

        // Removed on drop unless persisted
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)?;

        let header = serde_json::to_vec(&RecordHeader {
            key: key.to_string(),
            length,
        })?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            writer.write_all(&(header.len() as u64).to_be_bytes())?;
            writer.write_all(&header)?;

            let copied = io::copy(&mut blob.take(length), &mut writer)?;
            if copied != length {
                return Err(Error::LengthMismatch {
                    key: key.to_string(),
                    expected: length,
                    actual: copied,
                });
            }
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        // Close the handle before renaming over the published record
        temp.into_temp_path()
            .persist(&final_path)
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        fs::remove_file(self.record_path(key)).map_err(|e| not_found(e, key))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        match fs::symlink_metadata(self.record_path(key)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn not_found(e: io::Error, key: &str) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound(key.to_string())
    } else {
        Error::Io(e)
    }
}

fn truncated(e: io::Error, key: &str, part: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Corruption(format!("Record for {} has a truncated {}", key, part))
    } else {
        Error::Io(e)
    }
}
