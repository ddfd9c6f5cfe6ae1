//! Bucketed append-log key-value engine.
//!
//! Each bucket is one append-only log file under the store's base
//! directory. A record is `varint(keyLen) key varint(valueLen) value`; the
//! latest record for a key wins. On open, the whole log is scanned once to
//! build an in-memory `key -> (offset, length)` index so reads never
//! re-scan the file. Writes go through a single mutex per bucket, matching
//! the single-writer-at-a-time contract; a `write_batch` call appends every
//! record in one lock hold so a crash never leaves a half-applied batch
//! visible (the index is only updated after every record in the batch has
//! been written and synced).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, ErrorKind, Result};

struct Location {
    offset: u64,
    length: u32,
}

struct BucketInner {
    file: File,
    end: u64,
    index: HashMap<Vec<u8>, Location>,
}

/// One append-only log file plus its in-memory key index.
pub struct Bucket {
    path: PathBuf,
    inner: Mutex<BucketInner>,
}

impl Bucket {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;

        let index = scan(&mut file)?;
        let end = file.stream_position()?;

        Ok(Bucket { path, inner: Mutex::new(BucketInner { file, end, index }) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let Some(location) = inner.index.get(key) else { return Ok(None) };
        let (offset, length) = (location.offset, location.length);
        inner.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        inner.file.read_exact(&mut buf)?;
        Ok(Some(buf))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_batch(std::slice::from_ref(&(key.to_vec(), value.to_vec())))
    }

    /// Appends every `(key, value)` pair as one fsynced batch; the index is
    /// updated only once the whole batch is durable, so readers never
    /// observe a partially applied batch.
    pub fn write_batch(&self, records: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut locations = Vec::with_capacity(records.len());

        let mut buf = Vec::new();
        for (key, value) in records {
            VByteEncoder::encode_u32(&mut buf, key.len() as u32)?;
            buf.extend_from_slice(key);
            VByteEncoder::encode_u32(&mut buf, value.len() as u32)?;
            let value_offset = inner.end + buf.len() as u64;
            buf.extend_from_slice(value);
            locations.push((key.clone(), value_offset, value.len() as u32));
        }

        inner.file.write_all(&buf)?;
        inner.file.sync_data()?;
        inner.end += buf.len() as u64;

        for (key, offset, length) in locations {
            inner.index.insert(key, Location { offset, length });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }
}

fn scan(file: &mut File) -> Result<HashMap<Vec<u8>, Location>> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;

    let mut index = HashMap::new();
    let mut pos = 0usize;
    while pos < contents.len() {
        let (key_len, consumed) = VByteEncoder::decode_u32(&contents[pos..])
            .map_err(|_| Error::new(ErrorKind::DecodeError, "truncated key length in log".to_string()))?;
        pos += consumed;
        let key = contents[pos..pos + key_len as usize].to_vec();
        pos += key_len as usize;

        let (value_len, consumed) = VByteEncoder::decode_u32(&contents[pos..])
            .map_err(|_| Error::new(ErrorKind::DecodeError, "truncated value length in log".to_string()))?;
        pos += consumed;
        let value_offset = pos as u64;
        pos += value_len as usize;
        if pos > contents.len() {
            return Err(Error::new(ErrorKind::DecodeError, "truncated value in log".to_string()));
        }

        index.insert(key, Location { offset: value_offset, length: value_len });
    }
    file.seek(SeekFrom::End(0))?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let bucket = Bucket::open(dir.path().join("b.log")).unwrap();
        bucket.put(b"k1", b"v1").unwrap();
        assert_eq!(bucket.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(bucket.get(b"missing").unwrap(), None);
    }

    #[test]
    fn later_write_shadows_earlier_one() {
        let dir = tempdir().unwrap();
        let bucket = Bucket::open(dir.path().join("b.log")).unwrap();
        bucket.put(b"k1", b"v1").unwrap();
        bucket.put(b"k1", b"v2").unwrap();
        assert_eq!(bucket.get(b"k1").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn reopening_rebuilds_index_from_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.log");
        {
            let bucket = Bucket::open(&path).unwrap();
            bucket.put(b"k1", b"v1").unwrap();
            bucket.put(b"k2", b"v2").unwrap();
        }
        let reopened = Bucket::open(&path).unwrap();
        assert_eq!(reopened.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(reopened.get(b"k2").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn write_batch_applies_every_record_atomically() {
        let dir = tempdir().unwrap();
        let bucket = Bucket::open(dir.path().join("b.log")).unwrap();
        bucket
            .write_batch(&[(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())])
            .unwrap();
        assert_eq!(bucket.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(bucket.get(b"b").unwrap(), Some(b"2".to_vec()));
    }
}
