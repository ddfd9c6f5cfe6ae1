//! Index store: `token_postings` (raw token bytes -> encoded postings list)
//! and `token_doc_count` (raw token bytes -> varint document count). Each
//! bucket commits its own `write_batch` atomically, so readers never see a
//! partially-applied batch within one bucket; postings are always written
//! before the paired doc-count update, so a reader can at worst see a
//! stale-but-consistent doc-count next to already-merged postings, never
//! the reverse.

use std::path::Path;

use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::postings_codec;
use crate::index::posting::PostingsList;
use crate::store::kv_log::Bucket;

pub struct PostingsStore {
    token_postings: Bucket,
    token_doc_count: Bucket,
}

impl PostingsStore {
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        Ok(PostingsStore {
            token_postings: Bucket::open(base_dir.join("token_postings.log"))?,
            token_doc_count: Bucket::open(base_dir.join("token_doc_count.log"))?,
        })
    }

    pub fn postings(&self, token: &str) -> Result<Option<PostingsList>> {
        match self.token_postings.get(token.as_bytes())? {
            Some(bytes) => Ok(Some(postings_codec::decode(&bytes)?.list)),
            None => Ok(None),
        }
    }

    pub fn doc_count(&self, token: &str) -> Result<u64> {
        match self.token_doc_count.get(token.as_bytes())? {
            Some(bytes) => {
                let (count, _) = VByteEncoder::decode_u64(&bytes)
                    .map_err(|_| Error::new(ErrorKind::DecodeError, "truncated doc count varint".to_string()))?;
                Ok(count)
            }
            None => Ok(0),
        }
    }

    /// Reads the current postings for `token`, merges with `new_postings`,
    /// re-encodes, and writes both the postings value and the updated
    /// doc-count in one atomic batch.
    pub fn merge_and_store(
        &self,
        token: &str,
        new_postings: &PostingsList,
        new_document_count: u64,
    ) -> Result<()> {
        let existing = self.postings(token)?.unwrap_or_default();
        let merged = existing.merge(new_postings);
        let encoded_postings = postings_codec::encode(&merged)?;

        let existing_count = self.doc_count(token)?;
        let mut encoded_count = Vec::new();
        VByteEncoder::encode_u64(&mut encoded_count, existing_count + new_document_count)?;

        self.token_postings.write_batch(&[(token.as_bytes().to_vec(), encoded_postings)])?;
        self.token_doc_count.write_batch(&[(token.as_bytes().to_vec(), encoded_count)])?;
        Ok(())
    }

    pub fn token_count(&self) -> usize {
        self.token_postings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId;
    use crate::index::posting::Posting;
    use tempfile::tempdir;

    #[test]
    fn merge_and_store_accumulates_postings_and_doc_count() {
        let dir = tempdir().unwrap();
        let store = PostingsStore::open(dir.path()).unwrap();

        let first = PostingsList(vec![Posting::new(DocId::new(1), 0, vec![0, 1])]);
        store.merge_and_store("he", &first, 1).unwrap();

        let second = PostingsList(vec![Posting::new(DocId::new(2), 0, vec![3])]);
        store.merge_and_store("he", &second, 1).unwrap();

        let stored = store.postings("he").unwrap().unwrap();
        let ids: Vec<u64> = stored.iter().map(|p| p.doc_id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.doc_count("he").unwrap(), 2);
    }

    #[test]
    fn unknown_token_has_no_postings_and_zero_count() {
        let dir = tempdir().unwrap();
        let store = PostingsStore::open(dir.path()).unwrap();
        assert!(store.postings("zz").unwrap().is_none());
        assert_eq!(store.doc_count("zz").unwrap(), 0);
    }
}
