//! Document store: two buckets, `doc_url` (ASCII decimal docId -> url) and
//! `doc_detail` (ASCII decimal docId -> `varint(titleLen) ‖ title ‖ body`).
//! docId is a monotonically increasing sequence owned by this store.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document};
use crate::store::kv_log::Bucket;

pub struct DocumentStore {
    doc_url: Bucket,
    doc_detail: Bucket,
    next_doc_id: AtomicU64,
}

impl DocumentStore {
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let doc_url = Bucket::open(base_dir.join("doc_url.log"))?;
        let doc_detail = Bucket::open(base_dir.join("doc_detail.log"))?;
        let next_doc_id = AtomicU64::new(doc_url.len() as u64);
        Ok(DocumentStore { doc_url, doc_detail, next_doc_id })
    }

    /// Assigns a fresh docId and persists `(url, title, body)` under it.
    /// Never mutated or deleted thereafter.
    pub fn insert(&self, url: &str, title: &str, body: &str) -> Result<DocId> {
        let doc_id = DocId::new(self.next_doc_id.fetch_add(1, Ordering::SeqCst));
        let key = doc_id.value().to_string().into_bytes();

        self.doc_url.put(&key, url.as_bytes())?;

        let mut detail = Vec::new();
        VByteEncoder::encode_u32(&mut detail, title.len() as u32)?;
        detail.extend_from_slice(title.as_bytes());
        detail.extend_from_slice(body.as_bytes());
        self.doc_detail.put(&key, &detail)?;

        Ok(doc_id)
    }

    pub fn url(&self, doc_id: DocId) -> Result<Option<String>> {
        let key = doc_id.value().to_string().into_bytes();
        Ok(self.doc_url.get(&key)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn get(&self, doc_id: DocId) -> Result<Option<Document>> {
        let key = doc_id.value().to_string().into_bytes();
        let Some(detail) = self.doc_detail.get(&key)? else { return Ok(None) };
        let (title_len, consumed) = VByteEncoder::decode_u32(&detail)
            .map_err(|_| Error::new(ErrorKind::DecodeError, "truncated titleLen in doc_detail".to_string()))?;
        let title_start = consumed;
        let title_end = title_start + title_len as usize;
        if title_end > detail.len() {
            return Err(Error::new(ErrorKind::DecodeError, "doc_detail shorter than titleLen".to_string()));
        }
        let title = String::from_utf8_lossy(&detail[title_start..title_end]).into_owned();
        let body = String::from_utf8_lossy(&detail[title_end..]).into_owned();
        let url = self.url(doc_id)?.unwrap_or_default();
        Ok(Some(Document::new(doc_id, url, title, body)))
    }

    pub fn indexed_doc_count(&self) -> u64 {
        self.doc_url.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insert_assigns_monotonic_doc_ids_and_round_trips() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let a = store.insert("http://a", "Title A", "Body A").unwrap();
        let b = store.insert("http://b", "Title B", "Body B").unwrap();
        assert!(b.value() > a.value());

        let doc = store.get(a).unwrap().unwrap();
        assert_eq!(doc.url, "http://a");
        assert_eq!(doc.title, "Title A");
        assert_eq!(doc.body, "Body A");
    }

    #[test]
    fn unknown_doc_id_returns_none() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        assert!(store.get(DocId::new(999)).unwrap().is_none());
    }
}
