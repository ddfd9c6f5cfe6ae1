//! In-memory merge buffer sitting between the indexer workers and the
//! flush stage: `token -> TokenIndexItem{documentCount, positionsCount, postings}`.

use std::collections::HashMap;

use crate::index::posting::{Posting, PostingsList};

#[derive(Debug, Clone, Default)]
pub struct TokenIndexItem {
    pub document_count: u64,
    pub positions_count: u64,
    pub postings: PostingsList,
}

impl TokenIndexItem {
    pub fn single(posting: Posting) -> Self {
        let positions_count = posting.positions.len() as u64;
        TokenIndexItem {
            document_count: 1,
            positions_count,
            postings: PostingsList(vec![posting]),
        }
    }

    /// Merge rule for a token already present in the buffer:
    /// `documentCount += new.documentCount; positionsCount += new.positionsCount;
    /// postings = ordered merge by ascending docId`.
    pub fn merge(&mut self, new: &TokenIndexItem) {
        self.document_count += new.document_count;
        self.positions_count += new.positions_count;
        self.postings = self.postings.merge(&new.postings);
    }
}

/// The buffer a single indexer-side merger owns between flushes. Not
/// thread-safe on its own — the merger is the sole writer, guarded by the
/// pipeline's single-task-per-stage discipline rather than an internal lock.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    items: HashMap<String, TokenIndexItem>,
    /// Total count of per-document token contributions merged in since the
    /// buffer was last detached for flushing; compared against the flush
    /// threshold to decide when to rotate.
    index_count: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index_count(&self) -> u64 {
        self.index_count
    }

    pub fn get(&self, token: &str) -> Option<&TokenIndexItem> {
        self.items.get(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&String, &TokenIndexItem)> {
        self.items.iter()
    }

    /// Merge a per-document `(token -> TokenIndexItem)` map produced by one
    /// indexer worker into this buffer.
    pub fn merge_document(&mut self, per_doc: HashMap<String, TokenIndexItem>) {
        for (token, item) in per_doc {
            self.index_count += 1;
            match self.items.get_mut(&token) {
                Some(existing) => existing.merge(&item),
                None => {
                    self.items.insert(token, item);
                }
            }
        }
    }

    /// Atomically detach the current contents, leaving an empty buffer in
    /// their place. The merger calls this once `index_count` crosses the
    /// configured flush threshold.
    pub fn detach(&mut self) -> InvertedIndex {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId;

    fn posting(doc_id: u64, positions: Vec<u32>) -> Posting {
        Posting::new(DocId(doc_id), 0, positions)
    }

    #[test]
    fn merging_same_token_twice_sums_counts_and_merges_postings() {
        let mut buffer = InvertedIndex::new();

        let mut first = HashMap::new();
        first.insert("he".to_string(), TokenIndexItem::single(posting(1, vec![0, 4])));
        buffer.merge_document(first);

        let mut second = HashMap::new();
        second.insert("he".to_string(), TokenIndexItem::single(posting(2, vec![1])));
        buffer.merge_document(second);

        let item = buffer.get("he").unwrap();
        assert_eq!(item.document_count, 2);
        assert_eq!(item.positions_count, 3);
        let ids: Vec<u64> = item.postings.iter().map(|p| p.doc_id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn detach_leaves_an_empty_buffer_behind() {
        let mut buffer = InvertedIndex::new();
        let mut per_doc = HashMap::new();
        per_doc.insert("ab".to_string(), TokenIndexItem::single(posting(1, vec![0])));
        buffer.merge_document(per_doc);

        let detached = buffer.detach();
        assert!(!detached.is_empty());
        assert!(buffer.is_empty());
        assert_eq!(buffer.index_count(), 0);
    }
}
