use crate::core::types::DocId;

/// One document's occurrences of a single token.
///
/// `positions` is the concatenation of title positions then body positions;
/// `positions[..title_end]` is the title slice, `positions[title_end..]` is
/// the body slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub title_end: usize,
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc_id: DocId, title_end: usize, positions: Vec<u32>) -> Self {
        debug_assert!(title_end <= positions.len());
        Posting { doc_id, title_end, positions }
    }

    pub fn title_positions(&self) -> &[u32] {
        &self.positions[..self.title_end]
    }

    pub fn body_positions(&self) -> &[u32] {
        &self.positions[self.title_end..]
    }

    /// Term frequency in this document, the raw input to the `1 + log(tf)` scoring term.
    pub fn term_freq(&self) -> usize {
        self.positions.len()
    }
}

/// Ordered sequence of postings for one token. Strictly ascending by
/// `doc_id`; no two entries share a `doc_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingsList(pub Vec<Posting>);

impl PostingsList {
    pub fn new() -> Self {
        PostingsList(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.0.iter()
    }

    /// Ordered merge of two postings lists: strictly ascending by `doc_id`,
    /// with `other` winning on a tie. The merge pipeline only ever merges a
    /// fresh per-document posting into a buffer that cannot yet contain that
    /// `doc_id`, but the routine stays a general ordered merge.
    pub fn merge(&self, other: &PostingsList) -> PostingsList {
        let mut merged = Vec::with_capacity(self.0.len() + other.0.len());
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.0, &other.0);
        while i < a.len() && j < b.len() {
            match a[i].doc_id.cmp(&b[j].doc_id) {
                std::cmp::Ordering::Less => {
                    merged.push(a[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(b[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push(b[j].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&a[i..]);
        merged.extend_from_slice(&b[j..]);
        PostingsList(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(doc_id: u64, positions: Vec<u32>) -> Posting {
        Posting::new(DocId(doc_id), 0, positions)
    }

    #[test]
    fn merge_is_strictly_ascending_and_union_of_doc_ids() {
        let p1 = PostingsList(vec![
            p(5, vec![1, 2, 3]),
            p(6, vec![4, 6, 8]),
            p(7, vec![6, 7, 8]),
        ]);
        let p2 = PostingsList(vec![
            p(0, vec![1, 2, 3]),
            p(1, vec![4, 6, 8]),
            p(2, vec![6, 7, 8]),
        ]);
        let merged = p1.merge(&p2);
        let ids: Vec<u64> = merged.0.iter().map(|p| p.doc_id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 5, 6, 7]);
    }

    #[test]
    fn merge_resolves_ties_with_other_winning() {
        let a = PostingsList(vec![p(1, vec![1])]);
        let b = PostingsList(vec![p(1, vec![2, 3])]);
        let merged = a.merge(&b);
        assert_eq!(merged.0.len(), 1);
        assert_eq!(merged.0[0].positions, vec![2, 3]);
    }
}
