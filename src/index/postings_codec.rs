//! On-disk binary format for a token's stored postings.
//!
//! Each posting is written consecutively with no framing:
//! `varint(docId) varint(positionCount) varint(titleEnd) varint(pos_0) ... varint(pos_{positionCount-1})`.
//! The stored value for a token is the concatenation of its postings in
//! ascending docId order. Decoding stops at the end of the buffer.

use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use crate::index::posting::{Posting, PostingsList};

/// Encode a single posting onto `output`.
pub fn encode_posting(output: &mut Vec<u8>, posting: &Posting) -> Result<()> {
    VByteEncoder::encode_u64(output, posting.doc_id.value())?;
    VByteEncoder::encode_u32(output, posting.positions.len() as u32)?;
    VByteEncoder::encode_u32(output, posting.title_end as u32)?;
    for &pos in &posting.positions {
        VByteEncoder::encode_u32(output, pos)?;
    }
    Ok(())
}

/// Encode an entire postings list.
pub fn encode(list: &PostingsList) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    for posting in list.iter() {
        encode_posting(&mut output, posting)?;
    }
    Ok(output)
}

/// Decode result: the full postings list plus a cheap head/count summary
/// so callers can update a token's document-count cache without re-scanning.
pub struct Decoded {
    pub list: PostingsList,
    pub head: Option<Posting>,
    pub count: usize,
}

/// Decode a complete buffer, failing with `CorruptPostings` if a varint read
/// advances past the buffer end or docIds are not strictly ascending.
pub fn decode(input: &[u8]) -> Result<Decoded> {
    let mut postings = Vec::new();
    let mut pos = 0usize;

    while pos < input.len() {
        let (doc_id_raw, consumed) = VByteEncoder::decode_u64(&input[pos..])
            .map_err(|_| Error::new(ErrorKind::CorruptPostings, "truncated docId varint".to_string()))?;
        pos += consumed;

        let (position_count, consumed) = VByteEncoder::decode_u32(&input[pos..])
            .map_err(|_| Error::new(ErrorKind::CorruptPostings, "truncated positionCount varint".to_string()))?;
        pos += consumed;

        let (title_end, consumed) = VByteEncoder::decode_u32(&input[pos..])
            .map_err(|_| Error::new(ErrorKind::CorruptPostings, "truncated titleEnd varint".to_string()))?;
        pos += consumed;

        if title_end as u32 > position_count {
            return Err(Error::new(ErrorKind::CorruptPostings, "titleEnd exceeds positionCount".to_string()));
        }

        let mut positions = Vec::with_capacity(position_count as usize);
        for _ in 0..position_count {
            if pos >= input.len() {
                return Err(Error::new(ErrorKind::CorruptPostings, "buffer ended mid-position-list".to_string()));
            }
            let (value, consumed) = VByteEncoder::decode_u32(&input[pos..])
                .map_err(|_| Error::new(ErrorKind::CorruptPostings, "truncated position varint".to_string()))?;
            pos += consumed;
            positions.push(value);
        }

        let doc_id = DocId::new(doc_id_raw);
        if let Some(prev) = postings.last() {
            let prev: &Posting = prev;
            if doc_id <= prev.doc_id {
                return Err(Error::new(
                    ErrorKind::CorruptPostings,
                    format!("docIds not strictly ascending: {} after {}", doc_id, prev.doc_id),
                ));
            }
        }

        postings.push(Posting::new(doc_id, title_end as usize, positions));
    }

    let head = postings.first().cloned();
    let count = postings.len();
    Ok(Decoded { list: PostingsList(postings), head, count })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(doc_id: u64, title_end: usize, positions: Vec<u32>) -> Posting {
        Posting::new(DocId(doc_id), title_end, positions)
    }

    #[test]
    fn round_trips_a_postings_list() {
        let list = PostingsList(vec![
            p(1, 1, vec![0, 5, 9]),
            p(4, 0, vec![2, 3]),
            p(900, 2, vec![1, 2, 3, 4]),
        ]);
        let encoded = encode(&list).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.list, list);
        assert_eq!(decoded.count, 3);
        assert_eq!(decoded.head.unwrap().doc_id, DocId(1));
    }

    #[test]
    fn empty_list_round_trips_to_empty() {
        let list = PostingsList::new();
        let encoded = encode(&list).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.list.is_empty());
        assert_eq!(decoded.count, 0);
        assert!(decoded.head.is_none());
    }

    #[test]
    fn non_monotonic_doc_ids_are_corrupt() {
        let mut buf = Vec::new();
        encode_posting(&mut buf, &p(5, 0, vec![1])).unwrap();
        encode_posting(&mut buf, &p(5, 0, vec![2])).unwrap();
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CorruptPostings));
    }

    #[test]
    fn truncated_buffer_is_corrupt() {
        let mut buf = Vec::new();
        encode_posting(&mut buf, &p(1, 0, vec![1, 2, 3])).unwrap();
        buf.truncate(buf.len() - 1);
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CorruptPostings));
    }
}
