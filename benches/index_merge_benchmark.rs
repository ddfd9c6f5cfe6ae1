use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meridian::core::types::DocId;
use meridian::index::inverted::{InvertedIndex, TokenIndexItem};
use meridian::index::posting::Posting;
use rand::Rng;

const ALPHABET: &[char] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w',
    'x', 'y', 'z',
];

/// A per-document token map as produced by one indexer worker: `tokens_per_doc`
/// distinct two-letter tokens, each with a handful of positions.
fn build_per_doc(doc_id: u64, tokens_per_doc: usize) -> HashMap<String, TokenIndexItem> {
    let mut rng = rand::thread_rng();
    let mut per_doc = HashMap::with_capacity(tokens_per_doc);
    for _ in 0..tokens_per_doc {
        let a = ALPHABET[rng.gen_range(0..ALPHABET.len())];
        let b = ALPHABET[rng.gen_range(0..ALPHABET.len())];
        let token: String = [a, b].iter().collect();
        let positions = vec![rng.gen_range(0..200), rng.gen_range(0..200)];
        per_doc.insert(token, TokenIndexItem::single(Posting::new(DocId::new(doc_id), 1, positions)));
    }
    per_doc
}

fn bench_merge_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("inverted_index_merge_document");
    for doc_count in [100u64, 1_000, 5_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(doc_count), doc_count, |b, &doc_count| {
            b.iter(|| {
                let mut buffer = InvertedIndex::new();
                for doc_id in 0..doc_count {
                    buffer.merge_document(build_per_doc(doc_id, 20));
                }
                black_box(buffer.index_count());
            });
        });
    }
    group.finish();
}

fn bench_detach(c: &mut Criterion) {
    c.bench_function("inverted_index_detach_5000_docs", |b| {
        b.iter_with_setup(
            || {
                let mut buffer = InvertedIndex::new();
                for doc_id in 0..5_000u64 {
                    buffer.merge_document(build_per_doc(doc_id, 20));
                }
                buffer
            },
            |mut buffer| black_box(buffer.detach()),
        );
    });
}

criterion_group!(benches, bench_merge_document, bench_detach);
criterion_main!(benches);
