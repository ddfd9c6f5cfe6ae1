use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meridian::core::types::DocId;
use meridian::index::posting::{Posting, PostingsList};
use meridian::index::postings_codec::{decode, encode};
use rand::Rng;

/// Builds a strictly-ascending postings list of `count` postings, each with
/// `positions_per_doc` random positions split roughly half title/half body.
fn build_postings_list(count: u64, positions_per_doc: usize) -> PostingsList {
    let mut rng = rand::thread_rng();
    let mut postings = Vec::with_capacity(count as usize);
    for doc_id in 0..count {
        let mut positions: Vec<u32> = (0..positions_per_doc).map(|_| rng.gen_range(0..5_000)).collect();
        positions.sort_unstable();
        let title_end = positions_per_doc / 2;
        postings.push(Posting::new(DocId::new(doc_id), title_end, positions));
    }
    PostingsList(postings)
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("postings_encode");
    for doc_count in [10u64, 100, 1_000, 10_000].iter() {
        let list = build_postings_list(*doc_count, 8);
        group.bench_with_input(BenchmarkId::from_parameter(doc_count), doc_count, |b, _| {
            b.iter(|| black_box(encode(&list).unwrap()));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("postings_decode");
    for doc_count in [10u64, 100, 1_000, 10_000].iter() {
        let list = build_postings_list(*doc_count, 8);
        let encoded = encode(&list).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(doc_count), doc_count, |b, _| {
            b.iter(|| black_box(decode(&encoded).unwrap()));
        });
    }
    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let list = build_postings_list(5_000, 8);
    c.bench_function("postings_round_trip_5000_docs", |b| {
        b.iter(|| {
            let encoded = encode(&list).unwrap();
            black_box(decode(&encoded).unwrap());
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_round_trip);
criterion_main!(benches);
