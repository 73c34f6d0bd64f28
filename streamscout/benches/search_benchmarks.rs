use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::num::{NonZeroU64, NonZeroUsize};
use std::sync::Arc;
use streamscout::search::TermMatcher;
use streamscout::{Input, MemoryInput, SearchConfig, StreamSearcher};

fn create_input(len: usize) -> Arc<dyn Input> {
    let mut bytes: Vec<u8> = (0..len)
        .map(|i| if i % 500 == 499 { b'\n' } else { b'a' + (i % 26) as u8 })
        .collect();
    let mut pos = 1553;
    while pos + 6 < len {
        bytes[pos..pos + 6].copy_from_slice(b"Leapfn");
        pos += 1553 * 71;
    }
    Arc::new(MemoryInput::new(bytes))
}

fn bench_worker_counts(c: &mut Criterion) {
    let input = create_input(16 * 1024 * 1024);
    let mut group = c.benchmark_group("worker_count");

    for workers in [1usize, 2, 4, 8] {
        let config = SearchConfig {
            search_term: "Leapfn".to_string(),
            worker_count: NonZeroUsize::new(workers).unwrap(),
            timeout_ms: 60_000,
            ..SearchConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(workers), &config, |b, config| {
            b.iter(|| {
                let searcher = StreamSearcher::with_input(config, Arc::clone(&input)).unwrap();
                black_box(searcher.search().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let input = create_input(16 * 1024 * 1024);
    let mut group = c.benchmark_group("chunk_size");

    for chunk in [64 * 1024u64, 1024 * 1024, 4 * 1024 * 1024] {
        let config = SearchConfig {
            search_term: "Leapfn".to_string(),
            worker_count: NonZeroUsize::new(4).unwrap(),
            timeout_ms: 60_000,
            chunk_size: NonZeroU64::new(chunk),
            ..SearchConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &config, |b, config| {
            b.iter(|| {
                let searcher = StreamSearcher::with_input(config, Arc::clone(&input)).unwrap();
                black_box(searcher.search().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_matcher(c: &mut Criterion) {
    let haystack = vec![b'x'; 4 * 1024 * 1024];

    let literal = TermMatcher::literal("Leapfn").unwrap();
    c.bench_function("matcher_literal_miss", |b| {
        b.iter(|| black_box(literal.find(black_box(&haystack))))
    });

    let regex = TermMatcher::new(r"Le+apfn", true).unwrap();
    c.bench_function("matcher_regex_miss", |b| {
        b.iter(|| black_box(regex.find(black_box(&haystack))))
    });
}

criterion_group!(benches, bench_worker_counts, bench_chunk_sizes, bench_matcher);
criterion_main!(benches);
