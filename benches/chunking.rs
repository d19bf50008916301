use criterion::{Criterion, criterion_group, criterion_main};
use karrybot::documents::split_pages;
use karrybot::embeddings::{ChunkingConfig, TextSplitter};
use std::hint::black_box;

/// A resume-sized document: form-feed separated pages of short paragraphs
fn sample_document() -> String {
    (1..=12)
        .map(|page| {
            (0..15)
                .map(|paragraph| {
                    format!(
                        "Page {page}, section {paragraph}. Karthik led the migration of a \
                         payments platform to Rust, cutting p99 latency in half while the \
                         team grew from four to eleven engineers.\nHe mentored new hires \
                         and owned the on-call rotation."
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .collect::<Vec<_>>()
        .join("\x0C")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = sample_document();
    let text = split_pages(&document).join("\n\n");

    let splitter = TextSplitter::new(ChunkingConfig::default()).expect("default config is valid");
    c.bench_function("chunking", |b| {
        b.iter(|| splitter.split_text(black_box(&text)))
    });

    let small = TextSplitter::new(ChunkingConfig {
        chunk_size: 200,
        chunk_overlap: 40,
    })
    .expect("config is valid");
    c.bench_function("chunking_small_chunks", |b| {
        b.iter(|| small.split_text(black_box(&text)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
