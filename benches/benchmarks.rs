//! Benchmarks for encoder construction and lookups.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fhir_tx_encoder::properties::attributes;
use fhir_tx_encoder::{
    Coding, DictVectorizer, EncoderConfig, OfflineTerminology, TerminologyEncoder,
};
use ndarray::Array2;
use serde_json::json;

// =============================================================================
// Synthetic terminology: a binary is-a tree
// =============================================================================

const CODES: usize = 2_000;

fn code(i: usize) -> String {
    format!("C{:05}", i)
}

fn terminology() -> OfflineTerminology {
    let codings = (0..CODES)
        .map(|i| {
            let status = if i % 3 == 0 { "retired" } else { "active" };
            Coding::new(code(i))
                .with_property(json!({"code": "status", "valueCode": status}))
                .with_property(json!({"code": "depth", "valueInteger": (i + 1).ilog2()}))
        })
        .collect();
    (1..CODES).fold(OfflineTerminology::new(codings), |tx, i| {
        tx.with_parent(code(i), code((i - 1) / 2))
    })
}

fn config() -> EncoderConfig {
    EncoderConfig::new("http://example.org/fhir/ValueSet/bench").with_batch_size(250)
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    group.bench_function("subsumption_only", |b| {
        b.iter(|| {
            let tx = terminology();
            TerminologyEncoder::with_client(&tx, black_box(&config())).expect("build")
        })
    });

    group.bench_function("with_properties", |b| {
        let config = config().with_properties(["*"]);
        b.iter(|| {
            let tx = terminology();
            TerminologyEncoder::with_client(&tx, black_box(&config)).expect("build")
        })
    });

    group.finish();
}

fn benchmark_vectorize(c: &mut Criterion) {
    let samples: Vec<_> = (0..CODES)
        .map(|i| {
            attributes(
                &Coding::new(code(i))
                    .with_property(json!({"code": "status", "valueCode": "active"}))
                    .with_property(json!({"code": "depth", "valueInteger": i % 11})),
            )
        })
        .collect();
    let vectorizer = DictVectorizer::new();

    c.bench_function("dict_vectorize", |b| {
        b.iter(|| vectorizer.fit_transform(black_box(&samples)))
    });
}

fn benchmark_lookup(c: &mut Criterion) {
    let tx = terminology();
    let encoder = TerminologyEncoder::with_client(&tx, &config()).expect("build");
    let column: Vec<String> = (0..1_000).map(|i| code((i * 7) % CODES)).collect();
    let table = Array2::from_shape_fn((500, 4), |(r, k)| code((r * 13 + k * 101) % CODES));

    c.bench_function("transform_column", |b| {
        b.iter(|| encoder.transform_column(black_box(&column)).expect("lookup"))
    });

    c.bench_function("transform", |b| {
        b.iter(|| encoder.transform(black_box(table.view().into_dyn())).expect("lookup"))
    });
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_vectorize,
    benchmark_lookup,
);
criterion_main!(benches);
