//! Benchmarks for structured output recovery.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crewflow::core::parse_structured;

const PURE: &str = r#"{"title": "Export", "as_a": "analyst", "i_want": "CSV export", "so_that": "I can share reports"}"#;

const EMBEDDED: &str = "Here is the skeleton you asked for:\n```json\n{\"title\": \"Export\", \"as_a\": \"analyst\", \"i_want\": \"CSV export\", \"so_that\": \"I can share reports\"}\n```\nLet me know if anything is missing.";

const PROSE: &str = "The story describes an analyst who wants to export reports. \
                     No structure here, only prose that mentions {braces} in passing.";

fn structured_benchmark(c: &mut Criterion) {
    c.bench_function("parse_structured/pure", |b| {
        b.iter(|| parse_structured(black_box(PURE)));
    });
    c.bench_function("parse_structured/embedded", |b| {
        b.iter(|| parse_structured(black_box(EMBEDDED)));
    });
    c.bench_function("parse_structured/prose", |b| {
        b.iter(|| parse_structured(black_box(PROSE)));
    });
}

criterion_group!(benches, structured_benchmark);
criterion_main!(benches);
