//! Benchmarks for the hot paths of a caption request.
//!
//! Run with: cargo bench -p captionist-core

use captionist_core::config::RateLimitConfig;
use captionist_core::pipeline::content_hash;
use captionist_core::provider::{build_prompt, parse_response};
use captionist_core::RateLimiter;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_rate_limiter(c: &mut Criterion) {
    let limiter = RateLimiter::new(&RateLimitConfig {
        bucket_size: 1_000_000,
        refill_rate: 1_000_000.0,
    });

    c.bench_function("rate_limiter_single_user", |b| {
        b.iter(|| limiter.is_allowed(black_box("user_bench")))
    });

    let users: Vec<String> = (0..1000).map(|i| format!("user_{i}")).collect();
    let mut next = 0usize;
    c.bench_function("rate_limiter_1000_users", |b| {
        b.iter(|| {
            next = (next + 1) % users.len();
            limiter.is_allowed(black_box(&users[next]))
        })
    });
}

fn benchmark_parse_response(c: &mut Criterion) {
    let labelled = "CONCISE: A dog catching a frisbee in a park\n\
                    CREATIVE: Mid-leap, a golden retriever snatches the afternoon out of the air.";
    let unlabelled = "A dog catching a frisbee in a park\nThe grass is freshly cut and the sky is clear.";

    c.bench_function("parse_response_labelled", |b| {
        b.iter(|| parse_response(black_box(labelled)))
    });
    c.bench_function("parse_response_fallback", |b| {
        b.iter(|| parse_response(black_box(unlabelled)))
    });
}

fn benchmark_build_prompt(c: &mut Criterion) {
    let labels: Vec<String> = ["Dog", "Frisbee", "Grass", "Park", "Sky", "Tree"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    c.bench_function("build_prompt_with_labels", |b| {
        b.iter(|| build_prompt(black_box(&labels)))
    });
}

fn benchmark_content_hash(c: &mut Criterion) {
    let bytes = vec![0xA5u8; 1024 * 1024];

    c.bench_function("content_hash_1mb", |b| {
        b.iter(|| content_hash(black_box(&bytes)))
    });
}

criterion_group!(
    benches,
    benchmark_rate_limiter,
    benchmark_parse_response,
    benchmark_build_prompt,
    benchmark_content_hash
);
criterion_main!(benches);
