//! Benchmarks for token accounting and context compression

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use onboardbuddy::context::{ContextCompressor, TokenAccountant};
use onboardbuddy::types::Message;

fn conversation(turns: usize) -> Vec<Message> {
    let mut history = vec![Message::system("You are the onboarding assistant for new hires.")];
    for i in 0..turns {
        history.push(Message::user(format!("Question {} about benefits enrollment and badge access", i)));
        history.push(Message::assistant(format!(
            "Answer {}: {}",
            i,
            "See the onboarding handbook, section four. ".repeat(8)
        )));
    }
    history
}

fn bench_count_tokens(c: &mut Criterion) {
    let accountant = TokenAccountant::new();
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(200);

    c.bench_function("count_tokens_9k_chars", |b| {
        b.iter(|| accountant.count_tokens(black_box(&text)))
    });

    let history = conversation(50);
    c.bench_function("count_message_sequence_101", |b| {
        b.iter(|| accountant.count_message_sequence_tokens(black_box(&history)))
    });
}

fn bench_compress(c: &mut Criterion) {
    let compressor = ContextCompressor::default();
    let mut group = c.benchmark_group("compress");

    for turns in [10, 100, 1_000] {
        let history = conversation(turns);
        group.bench_with_input(BenchmarkId::from_parameter(turns), &history, |b, history| {
            b.iter(|| compressor.compress(black_box(history), Some(4_000)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_count_tokens, bench_compress);
criterion_main!(benches);
