//! Validation pipeline benchmark
//!
//! Target: typical manifest well under 100ms, 100 manifests under 1s

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lms_validator::{PipelineConfig, ValidationPipeline, ValidationStats};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn scene(i: usize, turns: usize, text: &str) -> Value {
    json!({
        "type": "dialogue",
        "scene_id": format!("scene-{i}"),
        "title": "At the service desk",
        "duration": 60,
        "characters": [{"id": "kari", "name": "Kari", "role": "Case officer"}],
        "dialogue": (0..turns)
            .map(|_| json!({"speaker": "Kari", "character_id": "kari", "text": text}))
            .collect::<Vec<_>>()
    })
}

fn manifest(scenes: usize, turns: usize, text: &str) -> String {
    let doc = json!({
        "id": "bench",
        "version": "1.0.0",
        "title": "Benchmark module",
        "description": "Synthetic content",
        "target_audience": "Everyone",
        "learning_objectives": ["Measure"],
        "scenes": (0..scenes).map(|i| scene(i, turns, text)).collect::<Vec<_>>(),
        "total_duration": scenes * 60,
        "difficulty": "beginner",
        "language": "en"
    });
    doc.to_string()
}

fn pipeline() -> ValidationPipeline {
    // Rejections log at warn; keep the default quiet while measuring
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "error".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    match ValidationPipeline::new(PipelineConfig::default(), Arc::new(ValidationStats::new())) {
        Ok(p) => p,
        Err(e) => panic!("pipeline failed to build: {e}"),
    }
}

fn validation_benchmark(c: &mut Criterion) {
    let pipeline = pipeline();
    let mut group = c.benchmark_group("validate");

    let clean = manifest(4, 10, "Remember to lock your screen before leaving the desk.");
    group.bench_function("clean", |b| b.iter(|| black_box(pipeline.validate_str(black_box(&clean)))));

    let hostile = manifest(4, 10, "Hi <script>steal()</script><img src=x onerror=alert(1)> there");
    group.bench_function("sanitized", |b| {
        b.iter(|| black_box(pipeline.validate_str(black_box(&hostile))))
    });

    let deep = "[".repeat(100_000);
    group.bench_function("deep_nesting", |b| b.iter(|| black_box(pipeline.validate_str(black_box(&deep)))));

    group.finish();
}

fn scaling_benchmark(c: &mut Criterion) {
    let pipeline = pipeline();
    let mut group = c.benchmark_group("validate_scaling");
    group.sample_size(10);

    for scenes in [1usize, 10, 100] {
        let doc = manifest(scenes, 100, &"Personvern gjelder alle innbyggere. ".repeat(10));
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(scenes), &doc, |b, doc| {
            b.iter(|| black_box(pipeline.validate_str(doc)))
        });
    }

    group.finish();
}

fn batch_benchmark(c: &mut Criterion) {
    let pipeline = pipeline();
    let docs: Vec<String> = (0..100).map(|_| manifest(1, 1, "Good morning.")).collect();

    c.bench_function("batch_100", |b| b.iter(|| black_box(pipeline.validate_batch(black_box(&docs)))));
}

criterion_group!(benches, validation_benchmark, scaling_benchmark, batch_benchmark);
criterion_main!(benches);
