use std::sync::Arc;
use std::time::Instant;

use recordhub_core::kv::MemoryKv;
use recordhub_core::Config;
use recordhub_engine::Engine;
use serde_json::json;

/// Create `record_count` records, then measure cached read throughput.
pub async fn run_baseline_read_test(iterations: usize, record_count: usize) {
    println!("Running baseline read throughput test...");
    println!("Iterations: {iterations}, pre-populated records: {record_count}");

    if record_count == 0 {
        eprintln!("Error: record_count must be greater than 0");
        std::process::exit(1);
    }

    let engine = Engine::new(Arc::new(MemoryKv::new()), Config::default());

    println!("Pre-populating {record_count} records...");
    let mut ids = Vec::with_capacity(record_count);
    for i in 0..record_count {
        let record = engine
            .create("bench_read", json!({"n": i}).as_object().unwrap().clone())
            .await
            .expect("create during pre-population");
        ids.push(record.id().expect("created record has an id").to_string());
    }

    // Warm the cache so the benchmark measures cache hits, not misses.
    for id in &ids {
        let _ = engine.get("bench_read", id).await;
    }

    println!("Starting read benchmark...");
    let start = Instant::now();
    for i in 0..iterations {
        let id = &ids[i % ids.len()];
        let result = engine.get("bench_read", id).await;
        let _ = std::hint::black_box(result);
    }
    let elapsed = start.elapsed();

    let reads_per_sec = if elapsed.as_secs_f64() == 0.0 {
        0.0
    } else {
        iterations as f64 / elapsed.as_secs_f64()
    };

    println!("Results:");
    println!("  Total time: {elapsed:?}");
    println!("  Reads per second: {reads_per_sec:.2}");
}
