use std::sync::Arc;
use std::time::Instant;

use recordhub_core::kv::MemoryKv;
use recordhub_core::Config;
use recordhub_engine::Engine;
use serde_json::json;

/// Measure create throughput against a fresh collection.
pub async fn run_write_throughput_test(iterations: usize) {
    println!("Running write throughput test...");
    println!("Iterations: {iterations}");

    let engine = Engine::new(Arc::new(MemoryKv::new()), Config::default());

    println!("Starting write benchmark...");
    let start = Instant::now();
    for i in 0..iterations {
        let result = engine
            .create("bench_write", json!({"n": i}).as_object().unwrap().clone())
            .await;
        let _ = std::hint::black_box(result);
    }
    let elapsed = start.elapsed();

    let writes_per_sec = if elapsed.as_secs_f64() == 0.0 {
        0.0
    } else {
        iterations as f64 / elapsed.as_secs_f64()
    };

    println!("Results:");
    println!("  Total time: {elapsed:?}");
    println!("  Writes per second: {writes_per_sec:.2}");

    engine.shutdown().await;
}
