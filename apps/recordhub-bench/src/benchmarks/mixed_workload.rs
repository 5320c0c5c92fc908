use std::sync::Arc;
use std::time::Instant;

use recordhub_core::kv::MemoryKv;
use recordhub_core::Config;
use recordhub_engine::Engine;
use serde_json::json;

/// Run a mixed read/update workload against a pre-populated collection.
pub async fn run_mixed_workload_test(operations: usize, read_percent: u8, record_count: usize) {
    println!("Running mixed workload test...");
    println!("Operations: {operations}, read percent: {read_percent}, records: {record_count}");

    if record_count == 0 {
        eprintln!("Error: record_count must be greater than 0");
        std::process::exit(1);
    }

    let engine = Engine::new(Arc::new(MemoryKv::new()), Config::default());

    let mut ids = Vec::with_capacity(record_count);
    for i in 0..record_count {
        let record = engine
            .create("bench_mixed", json!({"n": i}).as_object().unwrap().clone())
            .await
            .expect("create during pre-population");
        ids.push(record.id().expect("created record has an id").to_string());
    }

    println!("Starting mixed workload benchmark...");
    let start = Instant::now();
    for i in 0..operations {
        let id = &ids[i % ids.len()];
        if (i % 100) < read_percent as usize {
            let result = engine.get("bench_mixed", id).await;
            let _ = std::hint::black_box(result);
        } else {
            let patch = json!({"n": i}).as_object().unwrap().clone();
            let result = engine.update("bench_mixed", id, patch, None).await;
            let _ = std::hint::black_box(result);
        }
    }
    let elapsed = start.elapsed();

    let ops_per_sec = if elapsed.as_secs_f64() == 0.0 {
        0.0
    } else {
        operations as f64 / elapsed.as_secs_f64()
    };

    println!("Results:");
    println!("  Total time: {elapsed:?}");
    println!("  Operations per second: {ops_per_sec:.2}");

    engine.shutdown().await;
}
