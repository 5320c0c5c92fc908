//! Throughput benchmarks for the recordhub engine.
//!
//! Exercises the engine directly (no HTTP hop) against an in-memory
//! `MemoryKv`, the way a capacity-planning run against a real substrate
//! would, minus the network.

mod benchmarks;
mod cli;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::BaselineRead { iterations, record_count } => {
            benchmarks::baseline_read::run_baseline_read_test(iterations, record_count).await;
        }
        Commands::WriteThroughput { iterations } => {
            benchmarks::write_throughput::run_write_throughput_test(iterations).await;
        }
        Commands::MixedWorkload { operations, read_percent, record_count } => {
            if read_percent > 100 {
                eprintln!("Error: read_percent must be between 0 and 100");
                std::process::exit(1);
            }
            benchmarks::mixed_workload::run_mixed_workload_test(operations, read_percent, record_count).await;
        }
        Commands::All => {
            benchmarks::baseline_read::run_baseline_read_test(100_000, 10_000).await;
            benchmarks::write_throughput::run_write_throughput_test(10_000).await;
            benchmarks::mixed_workload::run_mixed_workload_test(50_000, 80, 5_000).await;
        }
    }
}
