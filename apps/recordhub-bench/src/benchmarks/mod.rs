pub mod baseline_read;
pub mod mixed_workload;
pub mod write_throughput;
