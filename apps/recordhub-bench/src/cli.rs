use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create N records, then measure cached read throughput.
    BaselineRead {
        /// Number of reads to perform
        #[arg(short, long, default_value_t = 100_000)]
        iterations: usize,

        /// Number of records to pre-populate
        #[arg(short, long, default_value_t = 10_000)]
        record_count: usize,
    },

    /// Measure create throughput against a fresh collection.
    WriteThroughput {
        /// Number of records to create
        #[arg(short, long, default_value_t = 10_000)]
        iterations: usize,
    },

    /// Run a mixed read/write workload against a warm collection.
    MixedWorkload {
        /// Total operations to perform
        #[arg(short, long, default_value_t = 50_000)]
        operations: usize,

        /// Read percentage (0-100), remainder are updates
        #[arg(short, long, default_value_t = 80)]
        read_percent: u8,

        /// Number of records to pre-populate
        #[arg(short, long, default_value_t = 5_000)]
        record_count: usize,
    },

    /// Run every benchmark with its default parameters.
    All,
}
